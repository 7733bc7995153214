//! Timed, all-or-nothing writes to a destination path.

use crate::error::{StorageError, StorageResult};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

/// Sibling temp path for `dest`, unique per call.
pub(crate) fn temp_path_for(dest: &Path) -> PathBuf {
    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    dest.with_file_name(
        dest.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
            .unwrap_or_else(|| temp_name.clone()),
    )
}

/// Run `write` against a temp file beside `dest`, bounded by `timeout`, and
/// rename the result into place. Missing parent directories are created and
/// the temp file is removed on any failure.
pub(crate) async fn write_atomically<F, Fut>(
    dest: &Path,
    timeout: Duration,
    write: F,
) -> StorageResult<()>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = StorageResult<()>>,
{
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    let temp = temp_path_for(dest);

    let result = match tokio::time::timeout(timeout, write(temp.clone())).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout { after: timeout }),
    };
    let result = match result {
        Ok(()) => fs::rename(&temp, dest).await.map_err(StorageError::Io),
        Err(e) => Err(e),
    };

    if result.is_err()
        && let Err(e) = fs::remove_file(&temp).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %temp.display(), error = %e, "Failed to remove partial download");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn success_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        write_atomically(&dest, Duration::from_secs(5), |temp| async move {
            fs::write(&temp, b"payload").await?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(fs::read(&dest).await.unwrap(), b"payload");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn timeout_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        let result = write_atomically(&dest, Duration::from_millis(50), |temp| async move {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(b"partial").await?;
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StorageError::Timeout { .. })));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failure_keeps_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        fs::write(&dest, b"old").await.unwrap();

        let result = write_atomically(&dest, Duration::from_secs(5), |temp| async move {
            fs::write(&temp, b"half").await?;
            Err(StorageError::InvalidResponse("stream reset".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(fs::read(&dest).await.unwrap(), b"old");
    }
}

//! IPFS content backend.
//!
//! Writes and unpins go to the IPFS cluster REST API, which pins across the
//! cluster according to the configured replication hints. Reads go to an
//! IPFS daemon's RPC API, which may live on a different host.

use crate::error::{StorageError, StorageResult};
use crate::fetch::write_atomically;
use crate::traits::ContentBackend;
use async_trait::async_trait;
use futures::StreamExt;
use pinfile_core::ContentId;
use pinfile_core::config::PinConfig;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// One entry of the cluster's `/add` response.
#[derive(Debug, Deserialize)]
struct AddedOutput {
    #[serde(default)]
    name: String,
    cid: CidField,
}

/// Cluster versions disagree on how a CID is encoded.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CidField {
    Plain(String),
    Link {
        #[serde(rename = "/")]
        link: String,
    },
}

impl CidField {
    fn into_string(self) -> String {
        match self {
            CidField::Plain(cid) => cid,
            CidField::Link { link } => link,
        }
    }
}

/// Extract the content id from an `/add` response body.
///
/// The body is either a JSON array or newline-delimited JSON objects; the
/// last entry is the root of what was added.
fn parse_add_response(body: &str) -> StorageResult<ContentId> {
    let entries: Vec<AddedOutput> = if body.trim_start().starts_with('[') {
        serde_json::from_str(body)
            .map_err(|e| StorageError::InvalidResponse(format!("bad /add body: {e}")))?
    } else {
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<AddedOutput>)
            .collect::<Result<_, _>>()
            .map_err(|e| StorageError::InvalidResponse(format!("bad /add line: {e}")))?
    };

    let last = entries
        .into_iter()
        .last()
        .ok_or_else(|| StorageError::InvalidResponse("empty /add response".to_string()))?;
    tracing::trace!(name = %last.name, "Cluster accepted upload");
    ContentId::new(last.cid.into_string()).map_err(|e| StorageError::InvalidResponse(e.to_string()))
}

/// Render a duration the way the cluster API parses it ("3600s").
fn go_duration(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

/// Expected body length of a `cat` response, if the daemon announced one.
fn expected_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("X-Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| response.content_length())
}

/// IPFS daemon + IPFS cluster content backend.
///
/// Add, unpin and health requests are bounded by the request timeout; reads
/// are bounded by the timeout passed to [`ContentBackend::get`].
#[derive(Clone)]
pub struct IpfsBackend {
    http: reqwest::Client,
    api_url: Url,
    cluster_url: Url,
    pin: PinConfig,
    request_timeout: Duration,
}

impl IpfsBackend {
    /// Create a backend from host/port pairs. The cluster host defaults to
    /// the daemon host.
    pub fn new(
        host: &str,
        port: u16,
        cluster_host: Option<&str>,
        cluster_port: u16,
        pin: PinConfig,
    ) -> StorageResult<Self> {
        let cluster_host = cluster_host.unwrap_or(host);
        Self::from_urls(
            &format!("http://{}/", host_port(host, port)),
            &format!("http://{}/", host_port(cluster_host, cluster_port)),
            pin,
        )
    }

    /// Create a backend from base URLs.
    pub fn from_urls(api_url: &str, cluster_url: &str, pin: PinConfig) -> StorageResult<Self> {
        pin.validate().map_err(StorageError::Config)?;
        let api_url = Url::parse(api_url)
            .map_err(|e| StorageError::Config(format!("invalid IPFS API URL {api_url}: {e}")))?;
        let cluster_url = Url::parse(cluster_url).map_err(|e| {
            StorageError::Config(format!("invalid IPFS cluster URL {cluster_url}: {e}"))
        })?;

        tracing::info!(
            api = %api_url,
            cluster = %cluster_url,
            local = pin.local,
            replication_min = ?pin.replication_min,
            replication_max = ?pin.replication_max,
            expire_in_secs = ?pin.expire_in_secs,
            "IPFS content backend configured"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            api_url,
            cluster_url,
            pin,
            request_timeout: Duration::from_secs(pinfile_core::DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Replace the bound on add, unpin and health requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    async fn bounded<T>(&self, request: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| StorageError::Timeout {
                after: self.request_timeout,
            })?
    }

    fn url(base: &Url, path: &str) -> StorageResult<Url> {
        base.join(path)
            .map_err(|e| StorageError::Config(format!("failed to build URL for {path}: {e}")))
    }

    /// `/add` URL with the pinning hints as query parameters.
    fn add_url(&self) -> StorageResult<Url> {
        let mut url = Self::url(&self.cluster_url, "add")?;
        {
            let mut query = url.query_pairs_mut();
            if self.pin.local {
                query.append_pair("local", "true");
            }
            if let Some(min) = self.pin.replication_min {
                query.append_pair("replication-min", &min.to_string());
            }
            if let Some(max) = self.pin.replication_max {
                query.append_pair("replication-max", &max.to_string());
            }
            if let Some(expire_in) = self.pin.expire_in() {
                query.append_pair("expire-in", &go_duration(expire_in));
            }
        }
        Ok(url)
    }

    /// Turn a non-success response into an API error, keeping the body for
    /// diagnosis.
    async fn check(response: reqwest::Response, content: &str) -> StorageResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(content.to_string()));
        }
        Err(StorageError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

fn host_port(host: &str, port: u16) -> String {
    // Bare IPv6 literals need brackets inside a URL.
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[async_trait]
impl ContentBackend for IpfsBackend {
    #[instrument(skip(self), fields(backend = "ipfs"))]
    async fn put(&self, path: &Path) -> StorageResult<ContentId> {
        let file = fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let form = Form::new().part("file", Part::stream_with_length(body, len).file_name(file_name));

        let add_url = self.add_url()?;
        let body = self
            .bounded(async {
                let response = self.http.post(add_url).multipart(form).send().await?;
                let response = Self::check(response, &path.display().to_string()).await?;
                Ok(response.text().await?)
            })
            .await?;

        let content_id = parse_add_response(&body)?;
        tracing::debug!(content_id = %content_id, size = len, "Uploaded to IPFS cluster");
        Ok(content_id)
    }

    #[instrument(skip(self), fields(backend = "ipfs"))]
    async fn get(
        &self,
        content_id: &ContentId,
        dest: &Path,
        timeout: Duration,
    ) -> StorageResult<()> {
        let mut url = Self::url(&self.api_url, "api/v0/cat")?;
        url.query_pairs_mut().append_pair("arg", content_id.as_str());

        write_atomically(dest, timeout, |temp| async move {
            let response = self.http.post(url).send().await?;
            let response = Self::check(response, content_id.as_str()).await?;
            let expected = expected_length(&response);

            let mut file = fs::File::create(&temp).await?;
            let mut written = 0u64;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                written += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            // A 200 with a short body means the daemon failed mid-stream.
            if let Some(expected) = expected
                && written != expected
            {
                return Err(StorageError::InvalidResponse(format!(
                    "truncated content {content_id}: received {written} of {expected} bytes"
                )));
            }
            file.sync_all().await?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "ipfs"))]
    async fn unpin(&self, content_id: &ContentId) -> StorageResult<()> {
        let url = Self::url(&self.cluster_url, &format!("pins/{content_id}"))?;
        self.bounded(async {
            let response = self.http.delete(url).send().await?;
            Self::check(response, content_id.as_str()).await?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "ipfs"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let cluster_id = Self::url(&self.cluster_url, "id")?;
        let daemon_version = Self::url(&self.api_url, "api/v0/version")?;

        self.bounded(async {
            let response = self.http.get(cluster_id).send().await?;
            Self::check(response, "cluster /id").await?;

            let response = self.http.post(daemon_version).send().await?;
            Self::check(response, "daemon /api/v0/version").await?;
            Ok(())
        })
        .await
    }
}

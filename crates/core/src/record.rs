//! File records and the values stored in them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier returned by a content backend for stored bytes.
///
/// The registry never interprets it beyond requiring a non-empty token
/// without whitespace, which is what every backend hands out.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Validate and wrap a content identifier.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidContentId("empty".to_string()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidContentId(format!(
                "contains whitespace: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ContentId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

impl FromStr for ContentId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seconds since the Unix epoch, used as a last-touched marker.
///
/// Stored in the metadata table as a decimal string. Always finite.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Timestamp(f64);

impl Timestamp {
    /// Wrap a number of seconds, rejecting NaN and infinities.
    pub fn new(secs: f64) -> crate::Result<Self> {
        if !secs.is_finite() {
            return Err(crate::Error::InvalidTimestamp(secs.to_string()));
        }
        Ok(Self(secs))
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self(nanos as f64 / 1_000_000_000.0)
    }

    /// Parse the stored string form. Accepts any finite decimal, so rows
    /// written as `"1000"`, `"1000.0"` or `"1e3"` all read back the same.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let secs = s
            .trim()
            .parse::<f64>()
            .map_err(|_| crate::Error::InvalidTimestamp(s.to_string()))?;
        Self::new(secs)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }

    /// String form written to the metadata table.
    pub fn to_db_string(&self) -> String {
        self.to_string()
    }
}

impl TryFrom<f64> for Timestamp {
    type Error = crate::Error;

    fn try_from(value: f64) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<Timestamp> for f64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({self})")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep a fractional digit on whole seconds ("1000.0", not "1000").
        if self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// How a link picks the timestamp of the new name.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TimestampPolicy {
    /// Current wall-clock time.
    #[default]
    Now,
    /// A caller-supplied value.
    Explicit(Timestamp),
    /// The source file's stored timestamp.
    CopySource,
}

/// One row of the metadata table.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub filename: String,
    pub content_id: ContentId,
    pub timestamp: Timestamp,
}

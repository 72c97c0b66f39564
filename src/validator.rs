use chrono::{DateTime, TimeZone, Utc};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// 32-char lowercase hex MD5 of the body. Used for change detection only.
pub fn content_hash(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}

/// Formats a timestamp as an IMF-fixdate, e.g. `Sat, 08 Jun 2013 20:31:48 GMT`.
pub fn http_date(time: DateTime<Utc>) -> String {
    truncate_to_seconds(time).format(HTTP_DATE_FORMAT).to_string()
}

pub(crate) fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(time.timestamp(), 0).single().unwrap_or(time)
}

/// Validators derived from a single body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    pub content_hash: String,
    pub last_modified: String,
}

impl ValidatorSet {
    pub fn new(body: &[u8], last_modified: DateTime<Utc>) -> Self {
        Self {
            content_hash: content_hash(body),
            last_modified: http_date(last_modified),
        }
    }

    /// Quoted form sent in `ETag`.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.content_hash)
    }
}

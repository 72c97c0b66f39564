use std::path::PathBuf;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use crate::policy::FreshnessPolicy;

/// Source of "now" for date headers.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn ttl_delta(policy: &FreshnessPolicy) -> Option<TimeDelta> {
    i64::try_from(policy.ttl_seconds()).ok().and_then(TimeDelta::try_seconds)
}

/// `now + ttl`, saturating at the largest representable instant.
pub fn expires_at(now: DateTime<Utc>, policy: &FreshnessPolicy) -> DateTime<Utc> {
    ttl_delta(policy)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `now - ttl`, saturating at the smallest representable instant.
pub fn ttl_baseline(now: DateTime<Utc>, policy: &FreshnessPolicy) -> DateTime<Utc> {
    ttl_delta(policy)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Where the `Last-Modified` value comes from.
pub trait TimestampSource: Send + Sync + std::fmt::Debug {
    fn last_modified(&self, now: DateTime<Utc>, policy: &FreshnessPolicy) -> DateTime<Utc>;
}

/// `now - ttl`. Deterministic under a fixed clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtlBaseline;

impl TimestampSource for TtlBaseline {
    fn last_modified(&self, now: DateTime<Utc>, policy: &FreshnessPolicy) -> DateTime<Utc> {
        ttl_baseline(now, policy)
    }
}

/// Modification time of a file on disk, or the TTL baseline when the
/// file can't be stat'ed.
#[derive(Debug, Clone)]
pub struct FileModified {
    path: PathBuf,
}

impl FileModified {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn mtime(&self) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(&self.path).and_then(|m| m.modified());
        match modified {
            Ok(time) => Some(DateTime::<Utc>::from(time)),
            Err(e) => {
                debug!("No modification time for {:?}: {}", self.path, e);
                None
            }
        }
    }
}

impl TimestampSource for FileModified {
    fn last_modified(&self, now: DateTime<Utc>, policy: &FreshnessPolicy) -> DateTime<Utc> {
        self.mtime().unwrap_or_else(|| ttl_baseline(now, policy))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedTimestamp(pub DateTime<Utc>);

impl TimestampSource for FixedTimestamp {
    fn last_modified(&self, _now: DateTime<Utc>, _policy: &FreshnessPolicy) -> DateTime<Utc> {
        self.0
    }
}

use std::str::FromStr;
use serde::Deserialize;
use crate::error::CacheError;

/// Default freshness lifetime: 30 days.
pub const DEFAULT_TTL_SECONDS: u64 = 2_592_000;

/// Statuses skipped under [`EligibilityPolicy::DenyList`].
pub const NON_CACHEABLE_STATUSES: [u16; 3] = [201, 204, 304];

/// Statuses negotiated under [`EligibilityPolicy::AllowList`].
pub const CACHEABLE_STATUSES: [u16; 7] = [200, 203, 300, 301, 302, 404, 410];

/// How long a response may be reused, and how far back the synthetic
/// last-modified baseline sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl_seconds: u64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl FreshnessPolicy {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }

    /// Builds a policy from a signed value, rejecting negative TTLs.
    pub fn from_signed(ttl_seconds: i64) -> Result<Self, CacheError> {
        u64::try_from(ttl_seconds)
            .map(Self::new)
            .map_err(|_| CacheError::InvalidConfiguration(
                format!("ttl must be non-negative, got {}", ttl_seconds)
            ))
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// `Cache-Control` value for this policy.
    pub fn cache_control(&self) -> String {
        format!("max-age={}, public", self.ttl_seconds)
    }
}

impl FromStr for FreshnessPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let ttl: i64 = trimmed.parse().map_err(|_| {
            CacheError::InvalidConfiguration(format!("ttl must be an integer, got {:?}", s))
        })?;
        Self::from_signed(ttl)
    }
}

/// Which response statuses go through negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityPolicy {
    /// Everything except 201, 204 and 304.
    #[default]
    DenyList,
    /// Only 200, 203, 300, 301, 302, 404 and 410.
    AllowList,
}

impl EligibilityPolicy {
    pub fn allows(&self, status: u16) -> bool {
        match self {
            EligibilityPolicy::DenyList => !NON_CACHEABLE_STATUSES.contains(&status),
            EligibilityPolicy::AllowList => CACHEABLE_STATUSES.contains(&status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.ttl_seconds(), 2_592_000);
        assert_eq!(policy.cache_control(), "max-age=2592000, public");
    }

    #[test]
    fn test_parse_ttl() {
        let policy: FreshnessPolicy = " 3600 ".parse().unwrap();
        assert_eq!(policy.ttl_seconds(), 3600);
        assert_eq!("0".parse::<FreshnessPolicy>().unwrap().ttl_seconds(), 0);
    }

    #[test]
    fn test_reject_non_integer_ttl() {
        for input in ["1.5", "abc", "", "30d"] {
            let err = input.parse::<FreshnessPolicy>().unwrap_err();
            assert!(matches!(err, CacheError::InvalidConfiguration(_)), "{}", input);
        }
    }

    #[test]
    fn test_reject_negative_ttl() {
        assert!(matches!(
            "-1".parse::<FreshnessPolicy>(),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(FreshnessPolicy::from_signed(-60).is_err());
    }

    #[test]
    fn test_deny_list() {
        let policy = EligibilityPolicy::default();
        assert!(policy.allows(200));
        assert!(policy.allows(500));
        for status in [201, 204, 304] {
            assert!(!policy.allows(status));
        }
    }

    #[test]
    fn test_allow_list() {
        let policy = EligibilityPolicy::AllowList;
        assert!(policy.allows(200));
        assert!(policy.allows(410));
        assert!(!policy.allows(500));
        assert!(!policy.allows(204));
    }
}

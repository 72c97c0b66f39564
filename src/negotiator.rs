use std::sync::Arc;
use bytes::Bytes;
use tracing::debug;

use crate::clock::{expires_at, Clock, SystemClock, TimestampSource, TtlBaseline};
use crate::conditional::ConditionalHeaders;
use crate::policy::{EligibilityPolicy, FreshnessPolicy};
use crate::sink::{HeaderSink, RequestMetadata};
use crate::validator::{http_date, ValidatorSet};

pub const NOT_MODIFIED: u16 = 304;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Client copy is current: 304, empty body.
    Hit,
    /// Send the body with fresh validators.
    Miss,
}

/// Result of one negotiation. `decision` is `None` when the response
/// wasn't eligible and passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    pub body: Bytes,
    pub decision: Option<CacheDecision>,
}

/// Decides hit or miss for one response and writes the matching headers.
///
/// One instance per response: the freshness-headers flag lives here, so
/// repeated negotiations on the same response emit `Expires`,
/// `Cache-Control` and `Pragma` once.
#[derive(Debug)]
pub struct ConditionalCacheNegotiator {
    policy: FreshnessPolicy,
    eligibility: EligibilityPolicy,
    conditions: ConditionalHeaders,
    clock: Arc<dyn Clock>,
    timestamps: Arc<dyn TimestampSource>,
    freshness_sent: bool,
    last_decision: Option<CacheDecision>,
}

impl ConditionalCacheNegotiator {
    pub fn new(policy: FreshnessPolicy, request: &dyn RequestMetadata) -> Self {
        Self {
            policy,
            eligibility: EligibilityPolicy::default(),
            conditions: ConditionalHeaders::from_request(request),
            clock: Arc::new(SystemClock),
            timestamps: Arc::new(TtlBaseline),
            freshness_sent: false,
            last_decision: None,
        }
    }

    pub fn with_eligibility(mut self, eligibility: EligibilityPolicy) -> Self {
        self.eligibility = eligibility;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timestamp_source(mut self, timestamps: Arc<dyn TimestampSource>) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn freshness_sent(&self) -> bool {
        self.freshness_sent
    }

    /// Outcome of the most recent negotiation, `None` if it was skipped
    /// or none has run yet.
    pub fn last_decision(&self) -> Option<CacheDecision> {
        self.last_decision
    }

    pub fn is_eligible(&self, response: &dyn HeaderSink) -> bool {
        !response.headers_committed() && self.eligibility.allows(response.status())
    }

    pub fn negotiate(&mut self, body: Bytes, response: &mut dyn HeaderSink) -> Negotiation {
        if !self.is_eligible(response) {
            debug!(
                "Skipping negotiation: committed={}, status={}",
                response.headers_committed(),
                response.status()
            );
            self.last_decision = None;
            return Negotiation { body, decision: None };
        }

        let now = self.clock.now();
        if !self.freshness_sent {
            response.set_header("Expires", &http_date(expires_at(now, &self.policy)));
            response.set_header("Cache-Control", &self.policy.cache_control());
            response.set_header("Pragma", "Public");
            self.freshness_sent = true;
            debug!("Sent freshness headers, ttl={}s", self.policy.ttl_seconds());
        }

        let validators = ValidatorSet::new(&body, self.timestamps.last_modified(now, &self.policy));

        response.set_header("Content-MD5", &validators.content_hash);
        let decision = if self.conditions.is_hit(&validators.content_hash, &validators.last_modified) {
            response.set_status(NOT_MODIFIED);
            CacheDecision::Hit
        } else {
            response.set_header("Content-Length", &body.len().to_string());
            response.set_header("ETag", &validators.etag());
            response.set_header("Last-Modified", &validators.last_modified);
            CacheDecision::Miss
        };

        debug!(
            hash = %validators.content_hash,
            last_modified = %validators.last_modified,
            bytes = body.len(),
            "Cache decision: {:?}", decision
        );

        self.last_decision = Some(decision);
        let body = match decision {
            CacheDecision::Hit => Bytes::new(),
            CacheDecision::Miss => body,
        };
        Negotiation { body, decision: Some(decision) }
    }
}

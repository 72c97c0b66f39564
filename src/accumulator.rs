use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::negotiator::{CacheDecision, ConditionalCacheNegotiator};
use crate::sink::HeaderSink;

/// A step that sees the complete body once buffering has finished.
pub trait BodyStage: Send {
    fn name(&self) -> &str;

    fn process(&mut self, body: Bytes, response: &mut dyn HeaderSink) -> Bytes;
}

struct RegisteredStage {
    key: Option<String>,
    stage: Box<dyn BodyStage>,
}

/// Collects streamed chunks and releases the whole body on the final write,
/// after running it through the registered stages in order and then, if
/// one is attached, the negotiator.
pub struct ResponseAccumulator {
    buffer: BytesMut,
    stages: Vec<RegisteredStage>,
    negotiator: Option<ConditionalCacheNegotiator>,
    finalized: bool,
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResponseAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAccumulator")
            .field("buffered", &self.buffer.len())
            .field("stages", &self.stage_names())
            .field("negotiator", &self.negotiator.is_some())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            stages: Vec::new(),
            negotiator: None,
            finalized: false,
        }
    }

    pub fn with_negotiator(negotiator: ConditionalCacheNegotiator) -> Self {
        Self {
            negotiator: Some(negotiator),
            ..Self::new()
        }
    }

    pub fn negotiator(&self) -> Option<&ConditionalCacheNegotiator> {
        self.negotiator.as_ref()
    }

    /// Decision of the last negotiation on the released body. `None` when
    /// no negotiator is attached or the response wasn't eligible.
    pub fn last_decision(&self) -> Option<CacheDecision> {
        self.negotiator.as_ref().and_then(ConditionalCacheNegotiator::last_decision)
    }

    pub fn register_stage(&mut self, stage: Box<dyn BodyStage>) -> &mut Self {
        debug!("Registering body stage: {}", stage.name());
        self.stages.push(RegisteredStage { key: None, stage });
        self
    }

    /// Registers under `key`, replacing in place any stage already using it.
    pub fn register_named_stage(&mut self, key: impl Into<String>, stage: Box<dyn BodyStage>) -> &mut Self {
        let key = key.into();
        debug!("Registering body stage {} as {}", stage.name(), key);
        match self.stages.iter_mut().find(|s| s.key.as_deref() == Some(key.as_str())) {
            Some(existing) => existing.stage = stage,
            None => self.stages.push(RegisteredStage { key: Some(key), stage }),
        }
        self
    }

    pub fn unregister_stage(&mut self, key: &str) -> Option<Box<dyn BodyStage>> {
        let index = self.stages.iter().position(|s| s.key.as_deref() == Some(key))?;
        debug!("Unregistering body stage {}", key);
        Some(self.stages.remove(index).stage)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage.name()).collect()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Feeds one chunk. Returns nothing until `is_final`, then the
    /// complete body as rewritten by the stages.
    pub fn write(&mut self, chunk: &[u8], is_final: bool, response: &mut dyn HeaderSink) -> Bytes {
        if self.finalized {
            warn!("Write of {} bytes after the body was released; passing through", chunk.len());
            return Bytes::copy_from_slice(chunk);
        }

        self.buffer.extend_from_slice(chunk);
        if !is_final {
            return Bytes::new();
        }

        self.finalized = true;
        let mut body = self.buffer.split().freeze();
        debug!("Releasing {} buffered bytes to {} stages", body.len(), self.stages.len());
        for registered in self.stages.iter_mut() {
            body = registered.stage.process(body, response);
        }
        match self.negotiator.as_mut() {
            Some(negotiator) => negotiator.negotiate(body, response).body,
            None => body,
        }
    }

    /// Drops buffered chunks so the accumulator can take a new body.
    /// Registered stages and the negotiator keep their state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.finalized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{TimeZone, Utc};
    use hyper::header::{HeaderMap, HeaderValue};
    use crate::clock::FixedClock;
    use crate::policy::FreshnessPolicy;
    use crate::sink::ResponseHead;
    use crate::validator::content_hash;

    struct Upper;

    impl BodyStage for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn process(&mut self, body: Bytes, _response: &mut dyn HeaderSink) -> Bytes {
            Bytes::from(body.to_ascii_uppercase())
        }
    }

    struct Suffix(&'static str);

    impl BodyStage for Suffix {
        fn name(&self) -> &str {
            self.0
        }

        fn process(&mut self, body: Bytes, _response: &mut dyn HeaderSink) -> Bytes {
            let mut out = BytesMut::from(&body[..]);
            out.extend_from_slice(self.0.as_bytes());
            out.freeze()
        }
    }

    fn negotiator(headers: &HeaderMap) -> ConditionalCacheNegotiator {
        let now = Utc.with_ymd_and_hms(2013, 7, 8, 20, 31, 48).unwrap();
        ConditionalCacheNegotiator::new(FreshnessPolicy::default(), headers)
            .with_clock(Arc::new(FixedClock(now)))
    }

    #[test]
    fn test_plain_buffering() {
        let mut head = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::new();
        assert!(accumulator.write(b"Hello, ", false, &mut head).is_empty());
        assert!(accumulator.write(b"", false, &mut head).is_empty());
        assert_eq!(accumulator.buffered_len(), 7);
        assert_eq!(accumulator.write(b"World!", true, &mut head), Bytes::from_static(b"Hello, World!"));
        assert_eq!(accumulator.buffered_len(), 0);
        assert!(head.headers().is_empty());
    }

    #[test]
    fn test_two_chunk_miss() {
        let headers = HeaderMap::new();
        let mut head = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));

        assert!(accumulator.write(b"Hello, ", false, &mut head).is_empty());
        let body = accumulator.write(b"World!", true, &mut head);

        assert_eq!(body, Bytes::from_static(b"Hello, World!"));
        assert_eq!(head.header("content-length"), Some("13"));
        assert_eq!(accumulator.last_decision(), Some(CacheDecision::Miss));
        let etag = format!("\"{}\"", content_hash(b"Hello, World!"));
        assert_eq!(head.header("etag"), Some(etag.as_str()));
    }

    #[test]
    fn test_single_final_write_matches_chunked() {
        let headers = HeaderMap::new();
        let mut chunked = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));
        accumulator.write(b"Hello, ", false, &mut chunked);
        let a = accumulator.write(b"World!", true, &mut chunked);

        let mut single = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));
        let b = accumulator.write(b"Hello, World!", true, &mut single);

        assert_eq!(a, b);
        assert_eq!(chunked.headers(), single.headers());
    }

    #[test]
    fn test_empty_body_hit() {
        let mut headers = HeaderMap::new();
        headers.insert("if-none-match", HeaderValue::from_static("\"d41d8cd98f00b204e9800998ecf8427e\""));
        let mut head = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));

        let body = accumulator.write(b"", true, &mut head);
        assert!(body.is_empty());
        assert_eq!(head.status(), 304);
        assert_eq!(accumulator.last_decision(), Some(CacheDecision::Hit));
    }

    #[test]
    fn test_no_decision_before_final_or_when_skipped() {
        let headers = HeaderMap::new();
        let mut head = ResponseHead::new(hyper::StatusCode::NO_CONTENT);
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));
        accumulator.write(b"part", false, &mut head);
        assert_eq!(accumulator.last_decision(), None);

        assert_eq!(accumulator.write(b"", true, &mut head), Bytes::from_static(b"part"));
        assert_eq!(accumulator.last_decision(), None);
        assert!(head.headers().is_empty());
        assert_eq!(ResponseAccumulator::new().last_decision(), None);
    }

    #[test]
    fn test_negotiator_sees_staged_body() {
        let headers = HeaderMap::new();
        let mut head = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));
        accumulator.register_stage(Box::new(Upper));
        assert_eq!(accumulator.write(b"abc", true, &mut head), Bytes::from_static(b"ABC"));
        let etag = format!("\"{}\"", content_hash(b"ABC"));
        assert_eq!(head.header("etag"), Some(etag.as_str()));
        assert!(accumulator.negotiator().unwrap().freshness_sent());
    }

    #[test]
    fn test_write_after_final_passes_through() {
        let mut head = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::new();
        accumulator.write(b"done", true, &mut head);
        assert!(accumulator.is_finalized());
        assert_eq!(accumulator.write(b"late", false, &mut head), Bytes::from_static(b"late"));
        assert_eq!(accumulator.buffered_len(), 0);
    }

    #[test]
    fn test_reset_keeps_freshness_flag() {
        let headers = HeaderMap::new();
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator(&headers));

        let mut first = ResponseHead::default();
        accumulator.write(b"one", true, &mut first);
        assert!(first.header("expires").is_some());

        accumulator.reset();
        let mut second = ResponseHead::default();
        accumulator.write(b"tw", false, &mut second);
        let body = accumulator.write(b"o", true, &mut second);
        assert_eq!(body, Bytes::from_static(b"two"));
        assert_eq!(second.header("expires"), None);
        assert_eq!(second.header("cache-control"), None);
        assert_eq!(second.header("pragma"), None);
        assert!(second.header("etag").is_some());
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut head = ResponseHead::default();
        let mut accumulator = ResponseAccumulator::new();
        accumulator
            .register_stage(Box::new(Suffix("-a")))
            .register_stage(Box::new(Upper));
        accumulator.write(b"x", false, &mut head);
        assert_eq!(accumulator.write(b"y", true, &mut head), Bytes::from_static(b"XY-A"));
    }

    #[test]
    fn test_named_stages() {
        let mut accumulator = ResponseAccumulator::new();
        accumulator
            .register_named_stage("tail", Box::new(Suffix("-a")))
            .register_stage(Box::new(Upper))
            .register_named_stage("tail", Box::new(Suffix("-b")));
        assert_eq!(accumulator.stage_names(), vec!["-b", "upper"]);

        let removed = accumulator.unregister_stage("tail").unwrap();
        assert_eq!(removed.name(), "-b");
        assert!(accumulator.unregister_stage("tail").is_none());
        assert_eq!(accumulator.stage_names(), vec!["upper"]);
    }
}

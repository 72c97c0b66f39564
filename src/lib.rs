pub mod accumulator;
pub mod clock;
pub mod conditional;
pub mod config;
pub mod error;
pub mod logger;
pub mod negotiator;
pub mod policy;
pub mod server;
pub mod sink;
pub mod validator;

pub use config::Config;
pub use error::{CacheError, Result};

pub mod prelude {
    pub use crate::accumulator::{BodyStage, ResponseAccumulator};
    pub use crate::clock::{Clock, FileModified, SystemClock, TimestampSource, TtlBaseline};
    pub use crate::negotiator::{CacheDecision, ConditionalCacheNegotiator, Negotiation};
    pub use crate::policy::{EligibilityPolicy, FreshnessPolicy};
    pub use crate::server::{CacheServer, ContentSource, FileSource, StaticSource};
    pub use crate::sink::{HeaderSink, RequestMetadata, ResponseHead};
}

use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::negotiator::CacheDecision;

pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("http_cache_buffer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

pub fn log_response(path: &str, status: u16, decision: Option<CacheDecision>, duration: Duration) {
    let outcome = match decision {
        Some(CacheDecision::Hit) => "hit",
        Some(CacheDecision::Miss) => "miss",
        None => "skipped",
    };
    info!(
        target: "response",
        path = %path,
        status = status,
        cache = outcome,
        duration_ms = %duration.as_millis(),
        "Response completed"
    );
}

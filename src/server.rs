use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::body::HttpBody;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::accumulator::ResponseAccumulator;
use crate::clock::{Clock, FileModified, SystemClock};
use crate::config::{Config, LastModifiedStrategy};
use crate::error::{CacheError, Result};
use crate::logger::log_response;
use crate::negotiator::ConditionalCacheNegotiator;
use crate::policy::{EligibilityPolicy, FreshnessPolicy};
use crate::sink::{HeaderSink, ResponseHead};

/// A body to serve, before negotiation.
#[derive(Debug)]
pub struct Content {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Body,
    /// File backing the body, if any. Used for `Last-Modified`.
    pub path: Option<PathBuf>,
}

impl Content {
    pub fn new(status: StatusCode, content_type: impl Into<String>, body: impl Into<Body>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
            path: None,
        }
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, path: &str) -> bool;
    async fn load(&self, path: &str) -> Result<Content>;
}

/// In-memory pages keyed by request path.
#[derive(Debug, Default)]
pub struct StaticSource {
    pages: HashMap<String, (String, Bytes)>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, path: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.pages.insert(path.to_string(), (content_type.to_string(), body.into()));
        self
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn can_handle(&self, path: &str) -> bool {
        self.pages.contains_key(path)
    }

    async fn load(&self, path: &str) -> Result<Content> {
        let (content_type, body) = self.pages
            .get(path)
            .ok_or_else(|| CacheError::NotFound(path.to_string()))?;
        Ok(Content::new(StatusCode::OK, content_type.as_str(), body.clone()))
    }
}

/// Files under a root directory. `/` maps to `index.html`.
#[derive(Debug)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        info!("Serving files from {:?}", root.as_ref());
        Self { root: root.as_ref().to_owned() }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        if relative.as_os_str().is_empty() {
            return Some(self.root.join("index.html"));
        }
        Some(self.root.join(relative))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ContentSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn can_handle(&self, _path: &str) -> bool {
        true
    }

    async fn load(&self, path: &str) -> Result<Content> {
        let file = self.resolve(path).ok_or_else(|| CacheError::NotFound(path.to_string()))?;
        let data = match tokio::fs::read(&file).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Read {} bytes from {:?}", data.len(), file);
        let mut content = Content::new(StatusCode::OK, content_type_for(&file), data);
        content.path = Some(file);
        Ok(content)
    }
}

/// Per-server negotiation settings; every request gets a fresh negotiator
/// built from these.
#[derive(Debug, Clone)]
pub struct NegotiationSettings {
    pub policy: FreshnessPolicy,
    pub eligibility: EligibilityPolicy,
    pub last_modified: LastModifiedStrategy,
    pub clock: Arc<dyn Clock>,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            policy: FreshnessPolicy::default(),
            eligibility: EligibilityPolicy::default(),
            last_modified: LastModifiedStrategy::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl NegotiationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.freshness_policy(),
            eligibility: config.cache.eligibility,
            last_modified: config.cache.last_modified,
            ..Default::default()
        }
    }

    fn negotiator(&self, req: &Request<Body>, file: Option<&Path>) -> ConditionalCacheNegotiator {
        let negotiator = ConditionalCacheNegotiator::new(self.policy, req.headers())
            .with_eligibility(self.eligibility)
            .with_clock(self.clock.clone());
        match (self.last_modified, file) {
            (LastModifiedStrategy::FileModified, Some(file)) => {
                negotiator.with_timestamp_source(Arc::new(FileModified::new(file)))
            }
            _ => negotiator,
        }
    }
}

#[derive(Clone)]
pub struct CacheServer {
    addr: SocketAddr,
    sources: Vec<Arc<dyn ContentSource>>,
    settings: Arc<NegotiationSettings>,
}

impl CacheServer {
    pub fn new(addr: SocketAddr, settings: NegotiationSettings) -> Self {
        info!("Creating cache server on {}", addr);
        Self {
            addr,
            sources: Vec::new(),
            settings: Arc::new(settings),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut server = Self::new(config.addr()?, NegotiationSettings::from_config(config));
        server.add_source(Arc::new(FileSource::new(&config.server.root)));
        Ok(server)
    }

    pub fn add_source(&mut self, source: Arc<dyn ContentSource>) {
        info!("Adding content source: {}", source.name());
        self.sources.push(source);
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        info!("Starting cache server on {}", self.addr);
        debug!("Registered sources: {}", self.sources.len());

        let server = self.clone();
        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let remote_addr = conn.remote_addr();
            debug!("New connection from: {}", remote_addr);
            let server = server.clone();

            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle(req).await }
                }))
            }
        });

        if let Err(e) = Server::bind(&self.addr).serve(make_svc).await {
            error!("Server error: {}", e);
            return Err(CacheError::Network(e.to_string()));
        }
        Ok(())
    }

    async fn load(&self, path: &str) -> Content {
        let Some(source) = self.sources.iter().find(|s| s.can_handle(path)) else {
            return Content::new(StatusCode::NOT_FOUND, "text/plain", "Not Found");
        };
        match source.load(path).await {
            Ok(content) => content,
            Err(CacheError::NotFound(_)) => {
                debug!("Source {} has nothing for {}", source.name(), path);
                Content::new(StatusCode::NOT_FOUND, "text/plain", "Not Found")
            }
            Err(e) => {
                warn!("Source {} failed for {}: {}", source.name(), path, e);
                Content::new(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Internal Server Error")
            }
        }
    }

    /// Serves one request: loads the content, streams it through a
    /// response-scoped accumulator and negotiator, and builds the response.
    #[tracing::instrument(skip(self, req), fields(request_id = %uuid::Uuid::new_v4(), path = %req.uri().path()))]
    pub async fn handle(&self, req: Request<Body>) -> std::result::Result<Response<Body>, hyper::Error> {
        let started = Instant::now();
        let path = req.uri().path().to_string();
        let content = self.load(&path).await;

        let mut head = ResponseHead::new(content.status);
        head.set_header("Content-Type", &content.content_type);

        let negotiator = self.settings.negotiator(&req, content.path.as_deref());
        let mut accumulator = ResponseAccumulator::with_negotiator(negotiator);

        let mut body = content.body;
        while let Some(chunk) = body.data().await {
            accumulator.write(&chunk?, false, &mut head);
        }
        let output = accumulator.write(&[], true, &mut head);

        log_response(&path, head.status(), accumulator.last_decision(), started.elapsed());
        Ok(head.into_response(Body::from(output)))
    }
}

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Body, Response, StatusCode};
use tracing::warn;

/// Response-side collaborator: where headers and the status code go.
pub trait HeaderSink {
    fn set_header(&mut self, name: &str, value: &str);
    fn set_status(&mut self, status: u16);
    fn headers_committed(&self) -> bool;
    fn status(&self) -> u16;
}

/// Read-only view of the request headers.
pub trait RequestMetadata {
    /// Raw value of `name`, matched case-insensitively. `None` if absent.
    fn header(&self, name: &str) -> Option<&str>;
}

impl RequestMetadata for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Status and headers of a response that hasn't been sent yet.
#[derive(Debug)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
    committed: bool,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            committed: false,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.header(name)
    }

    /// Marks the head as sent; later header writes are dropped.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    pub fn into_response(mut self, body: Body) -> Response<Body> {
        self.committed = true;
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl HeaderSink for ResponseHead {
    fn set_header(&mut self, name: &str, value: &str) {
        if self.committed {
            warn!("Dropping header {} after response was committed", name);
            return;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!("Invalid header {}: {:?}", name, value),
        }
    }

    fn set_status(&mut self, status: u16) {
        if self.committed {
            warn!("Dropping status {} after response was committed", status);
            return;
        }
        match StatusCode::from_u16(status) {
            Ok(status) => self.status = status,
            Err(e) => warn!("Invalid status {}: {}", status, e),
        }
    }

    fn headers_committed(&self) -> bool {
        self.committed
    }

    fn status(&self) -> u16 {
        self.status.as_u16()
    }
}

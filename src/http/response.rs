//! Response staging.
//!
//! # Responsibilities
//! - Stage status and headers until the first body write
//! - Turn the staged response into an axum `Response`
//!
//! # Design Decisions
//! - The first body write commits; later status or header changes are
//!   ignored and reported by a `false` return
//! - A redirect after commit is an error, not a silent no-op
//! - Buffers are reused across requests by the context pool

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::BytesMut;

use crate::http::error::DispatchError;

#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn set_status(&mut self, status: StatusCode) -> bool {
        if self.committed {
            return false;
        }
        self.status = status;
        true
    }

    /// Replace a header. `false` after commit.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.committed {
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    /// Add a header value next to existing ones. `false` after commit.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if self.committed {
            return false;
        }
        self.headers.append(name, value);
        true
    }

    /// Set `content-type` unless the handler already chose one.
    pub(crate) fn default_content_type(&mut self, value: &'static str) {
        if !self.committed && !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    /// Append to the body, committing status and headers.
    pub fn write(&mut self, chunk: &[u8]) {
        self.committed = true;
        self.body.extend_from_slice(chunk);
    }

    /// Commit without a body.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<(), DispatchError> {
        if self.committed {
            return Err(DispatchError::ResponseCommitted);
        }
        let value = HeaderValue::from_str(location).map_err(|_| DispatchError::InvalidHeader {
            name: LOCATION.to_string(),
        })?;
        self.status = status;
        self.headers.insert(LOCATION, value);
        self.committed = true;
        Ok(())
    }

    /// Drop whatever was staged. Only valid before commit.
    pub(crate) fn discard(&mut self) -> bool {
        if self.committed {
            return false;
        }
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        true
    }

    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
    }

    /// Hand the staged response to axum. The writer is left reset.
    pub fn take_response(&mut self) -> Response {
        let mut response = Response::new(Body::from(self.body.split().freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.reset();
        response
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_commits() {
        let mut w = ResponseWriter::new();
        assert!(w.set_status(StatusCode::CREATED));
        assert!(w.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain")));
        w.write(b"hello");
        assert!(w.is_committed());

        assert!(!w.set_status(StatusCode::NOT_FOUND));
        assert!(!w.set_header(LOCATION, HeaderValue::from_static("/x")));
        w.write(b" world");

        assert_eq!(w.status(), StatusCode::CREATED);
        assert_eq!(w.body(), b"hello world");
        assert!(!w.headers().contains_key(LOCATION));
    }

    #[test]
    fn redirect_after_commit_fails() {
        let mut w = ResponseWriter::new();
        w.write(b"x");
        assert!(matches!(
            w.redirect(StatusCode::FOUND, "/elsewhere"),
            Err(DispatchError::ResponseCommitted)
        ));

        let mut fresh = ResponseWriter::new();
        fresh.redirect(StatusCode::FOUND, "/elsewhere").unwrap();
        assert_eq!(fresh.status(), StatusCode::FOUND);
        assert_eq!(fresh.headers()[LOCATION], "/elsewhere");
    }

    #[test]
    fn take_response_resets() {
        let mut w = ResponseWriter::new();
        w.set_status(StatusCode::ACCEPTED);
        w.write(b"done");
        let response = w.take_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(!w.is_committed());
        assert!(w.body().is_empty());
        assert_eq!(w.status(), StatusCode::OK);
    }
}

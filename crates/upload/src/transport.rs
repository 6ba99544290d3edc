//! Transport seam between the upload core and the network.
//!
//! The core never talks HTTP directly. It builds one of three request
//! descriptions and hands it to an [`UploadTransport`], which answers with
//! the raw [`HttpReply`]. Classifying replies stays in the core, so a
//! scripted transport is enough to exercise every protocol path.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use resumable_protocol::ContentRange;
use resumable_transfer::BodyStream;

use crate::error::TransportError;

/// Future returned by every transport operation.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + 'a>>;

/// Abstract HTTP transport for the three requests of the protocol.
///
/// `HttpTransport` implements this on top of `reqwest`. A transport must
/// not follow redirects: a 308 "resume incomplete" reply has to reach the
/// core as is.
pub trait UploadTransport: Send + Sync {
    /// Sends the session creation request.
    fn send_initiation(&self, request: InitiationRequest) -> TransportFuture<'_>;

    /// Sends the payload, reading the request body from `body` until it ends.
    ///
    /// An error item in `body` aborts the request.
    fn send_upload(&self, request: UploadRequest, body: BodyStream) -> TransportFuture<'_>;

    /// Sends a zero-length status query.
    fn send_probe(&self, request: ProbeRequest) -> TransportFuture<'_>;
}

/// POST that creates an upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiationRequest {
    pub endpoint: String,
    pub token: String,
    /// Serialized resource metadata.
    pub metadata: Vec<u8>,
    /// Announced payload size (`X-Upload-Content-Length`).
    pub upload_content_length: u64,
    /// Announced payload type (`X-Upload-Content-Type`).
    pub upload_content_type: String,
}

/// PUT carrying payload bytes to the session URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub session_url: String,
    pub token: String,
    pub content_type: String,
    /// Bytes this request carries.
    pub content_length: u64,
    pub content_range: Option<ContentRange>,
}

impl UploadRequest {
    /// Request sending everything from `offset` to the end of the payload.
    pub fn from_offset(
        session_url: impl Into<String>,
        token: impl Into<String>,
        content_type: impl Into<String>,
        offset: u64,
        total_size: u64,
    ) -> Self {
        Self {
            session_url: session_url.into(),
            token: token.into(),
            content_type: content_type.into(),
            content_length: total_size.saturating_sub(offset),
            content_range: ContentRange::resume_from(offset, total_size),
        }
    }
}

/// Zero-length PUT asking how many bytes the service holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub session_url: String,
    pub token: String,
    pub total_size: u64,
}

impl ProbeRequest {
    pub fn content_range(&self) -> ContentRange {
        ContentRange::query(self.total_size)
    }
}

/// Status, headers and body of a reply.
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpReply {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value as text, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

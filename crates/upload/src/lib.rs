//! Resumable upload sessions.
//!
//! An [`UploadSession`] creates a server-side session once, streams the
//! payload in a single PUT and, when the connection breaks, asks the
//! service how many bytes it holds and resumes from exactly there. Retry
//! policy is a [`RetryBudget`](resumable_protocol::RetryBudget); the state
//! needed to resume in another process is a
//! [`StateRecord`](resumable_protocol::StateRecord).
//!
//! ```no_run
//! # async fn demo() -> Result<(), resumable_upload::UploadError> {
//! use std::sync::Arc;
//! use resumable_transfer::FileSource;
//! use resumable_upload::{HttpTransport, SessionParams, UploadSession, UploaderConfig};
//!
//! let config = UploaderConfig::default();
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let source = Arc::new(FileSource::open("clip.mp4").await?);
//! let params = SessionParams::new("ya29.token", serde_json::json!({
//!     "snippet": {"title": "New Upload"},
//!     "status": {"privacyStatus": "private"}
//! }))
//! .content_type("video/mp4");
//!
//! let mut session = UploadSession::new(params, transport, source, config);
//! let body = session.upload().await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod initiator;
pub mod monitor;
pub mod probe;
pub mod retry;
pub mod session;
pub mod streamer;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{BackoffConfig, ConfigError, UploaderConfig};
pub use error::{TransportError, UploadError};
pub use http::HttpTransport;
pub use initiator::SessionInitiator;
pub use monitor::ProgressMonitor;
pub use probe::{ProbeStatus, probe, query_offset};
pub use retry::{Recovery, RetryController, RetryState};
pub use session::UploadSession;
pub use streamer::{ChunkStreamer, FailureStage, StreamFailure, StreamOutcome, StreamTarget};
pub use transport::{
    HttpReply, InitiationRequest, ProbeRequest, TransportFuture, UploadRequest, UploadTransport,
};
pub use types::{SessionParams, UploadEvent};

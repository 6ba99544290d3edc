//! Data types for upload sessions.

use bytes::Bytes;
use resumable_protocol::constants::DEFAULT_CONTENT_TYPE;
use resumable_protocol::{RetryBudget, UploadProgress};

/// Event emitted by an upload session.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Streaming is about to start at `offset`.
    Ready { offset: u64 },
    /// Periodic progress from the monitor.
    Progress(UploadProgress),
    /// A failed attempt is being recovered.
    Retrying {
        attempt: u32,
        bytes_confirmed: u64,
        error: String,
    },
    /// The service holds every byte; `body` is its final reply.
    Success { body: Bytes },
    /// The upload stopped on an error.
    Error { message: String },
}

/// Inputs for a fresh upload session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub credential_token: String,
    pub resource_metadata: serde_json::Value,
    pub content_type: String,
    /// Budget for this session; the configured default when `None`.
    pub retry_budget: Option<RetryBudget>,
    pub monitoring_enabled: bool,
}

impl SessionParams {
    pub fn new(credential_token: impl Into<String>, resource_metadata: serde_json::Value) -> Self {
        Self {
            credential_token: credential_token.into(),
            resource_metadata,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            retry_budget: None,
            monitoring_enabled: false,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn retry_budget(mut self, budget: RetryBudget) -> Self {
        self.retry_budget = Some(budget);
        self
    }

    pub fn monitoring(mut self, enabled: bool) -> Self {
        self.monitoring_enabled = enabled;
        self
    }
}

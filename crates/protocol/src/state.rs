//! Persisted session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONTENT_TYPE;
use crate::error::StateError;
use crate::types::RetryBudget;

/// Everything needed to resume an upload, possibly in another process.
///
/// A passive record: the upload session mutates it in place and hands out
/// snapshots, the caller decides where to store them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    /// Session URL issued by the service. Absent until initiation succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
    pub total_size: u64,
    /// Bytes the service has confirmed; the resume point.
    #[serde(default)]
    pub bytes_confirmed: u64,
    #[serde(default)]
    pub retry_budget: RetryBudget,
    pub credential_token: String,
    #[serde(default)]
    pub resource_metadata: serde_json::Value,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub source_descriptor: String,
    #[serde(default)]
    pub monitoring_enabled: bool,
    /// When the session URL was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_at: Option<DateTime<Utc>>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl StateRecord {
    /// Creates the record for an upload that has not been initiated yet.
    pub fn new(
        total_size: u64,
        credential_token: impl Into<String>,
        source_descriptor: impl Into<String>,
        resource_metadata: serde_json::Value,
    ) -> Self {
        Self {
            session_url: None,
            total_size,
            bytes_confirmed: 0,
            retry_budget: RetryBudget::default(),
            credential_token: credential_token.into(),
            resource_metadata,
            content_type: default_content_type(),
            source_descriptor: source_descriptor.into(),
            monitoring_enabled: false,
            initiated_at: None,
        }
    }

    /// Checks the session invariants.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.bytes_confirmed > self.total_size {
            return Err(StateError::ConfirmedExceedsTotal {
                confirmed: self.bytes_confirmed,
                total: self.total_size,
            });
        }
        match &self.session_url {
            Some(url) if url.is_empty() => Err(StateError::EmptySessionUrl),
            None if self.bytes_confirmed > 0 => {
                Err(StateError::ConfirmedWithoutSession(self.bytes_confirmed))
            }
            _ => Ok(()),
        }
    }

    /// Decodes and validates a record.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        let record: StateRecord = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Bytes still to be confirmed by the service.
    pub fn remaining(&self) -> u64 {
        self.total_size.saturating_sub(self.bytes_confirmed)
    }

    pub fn is_complete(&self) -> bool {
        self.session_url.is_some() && self.bytes_confirmed == self.total_size
    }

    /// Age of the session URL at `now`, if it was issued by this client.
    ///
    /// Session URLs are time-limited; callers may use this to decide
    /// whether a stored record is still worth resuming.
    pub fn session_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.initiated_at.map(|at| now - at)
    }
}

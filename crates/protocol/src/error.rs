//! Protocol and state record error types.

/// A reply did not follow the resumable upload grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("malformed {header} header: {value:?}")]
    MalformedHeader { header: &'static str, value: String },

    #[error("{header} header {value:?} is inconsistent with total size {total}")]
    OutOfBounds {
        header: &'static str,
        value: String,
        total: u64,
    },
}

/// A state record could not be decoded or violates the session invariants.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bytes confirmed ({confirmed}) exceeds total size ({total})")]
    ConfirmedExceedsTotal { confirmed: u64, total: u64 },

    #[error("bytes confirmed ({0}) without a session URL")]
    ConfirmedWithoutSession(u64),

    #[error("empty session URL")]
    EmptySessionUrl,
}

//! Wire-level types for the session-URL based resumable upload protocol.
//!
//! Nothing in this crate performs I/O. It defines the header grammar the
//! client speaks, the structured error payload the service answers with,
//! and the flat [`StateRecord`] a caller persists to resume an upload in a
//! later process.

pub mod constants;
pub mod error;
pub mod range;
pub mod state;
pub mod types;

// Re-export primary types for convenience.
pub use error::{ProtocolError, StateError};
pub use range::{ContentRange, parse_confirmed_range};
pub use state::StateRecord;
pub use types::{ApiError, ApiErrorBody, ApiErrorDetail, RetryBudget, UploadProgress};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{AUTH_ERROR_REASONS, RETRY_UNLIMITED};

/// How many automatic resume attempts remain after a streaming failure.
///
/// Serialized as a signed integer: `-1` is unlimited, `0` is exhausted and
/// `N > 0` is N attempts left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RetryBudget {
    #[default]
    Unlimited,
    Remaining(u32),
}

impl RetryBudget {
    /// No further retries.
    pub const EXHAUSTED: Self = Self::Remaining(0);

    pub fn is_exhausted(&self) -> bool {
        *self == Self::EXHAUSTED
    }

    pub fn is_unlimited(&self) -> bool {
        *self == Self::Unlimited
    }

    /// Takes one attempt from the budget.
    ///
    /// Returns `false` (and leaves the budget untouched) when it is
    /// already exhausted. The unlimited budget never decreases.
    pub fn consume(&mut self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Remaining(0) => false,
            Self::Remaining(n) => {
                *n -= 1;
                true
            }
        }
    }
}

impl From<RetryBudget> for i64 {
    fn from(budget: RetryBudget) -> Self {
        match budget {
            RetryBudget::Unlimited => RETRY_UNLIMITED,
            RetryBudget::Remaining(n) => i64::from(n),
        }
    }
}

impl TryFrom<i64> for RetryBudget {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            RETRY_UNLIMITED => Ok(Self::Unlimited),
            n if n >= 0 => u32::try_from(n)
                .map(Self::Remaining)
                .map_err(|_| format!("retry budget {n} is too large")),
            n => Err(format!("retry budget must be -1 or non-negative, got {n}")),
        }
    }
}

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Remaining(n) => write!(f, "{n}"),
        }
    }
}

/// Progress information for an active upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub bytes_confirmed: u64,
    pub total_size: u64,
    /// Observed server-side throughput, 0 until two probes have landed.
    #[serde(default)]
    pub bytes_per_second: f64,
    /// Estimated seconds until completion, if throughput is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
}

impl UploadProgress {
    pub fn new(bytes_confirmed: u64, total_size: u64) -> Self {
        Self {
            bytes_confirmed,
            total_size,
            bytes_per_second: 0.0,
            eta_secs: None,
        }
    }

    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.bytes_confirmed as f64 / self.total_size as f64 * 100.0
    }
}

/// Error payload returned by the service: `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

/// Structured rejection from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

/// One entry of [`ApiError::errors`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location_type: String,
}

impl ApiError {
    /// Returns `true` if the service rejected the credentials rather than
    /// the request content.
    pub fn is_auth_rejection(&self) -> bool {
        self.code == 401
            || self
                .errors
                .iter()
                .any(|d| AUTH_ERROR_REASONS.contains(&d.reason.as_str()))
    }

    /// Reason of the first error detail, if any.
    pub fn reason(&self) -> Option<&str> {
        self.errors.first().map(|d| d.reason.as_str())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)?;
        if let Some(reason) = self.reason() {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

//! Byte range headers.
//!
//! Outgoing requests carry `Content-Range` in one of two forms:
//!
//! - `bytes <start>-<end>/<total>`: the span being sent (inclusive end)
//! - `bytes */<total>`: an open query, or a zero-length finalize
//!
//! Probe replies carry `Range: bytes=0-<end>`, naming the last byte the
//! service has durably stored. Some deployments answer in the
//! `Content-Range` form instead, so both are accepted when parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

const CONTENT_RANGE: &str = "Content-Range";
const RANGE: &str = "Range";

/// A `Content-Range` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRange {
    /// `bytes <start>-<end>/<total>`
    Span { start: u64, end: u64, total: u64 },
    /// `bytes */<total>`
    Query { total: u64 },
}

impl ContentRange {
    /// Range to attach when streaming resumes at `offset`.
    ///
    /// Returns `None` for a fresh start (offset 0). When nothing remains,
    /// the open form is returned so the request finalizes the upload.
    pub fn resume_from(offset: u64, total: u64) -> Option<Self> {
        if offset == 0 {
            None
        } else if offset < total {
            Some(Self::Span {
                start: offset,
                end: total - 1,
                total,
            })
        } else {
            Some(Self::Query { total })
        }
    }

    /// Open query used by probes.
    pub fn query(total: u64) -> Self {
        Self::Query { total }
    }

    /// First byte of the span, if any.
    pub fn start(&self) -> Option<u64> {
        match self {
            Self::Span { start, .. } => Some(*start),
            Self::Query { .. } => None,
        }
    }

    /// Number of bytes the header announces.
    pub fn len(&self) -> u64 {
        match self {
            Self::Span { start, end, .. } => end - start + 1,
            Self::Query { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total(&self) -> u64 {
        match self {
            Self::Span { total, .. } | Self::Query { total } => *total,
        }
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Span { start, end, total } => write!(f, "bytes {start}-{end}/{total}"),
            Self::Query { total } => write!(f, "bytes */{total}"),
        }
    }
}

impl FromStr for ContentRange {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::MalformedHeader {
            header: CONTENT_RANGE,
            value: value.to_string(),
        };

        let spec = value.trim().strip_prefix("bytes ").ok_or_else(malformed)?;
        let (span, total) = spec.split_once('/').ok_or_else(malformed)?;
        let total = parse_number(total).ok_or_else(malformed)?;

        if span == "*" {
            return Ok(Self::Query { total });
        }

        let (start, end) = parse_span(span).ok_or_else(malformed)?;
        if end >= total {
            return Err(ProtocolError::OutOfBounds {
                header: CONTENT_RANGE,
                value: value.to_string(),
                total,
            });
        }
        Ok(Self::Span { start, end, total })
    }
}

/// Parses the range a probe reply reports and returns the number of bytes
/// the service has confirmed.
///
/// The header names an inclusive last byte, so `bytes=0-399` confirms 400
/// bytes. The span must start at zero and stay within `total`; a declared
/// total, when present, must equal `total`.
pub fn parse_confirmed_range(value: &str, total: u64) -> Result<u64, ProtocolError> {
    let malformed = || ProtocolError::MalformedHeader {
        header: RANGE,
        value: value.to_string(),
    };
    let out_of_bounds = || ProtocolError::OutOfBounds {
        header: RANGE,
        value: value.to_string(),
        total,
    };

    let spec = value
        .trim()
        .strip_prefix("bytes")
        .and_then(|rest| rest.strip_prefix('=').or_else(|| rest.strip_prefix(' ')))
        .ok_or_else(malformed)?;

    let (span, declared_total) = match spec.split_once('/') {
        Some((span, t)) => (span, Some(parse_number(t).ok_or_else(malformed)?)),
        None => (spec, None),
    };

    let (start, end) = parse_span(span).ok_or_else(malformed)?;

    if declared_total.is_some_and(|t| t != total) {
        return Err(out_of_bounds());
    }
    if start != 0 || end >= total {
        return Err(out_of_bounds());
    }

    Ok(end + 1)
}

/// Parses `<start>-<end>` with `start <= end`.
fn parse_span(span: &str) -> Option<(u64, u64)> {
    let (start, end) = span.split_once('-')?;
    let start = parse_number(start)?;
    let end = parse_number(end)?;
    (start <= end).then_some((start, end))
}

/// Parses a plain decimal number. Signs and whitespace are rejected.
fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

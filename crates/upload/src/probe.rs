//! Confirmed-offset queries.

use bytes::Bytes;
use resumable_protocol::constants::STATUS_RESUME_INCOMPLETE;
use resumable_protocol::{ProtocolError, parse_confirmed_range};
use tracing::trace;

use crate::error::{TransportError, UploadError};
use crate::transport::{ProbeRequest, UploadTransport};

const RANGE: &str = "Range";

/// What the service reports about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The service holds this many bytes and expects more.
    Incomplete(u64),
    /// The service holds every byte; carries its final reply.
    Complete(Bytes),
}

impl ProbeStatus {
    /// Confirmed byte count, taking a complete upload as `total_size`.
    pub fn confirmed(&self, total_size: u64) -> u64 {
        match self {
            Self::Incomplete(n) => *n,
            Self::Complete(_) => total_size,
        }
    }
}

/// Asks the service how much of the payload it has durably stored.
///
/// Never retries; a failed probe is reported to the caller.
pub async fn probe(
    transport: &dyn UploadTransport,
    request: ProbeRequest,
) -> Result<ProbeStatus, UploadError> {
    let total = request.total_size;
    let reply = transport.send_probe(request).await?;

    match reply.status {
        STATUS_RESUME_INCOMPLETE => {
            let range = reply
                .header(RANGE)
                .ok_or(ProtocolError::MissingHeader(RANGE))?;
            let confirmed = parse_confirmed_range(range, total)?;
            trace!(confirmed, total, "probe reply");
            Ok(ProbeStatus::Incomplete(confirmed))
        }
        200 | 201 => Ok(ProbeStatus::Complete(reply.body)),
        401 => Err(UploadError::Auth(reply.body_text())),
        status => Err(TransportError::with_status(status, reply.body_text()).into()),
    }
}

/// Returns the number of bytes the service has confirmed.
pub async fn query_offset(
    transport: &dyn UploadTransport,
    request: ProbeRequest,
) -> Result<u64, UploadError> {
    let total = request.total_size;
    Ok(probe(transport, request).await?.confirmed(total))
}

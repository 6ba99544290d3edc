//! Streams the payload to the session URL.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use resumable_protocol::constants::STATUS_RESUME_INCOMPLETE;
use resumable_transfer::{PipeError, body_channel, pipe_to_sink};
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::error::{TransportError, UploadError};
use crate::transport::{HttpReply, UploadRequest, UploadTransport};

/// Where a failed attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Nothing was handed to the transport.
    BeforeTransfer,
    /// Part of the payload was handed to the transport.
    MidTransfer,
    /// The whole payload was sent; the reply was missing or unusable.
    AwaitingResponse,
}

/// A failed streaming attempt.
#[derive(Debug)]
pub struct StreamFailure {
    pub error: UploadError,
    /// Offset the attempt started at.
    pub offset: u64,
    /// Bytes handed to the transport before the failure. Not confirmed.
    pub bytes_sent: u64,
    pub stage: FailureStage,
}

/// Result of one streaming attempt.
#[derive(Debug)]
pub enum StreamOutcome {
    /// The service acknowledged the whole payload; carries its reply body.
    Completed(Bytes),
    Failed(StreamFailure),
}

/// Fixed parameters of the upload being streamed.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub session_url: String,
    pub token: String,
    pub content_type: String,
    pub total_size: u64,
}

/// Sends the tail of a payload in a single PUT.
#[derive(Debug, Clone)]
pub struct ChunkStreamer {
    chunk_size: usize,
    channel_capacity: usize,
}

impl ChunkStreamer {
    pub fn new(chunk_size: usize, channel_capacity: usize) -> Self {
        Self {
            chunk_size,
            channel_capacity,
        }
    }

    /// Streams bytes `offset..total_size` from `reader` to the session URL.
    ///
    /// `reader` must already be positioned at `offset`. Bytes travel through
    /// a bounded channel into the request body, so a slow connection slows
    /// the reader down. Never retries.
    pub async fn stream_from<R>(
        &self,
        transport: &dyn UploadTransport,
        target: &StreamTarget,
        offset: u64,
        reader: &mut R,
    ) -> StreamOutcome
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let request = UploadRequest::from_offset(
            &target.session_url,
            &target.token,
            &target.content_type,
            offset,
            target.total_size,
        );
        let expected = request.content_length;
        debug!(offset, length = expected, total = target.total_size, "streaming");

        let (mut sink, body) = body_channel(self.channel_capacity);
        let sent = AtomicU64::new(0);

        let (reply, piped) = tokio::join!(
            transport.send_upload(request, body),
            pipe_to_sink(reader, &mut sink, expected, self.chunk_size, &sent),
        );
        let bytes_sent = sent.load(Ordering::Relaxed);
        let stage = stage_at(bytes_sent, expected);

        let failed = |error: UploadError, stage: FailureStage| {
            warn!(offset, bytes_sent, ?stage, error = %error, "streaming attempt failed");
            StreamOutcome::Failed(StreamFailure {
                error,
                offset,
                bytes_sent,
                stage,
            })
        };

        // A local read failure is reported over whatever the transport saw.
        if let Err(e @ (PipeError::Source(_) | PipeError::ShortSource { .. })) = piped {
            return failed(e.into(), stage);
        }

        match reply {
            Ok(reply) if reply.is_success() => {
                debug!(status = reply.status, bytes_sent, "payload acknowledged");
                StreamOutcome::Completed(reply.body)
            }
            Ok(reply) => failed(reply_error(reply), stage),
            Err(e) => failed(e.into(), stage),
        }
    }
}

fn stage_at(sent: u64, expected: u64) -> FailureStage {
    if sent == 0 {
        FailureStage::BeforeTransfer
    } else if sent < expected {
        FailureStage::MidTransfer
    } else {
        FailureStage::AwaitingResponse
    }
}

/// Maps a non-2xx reply to an upload PUT.
fn reply_error(reply: HttpReply) -> UploadError {
    match reply.status {
        STATUS_RESUME_INCOMPLETE => TransportError::with_status(
            STATUS_RESUME_INCOMPLETE,
            "service reports the upload as incomplete",
        )
        .into(),
        401 => UploadError::Auth(reply.body_text()),
        status => TransportError::with_status(status, reply.body_text()).into(),
    }
}

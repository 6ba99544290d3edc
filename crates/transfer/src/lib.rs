//! Streaming plumbing for resumable uploads.
//!
//! A [`ByteSource`] hands out readers positioned at a byte offset, a
//! [`ByteSink`] accepts chunks and a completion signal, and [`pipe_to_sink`]
//! moves bytes from one to the other with backpressure. The channel-backed
//! sink pairs with a [`BodyStream`] an HTTP client can send as a request
//! body, so the payload is never buffered whole.

mod pipe;
mod progress;
mod sink;
mod source;
mod validation;

pub use pipe::{PipeError, pipe_to_sink};
pub use progress::SpeedCalculator;
pub use sink::{BodyStream, ByteSink, ChannelSink, SinkClosed, body_channel};
pub use source::{ByteSource, FileSource, MemorySource, SourceReader};
pub use validation::validate_source_file;

/// Default read size when streaming: 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default number of chunks buffered between the source and the request body.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("offset {offset} is past the end of the source ({size} bytes)")]
    OffsetOutOfRange { offset: u64, size: u64 },

    #[error("not a regular file: {0}")]
    NotAFile(String),
}

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::sink::{ByteSink, SinkClosed};

/// Why a pipe stopped before delivering every byte.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("source read failed: {0}")]
    Source(#[from] io::Error),

    #[error("source ended after {read} of {expected} bytes")]
    ShortSource { expected: u64, read: u64 },

    #[error(transparent)]
    SinkClosed(#[from] SinkClosed),
}

/// Copies exactly `expected` bytes from `reader` into `sink`.
///
/// Reads at most `chunk_size` bytes at a time and waits on the sink between
/// reads, so the reader advances only as fast as the consumer drains. Every
/// byte accepted by the sink is added to `sent`, which callers may watch
/// while the pipe runs.
///
/// On a source failure the sink is failed too, so the consumer sees an
/// error instead of a truncated payload. On success the sink is finished.
pub async fn pipe_to_sink<R, S>(
    reader: &mut R,
    sink: &mut S,
    expected: u64,
    chunk_size: usize,
    sent: &AtomicU64,
) -> Result<u64, PipeError>
where
    R: AsyncRead + Unpin + ?Sized,
    S: ByteSink,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut remaining = expected;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]).await {
            Ok(0) => {
                let read = expected - remaining;
                sink.fail(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "source ended early",
                ))
                .await;
                return Err(PipeError::ShortSource { expected, read });
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                sink.fail(io::Error::new(e.kind(), e.to_string())).await;
                return Err(PipeError::Source(e));
            }
        };

        sink.write(Bytes::copy_from_slice(&buf[..n])).await?;
        remaining -= n as u64;
        sent.fetch_add(n as u64, Ordering::Relaxed);
        trace!(chunk = n, remaining, "chunk piped");
    }

    sink.finish();
    Ok(expected)
}

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

/// The receiving side went away; no more bytes will be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("byte sink closed")]
pub struct SinkClosed;

/// Narrow write-only capability the streamer pushes payload bytes into.
pub trait ByteSink: Send {
    /// Writes one chunk, waiting while the consumer is behind.
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), SinkClosed>> + Send;

    /// Signals the end of the payload.
    fn finish(&mut self);

    /// Signals that the payload cannot be completed.
    fn fail(&mut self, err: io::Error) -> impl Future<Output = ()> + Send;
}

/// Creates a bounded sink/stream pair.
///
/// At most `capacity` chunks are buffered, so a slow connection holds the
/// writer back instead of letting the payload pile up in memory.
pub fn body_channel(capacity: usize) -> (ChannelSink, BodyStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx: Some(tx) }, BodyStream { rx })
}

/// Sink half of [`body_channel`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<io::Result<Bytes>>>,
}

impl ByteSink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        let Some(tx) = &self.tx else {
            return Err(SinkClosed);
        };
        tx.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }

    fn finish(&mut self) {
        // Dropping the sender ends the stream.
        self.tx.take();
    }

    async fn fail(&mut self, err: io::Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(err)).await;
        }
    }
}

/// Stream half of [`body_channel`], suitable as a streamed request body.
#[derive(Debug)]
pub struct BodyStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Stream for BodyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use resumable_transfer::BodyStream;

use crate::error::TransportError;
use crate::transport::{
    HttpReply, InitiationRequest, ProbeRequest, TransportFuture, UploadRequest, UploadTransport,
};

/// How the mock handles one upload request.
#[derive(Debug)]
pub(crate) struct UploadScript {
    /// Stop reading the body after this many bytes.
    read_limit: Option<u64>,
    delay: Duration,
    hang: bool,
    result: Result<HttpReply, TransportError>,
}

impl UploadScript {
    /// Reads the whole body, then answers with `reply`.
    pub(crate) fn reply(reply: HttpReply) -> Self {
        Self {
            read_limit: None,
            delay: Duration::ZERO,
            hang: false,
            result: Ok(reply),
        }
    }

    /// Reads at least `bytes` of the body, then fails the connection.
    pub(crate) fn drop_after(bytes: u64, err: TransportError) -> Self {
        Self {
            read_limit: Some(bytes),
            delay: Duration::ZERO,
            hang: false,
            result: Err(err),
        }
    }

    /// Fails without reading anything.
    pub(crate) fn refuse(err: TransportError) -> Self {
        Self::drop_after(0, err)
    }

    /// Reads the whole body and never answers.
    pub(crate) fn hang() -> Self {
        Self {
            hang: true,
            ..Self::reply(HttpReply::new(200))
        }
    }

    /// Waits `delay` after reading the body.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// An upload request as the mock saw it.
#[derive(Debug, Clone)]
pub(crate) struct RecordedUpload {
    pub(crate) request: UploadRequest,
    pub(crate) body: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    initiation_replies: VecDeque<Result<HttpReply, TransportError>>,
    upload_scripts: VecDeque<UploadScript>,
    probe_replies: VecDeque<Result<HttpReply, TransportError>>,
    initiations: Vec<InitiationRequest>,
    uploads: Vec<RecordedUpload>,
    probes: Vec<ProbeRequest>,
}

/// Transport answering from per-operation queues and recording requests.
///
/// An operation with nothing queued fails with a transport error.
#[derive(Default)]
pub(crate) struct MockTransport {
    inner: Mutex<Inner>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_initiation(&self, reply: Result<HttpReply, TransportError>) {
        self.inner.lock().unwrap().initiation_replies.push_back(reply);
    }

    pub(crate) fn push_upload(&self, script: UploadScript) {
        self.inner.lock().unwrap().upload_scripts.push_back(script);
    }

    pub(crate) fn push_probe(&self, reply: Result<HttpReply, TransportError>) {
        self.inner.lock().unwrap().probe_replies.push_back(reply);
    }

    /// Queues a 308 reply confirming `confirmed` bytes (at least one).
    pub(crate) fn push_probe_confirmed(&self, confirmed: u64) {
        assert!(confirmed > 0, "a Range header cannot confirm zero bytes");
        self.push_probe(Ok(
            HttpReply::new(308).with_header("Range", &format!("bytes=0-{}", confirmed - 1))
        ));
    }

    pub(crate) fn initiations(&self) -> Vec<InitiationRequest> {
        self.inner.lock().unwrap().initiations.clone()
    }

    pub(crate) fn uploads(&self) -> Vec<RecordedUpload> {
        self.inner.lock().unwrap().uploads.clone()
    }

    pub(crate) fn probes(&self) -> Vec<ProbeRequest> {
        self.inner.lock().unwrap().probes.clone()
    }
}

fn unscripted(op: &str) -> TransportError {
    TransportError::new(format!("no scripted {op} reply"))
}

impl UploadTransport for MockTransport {
    fn send_initiation(&self, request: InitiationRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.initiations.push(request);
            inner
                .initiation_replies
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("initiation")))
        })
    }

    fn send_upload(&self, request: UploadRequest, mut body: BodyStream) -> TransportFuture<'_> {
        Box::pin(async move {
            let (index, script) = {
                let mut inner = self.inner.lock().unwrap();
                inner.uploads.push(RecordedUpload {
                    request,
                    body: Vec::new(),
                });
                let index = inner.uploads.len() - 1;
                (index, inner.upload_scripts.pop_front())
            };
            let Some(script) = script else {
                return Err(unscripted("upload"));
            };

            let limit = script.read_limit.unwrap_or(u64::MAX);
            let mut received = Vec::new();
            while (received.len() as u64) < limit {
                match body.next().await {
                    Some(Ok(chunk)) => received.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        self.inner.lock().unwrap().uploads[index].body = received;
                        return Err(TransportError::new(format!("request body failed: {e}")));
                    }
                    None => break,
                }
            }
            self.inner.lock().unwrap().uploads[index].body = received;
            drop(body);

            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
            if script.hang {
                std::future::pending::<()>().await;
            }
            script.result
        })
    }

    fn send_probe(&self, request: ProbeRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.probes.push(request);
            inner
                .probe_replies
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("probe")))
        })
    }
}

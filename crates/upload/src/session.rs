//! Upload session orchestrator.
//!
//! Owns the [`StateRecord`] and drives initiation, streaming, recovery and
//! monitoring to a terminal state, reporting through a per-session event
//! channel.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use resumable_protocol::{RetryBudget, StateRecord};
use resumable_transfer::{ByteSource, TransferError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::initiator::SessionInitiator;
use crate::monitor::ProgressMonitor;
use crate::probe::probe;
use crate::retry::{Recovery, RetryController};
use crate::streamer::{ChunkStreamer, StreamOutcome, StreamTarget};
use crate::transport::{ProbeRequest, UploadTransport};
use crate::types::{SessionParams, UploadEvent};

/// One resumable upload.
pub struct UploadSession {
    state: StateRecord,
    transport: Arc<dyn UploadTransport>,
    source: Arc<dyn ByteSource>,
    config: UploaderConfig,
    initiator: SessionInitiator,
    streamer: ChunkStreamer,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadSession {
    /// Creates a session for an upload that has not been initiated yet.
    pub fn new(
        params: SessionParams,
        transport: Arc<dyn UploadTransport>,
        source: Arc<dyn ByteSource>,
        config: UploaderConfig,
    ) -> Self {
        let mut state = StateRecord::new(
            source.size(),
            params.credential_token,
            source.descriptor(),
            params.resource_metadata,
        );
        state.content_type = params.content_type;
        state.retry_budget = params.retry_budget.unwrap_or(config.retry_budget);
        state.monitoring_enabled = params.monitoring_enabled;

        Self::with_state(state, transport, source, config)
    }

    /// Restores a session from a persisted record.
    ///
    /// The source must still have the recorded size.
    pub fn from_record(
        record: StateRecord,
        transport: Arc<dyn UploadTransport>,
        source: Arc<dyn ByteSource>,
        config: UploaderConfig,
    ) -> Result<Self, UploadError> {
        record.validate()?;
        if source.size() != record.total_size {
            return Err(TransferError::SizeMismatch {
                expected: record.total_size,
                actual: source.size(),
            }
            .into());
        }
        if source.descriptor() != record.source_descriptor {
            warn!(
                recorded = %record.source_descriptor,
                actual = %source.descriptor(),
                "resuming with a different source descriptor"
            );
        }
        debug!(
            confirmed = record.bytes_confirmed,
            total = record.total_size,
            has_session = record.session_url.is_some(),
            "session restored"
        );
        Ok(Self::with_state(record, transport, source, config))
    }

    fn with_state(
        state: StateRecord,
        transport: Arc<dyn UploadTransport>,
        source: Arc<dyn ByteSource>,
        config: UploaderConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            initiator: SessionInitiator::new(config.initiation_url.clone()),
            streamer: ChunkStreamer::new(config.chunk_size, config.channel_capacity),
            state,
            transport,
            source,
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Nothing is sent until the receiver has been taken; with monitoring
    /// enabled, progress probing also waits for it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that tears this session down.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the monitor and aborts any in-flight request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Replaces the bearer token, e.g. after a refresh before resuming.
    pub fn set_credential_token(&mut self, token: impl Into<String>) {
        self.state.credential_token = token.into();
    }

    pub fn record(&self) -> &StateRecord {
        &self.state
    }

    /// Snapshot of the state for persistence.
    pub fn to_record(&self) -> StateRecord {
        self.state.clone()
    }

    pub fn bytes_confirmed(&self) -> u64 {
        self.state.bytes_confirmed
    }

    pub fn total_size(&self) -> u64 {
        self.state.total_size
    }

    pub fn session_url(&self) -> Option<&str> {
        self.state.session_url.as_deref()
    }

    pub fn retry_budget(&self) -> RetryBudget {
        self.state.retry_budget
    }

    /// Runs the upload to a terminal state and returns the service's final
    /// reply body.
    ///
    /// Creates the session only if the record has no session URL yet, then
    /// streams from the confirmed offset and recovers failures within the
    /// retry budget. On [`UploadError::RetryExhausted`] the record still
    /// holds the session URL and confirmed offset, so persisting it allows a
    /// later resume.
    pub async fn upload(&mut self) -> Result<Bytes, UploadError> {
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            r = self.run() => r,
        };

        match &result {
            Ok(body) => {
                info!(
                    total = self.state.total_size,
                    source = %self.state.source_descriptor,
                    "upload completed"
                );
                self.emit(UploadEvent::Success { body: body.clone() }).await;
            }
            Err(e) => {
                error!(
                    confirmed = self.state.bytes_confirmed,
                    total = self.state.total_size,
                    error = %e,
                    "upload failed"
                );
                self.emit(UploadEvent::Error {
                    message: e.to_string(),
                })
                .await;
            }
        }
        result
    }

    async fn run(&mut self) -> Result<Bytes, UploadError> {
        let session_url = match self.state.session_url.clone() {
            Some(url) => {
                debug!(session_url = %url, "reusing upload session");
                url
            }
            None => {
                let url = self
                    .initiator
                    .initiate(self.transport.as_ref(), &self.state)
                    .await?;
                self.state.session_url = Some(url.clone());
                self.state.bytes_confirmed = 0;
                self.state.initiated_at = Some(Utc::now());
                info!(session_url = %url, total = self.state.total_size, "upload session initiated");
                url
            }
        };

        let total = self.state.total_size;
        let target = StreamTarget {
            session_url: session_url.clone(),
            token: self.state.credential_token.clone(),
            content_type: self.state.content_type.clone(),
            total_size: total,
        };
        let probe_request = ProbeRequest {
            session_url,
            token: self.state.credential_token.clone(),
            total_size: total,
        };
        let mut retry = RetryController::new(self.config.backoff.clone(), self.cancel.clone());

        self.emit(UploadEvent::Ready {
            offset: self.state.bytes_confirmed,
        })
        .await;

        loop {
            retry.begin_attempt();
            let offset = self.state.bytes_confirmed;

            let failure = match self.attempt(&target, &probe_request, offset).await? {
                StreamOutcome::Completed(body) => {
                    self.state.bytes_confirmed = total;
                    return Ok(body);
                }
                StreamOutcome::Failed(failure) => failure,
            };

            let message = failure.error.to_string();
            let transport = self.transport.clone();
            let recovery = retry
                .recover(&mut self.state.retry_budget, failure, || {
                    probe(transport.as_ref(), probe_request.clone())
                })
                .await?;

            match recovery {
                Recovery::Resume(confirmed) => {
                    self.state.bytes_confirmed = confirmed;
                    self.emit(UploadEvent::Retrying {
                        attempt: retry.attempts(),
                        bytes_confirmed: confirmed,
                        error: message,
                    })
                    .await;
                }
                Recovery::Complete(body) => {
                    self.state.bytes_confirmed = total;
                    return Ok(body);
                }
            }
        }
    }

    /// One streaming attempt from `offset`, with the monitor running
    /// alongside when enabled.
    async fn attempt(
        &self,
        target: &StreamTarget,
        probe_request: &ProbeRequest,
        offset: u64,
    ) -> Result<StreamOutcome, UploadError> {
        let mut reader = self.source.open_at(offset).await?;

        let monitor = (self.state.monitoring_enabled && self.events_rx.is_none()).then(|| {
            ProgressMonitor::spawn(
                self.transport.clone(),
                probe_request.clone(),
                offset,
                self.config.probe_interval(),
                self.events_tx.clone(),
                &self.cancel,
            )
        });

        let outcome = self
            .streamer
            .stream_from(self.transport.as_ref(), target, offset, &mut reader)
            .await;

        if let Some(monitor) = monitor {
            monitor.stop().await;
        }
        Ok(outcome)
    }

    async fn emit(&self, event: UploadEvent) {
        if self.events_rx.is_some() {
            return;
        }
        let _ = self.events_tx.send(event).await;
    }
}

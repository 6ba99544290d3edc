//! Periodic progress probing while a payload streams.

use std::sync::Arc;
use std::time::Duration;

use resumable_protocol::UploadProgress;
use resumable_transfer::SpeedCalculator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::probe::probe;
use crate::transport::{ProbeRequest, UploadTransport};
use crate::types::UploadEvent;

/// Background task probing the session on a fixed interval.
///
/// Stops on its own once the service reports every byte. Dropping the
/// monitor cancels the task, so every exit path of an upload ends it.
pub struct ProgressMonitor {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Spawns the task. The first probe runs one `interval` after the call.
    ///
    /// `start_offset` is the confirmed offset streaming started from; it
    /// anchors the throughput estimate. Cancelling `parent` stops the task.
    pub fn spawn(
        transport: Arc<dyn UploadTransport>,
        request: ProbeRequest,
        start_offset: u64,
        interval: Duration,
        events: mpsc::Sender<UploadEvent>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            run(transport, request, start_offset, interval, events, task_cancel).await;
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancels the task and waits for it to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    transport: Arc<dyn UploadTransport>,
    request: ProbeRequest,
    start_offset: u64,
    interval: Duration,
    events: mpsc::Sender<UploadEvent>,
    cancel: CancellationToken,
) {
    let total = request.total_size;
    let speed = SpeedCalculator::new(None, None);
    speed.add_sample_at(0, Instant::now().into_std());
    let mut last = start_offset;

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(interval_ms = interval.as_millis() as u64, "progress monitor started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            r = probe(transport.as_ref(), request.clone()) => r,
        };

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                debug!(error = %e, "progress probe failed");
                continue;
            }
        };

        let confirmed = status.confirmed(total);
        speed.add_sample_at(confirmed.saturating_sub(last), Instant::now().into_std());
        last = confirmed;

        let mut progress = UploadProgress::new(confirmed, total);
        progress.bytes_per_second = speed.bytes_per_second();
        progress.eta_secs = speed
            .eta(total.saturating_sub(confirmed))
            .map(|d| d.as_secs_f64());
        trace!(confirmed, total, "progress");

        // A full channel drops the sample; the next tick carries newer data.
        let _ = events.try_send(UploadEvent::Progress(progress));

        if confirmed >= total {
            debug!("service holds every byte, progress monitor done");
            break;
        }
    }
}

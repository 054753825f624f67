use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracker_logging::{tracker_debug, tracker_info, tracker_warn};

use crate::{ReconnectSettings, Tracker, TransportError};

/// Live connection to the backend's event stream.
///
/// Implementations re-establish their subscriptions inside `connect`, so a
/// reconnect resumes delivery but does not replay what was missed.
#[async_trait::async_trait]
pub trait EventTransport: Send {
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Next raw frame. `Ok(None)` means the stream ended cleanly.
    async fn next_frame(&mut self) -> Result<Option<String>, TransportError>;

    /// Releases the connection. Must be safe to call when not connected.
    async fn disconnect(&mut self);
}

/// Adapts any stream of frames into a transport. Errors in the stream act as
/// connection drops; the stream keeps being polled after a reconnect.
pub struct StreamTransport<S> {
    stream: S,
    connected: bool,
}

impl<S> StreamTransport<S>
where
    S: Stream<Item = Result<String, TransportError>> + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[async_trait::async_trait]
impl<S> EventTransport for StreamTransport<S>
where
    S: Stream<Item = Result<String, TransportError>> + Unpin + Send,
{
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        if !self.connected {
            return Err(TransportError::Dropped("not connected".to_string()));
        }
        match self.stream.next().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(err)) => {
                self.connected = false;
                Err(err)
            }
            None => Ok(None),
        }
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Totals for one pump run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpSummary {
    pub connections: u32,
    pub frames: u64,
    pub malformed: u64,
    pub drops: u32,
}

/// Feeds frames from `transport` into `tracker` until the stream ends, the
/// token is cancelled, or reconnect attempts run out. The transport is
/// disconnected on every exit path.
pub async fn run_transport<T>(
    transport: &mut T,
    tracker: &Tracker,
    settings: &ReconnectSettings,
    cancel: &CancellationToken,
) -> Result<PumpSummary, TransportError>
where
    T: EventTransport + ?Sized,
{
    let mut summary = PumpSummary::default();
    let result = pump(transport, tracker, settings, cancel, &mut summary).await;
    transport.disconnect().await;
    match &result {
        Ok(()) => tracker_info!(
            "transport closed after {} frames ({} malformed, {} drops)",
            summary.frames,
            summary.malformed,
            summary.drops
        ),
        Err(err) => tracker_warn!("transport gave up: {}", err),
    }
    result.map(|()| summary)
}

enum Step<T> {
    Cancelled,
    Done(T),
}

async fn until_cancelled<F, T>(cancel: &CancellationToken, future: F) -> Step<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        _ = cancel.cancelled() => Step::Cancelled,
        output = future => Step::Done(output),
    }
}

async fn pump<T>(
    transport: &mut T,
    tracker: &Tracker,
    settings: &ReconnectSettings,
    cancel: &CancellationToken,
    summary: &mut PumpSummary,
) -> Result<(), TransportError>
where
    T: EventTransport + ?Sized,
{
    let mut failures: u32 = 0;
    loop {
        let connected = match until_cancelled(cancel, transport.connect()).await {
            Step::Cancelled => return Ok(()),
            Step::Done(result) => result,
        };
        if let Err(err) = connected {
            tracker_warn!("transport connect failed: {}", err);
            tracker.note_transport_error();
            failures += 1;
            if settings.exhausted(failures) {
                return Err(err);
            }
            if !backoff(settings.backoff_for(failures), cancel).await {
                return Ok(());
            }
            continue;
        }

        if summary.connections > 0 {
            tracker_info!("transport reconnected after {} drops", summary.drops);
        }
        summary.connections += 1;
        failures = 0;

        let dropped = loop {
            let next = match until_cancelled(cancel, transport.next_frame()).await {
                Step::Cancelled => return Ok(()),
                Step::Done(next) => next,
            };
            match next {
                Ok(Some(frame)) => {
                    summary.frames += 1;
                    if tracker.ingest_frame(&frame).is_err() {
                        summary.malformed += 1;
                    }
                }
                Ok(None) => {
                    tracker_debug!("transport stream ended");
                    return Ok(());
                }
                Err(err) => break err,
            }
        };

        tracker_warn!("transport dropped: {}", dropped);
        tracker.note_transport_error();
        summary.drops += 1;
        transport.disconnect().await;
        failures += 1;
        if settings.exhausted(failures) {
            return Err(dropped);
        }
        if !backoff(settings.backoff_for(failures), cancel).await {
            return Ok(());
        }
    }
}

/// Sleeps for `delay`; returns `false` if cancelled first.
async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    matches!(
        until_cancelled(cancel, tokio::time::sleep(delay)).await,
        Step::Done(())
    )
}

use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;
use tracker_logging::tracker_error;

use crate::transport::{run_transport, EventTransport, PumpSummary};
use crate::{ReconnectSettings, Tracker, TransportError};

/// Runs a transport pump on a background thread with its own runtime.
///
/// Dropping the handle cancels the pump; [`TransportHandle::join`] waits for
/// it to disconnect and reports how the run ended.
pub struct TransportHandle {
    cancel: CancellationToken,
    thread: Option<thread::JoinHandle<Result<PumpSummary, TransportError>>>,
}

impl TransportHandle {
    pub fn spawn<T>(mut transport: T, tracker: Arc<Tracker>, settings: ReconnectSettings) -> Self
    where
        T: EventTransport + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let thread = thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracker_error!("could not start transport runtime: {}", err);
                    return Err(TransportError::Runtime(err.to_string()));
                }
            };
            runtime.block_on(async {
                run_transport(&mut transport, tracker.as_ref(), &settings, &token).await
            })
        });

        Self {
            cancel,
            thread: Some(thread),
        }
    }

    /// Asks the pump to disconnect and stop. Does not wait.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|thread| thread.is_finished())
    }

    /// Waits for the pump thread to exit.
    pub fn join(mut self) -> Result<PumpSummary, TransportError> {
        let Some(thread) = self.thread.take() else {
            return Ok(PumpSummary::default());
        };
        thread
            .join()
            .unwrap_or_else(|_| Err(TransportError::Runtime("transport thread panicked".into())))
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

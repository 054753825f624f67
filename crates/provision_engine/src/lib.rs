//! Provision engine: job registry, event intake, fan-out and the transport pump.
mod clock;
mod engine;
mod error;
mod notify;
mod pending;
mod registry;
mod settings;
mod subscribers;
mod tombstones;
mod tracker;
mod transport;

pub use clock::{Clock, FakeClock, SystemClock};
pub use engine::TransportHandle;
pub use error::{TrackerError, TransportError};
pub use notify::{ChannelNotificationSink, NotificationDispatcher, NotificationSink};
pub use registry::JobRegistry;
pub use settings::{ReconnectSettings, TrackerSettings};
pub use subscribers::{SubscriberRegistry, Subscription, Target, Update};
pub use tracker::{Diagnostics, Disposition, Tracker};
pub use transport::{run_transport, EventTransport, PumpSummary, StreamTransport};

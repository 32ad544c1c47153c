//! Live telemetry streaming: one metrics feed per test and any number of
//! independent per-worker log tails, each over its own server-sent event
//! stream.
pub mod buffer;
pub mod client;
pub mod parser;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use buffer::{LOG_BUFFER_CAPACITY, LogBuffer};
pub use client::LiveTelemetry;
pub use parser::{EventFrameParser, FrameDecoder, LogLineDecoder, MetricsDecoder};
pub use registry::{LiveSession, SessionRegistry};
pub use session::{
    EventReceiver, EventSender, MetricsSession, SessionContext, SessionEvent, SessionEventKind,
    SessionInfo, SessionKey, SessionKind, SessionStatus, WorkerLogSession,
};
pub use transport::{ByteStream, HttpStreamConnector, StreamConnector};
pub use types::{MetricsSnapshot, StatusCodeBreakdown, Summary, Worker};

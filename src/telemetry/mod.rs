//! Telemetry for the scheduler: structured logging and per-op spans.

mod logging;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{OpSpan, SpanExt};

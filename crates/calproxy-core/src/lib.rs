//! Core types: event start times, display formatting, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{DisplayEvent, RawEvent, RawEventStart, format_event, format_events};
pub use time::{DateParseError, EventStart};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

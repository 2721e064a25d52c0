//! Core dispatcher types and traits

pub mod call_site;
pub mod dispatcher;
pub mod error;
pub mod failure_policy;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod sink;

pub use call_site::CallSite;
pub use dispatcher::{Dispatcher, DispatcherBuilder, FailureReporter, SinkId};
pub use error::{DispatcherError, Result};
pub use failure_policy::{SinkFailure, SinkFailureCallback, SinkFailurePolicy};
pub use log_event::LogEvent;
pub use log_level::LogLevel;
pub use metrics::DispatcherMetrics;
pub use sink::Sink;

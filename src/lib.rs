//! # Blabber
//!
//! A leveled log dispatcher with lazy message evaluation and call-site
//! capture.
//!
//! ## Features
//!
//! - **Lazy**: messages are only formatted when their level passes the filter
//! - **Call sites**: file, function and line are captured by the macros
//! - **Per-module levels**: tag events with a module and give it its own threshold
//! - **Isolated sinks**: a failing sink never stops the others or the caller
//! - **Thread safe**: one process-wide dispatcher, or as many injected ones as you like
//!
//! ```
//! use blabber::prelude::*;
//! use blabber::{error, info};
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemorySink::new());
//! let dispatcher = Dispatcher::builder()
//!     .min_level(LogLevel::Warning)
//!     .shared_sink(memory.clone())
//!     .build();
//!
//! info!(dispatcher: &dispatcher, "filtered out, never formatted");
//! error!(dispatcher: &dispatcher, module: "Net", "connection lost after {} retries", 3);
//!
//! assert_eq!(memory.messages(), vec!["connection lost after 3 retries"]);
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::sinks::ConsoleSink;
    pub use crate::sinks::MemorySink;
    pub use crate::core::{
        CallSite, Dispatcher, DispatcherBuilder, DispatcherError, DispatcherMetrics, LogEvent,
        LogLevel, Result, Sink, SinkFailure, SinkFailurePolicy, SinkId,
    };
}

pub use core::{
    CallSite, Dispatcher, DispatcherBuilder, DispatcherError, DispatcherMetrics, FailureReporter,
    LogEvent, LogLevel, Result, Sink, SinkFailure, SinkFailureCallback, SinkFailurePolicy, SinkId,
};

/// The process-wide dispatcher, see [`Dispatcher::shared`].
#[inline]
pub fn shared() -> &'static Dispatcher {
    Dispatcher::shared()
}

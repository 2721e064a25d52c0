//! Sink implementations

#[cfg(feature = "console")]
pub mod console;
pub mod memory;

#[cfg(feature = "async-sinks")]
pub mod async_sink;

#[cfg(feature = "console")]
pub use console::{ConsoleFormat, ConsoleSink};
pub use memory::MemorySink;

#[cfg(feature = "async-sinks")]
pub use async_sink::{AsyncSink, DEFAULT_FLUSH_TIMEOUT};

pub use crate::core::Sink;

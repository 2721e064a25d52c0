//! Sink trait for log output destinations

use super::{dispatcher::FailureReporter, error::Result, log_event::LogEvent};

/// A destination for dispatched events.
///
/// Sinks are shared between threads and called concurrently, so any state
/// they keep needs interior mutability.
pub trait Sink: Send + Sync {
    fn write(&self, event: &LogEvent) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    /// Called by [`Dispatcher::add_sink`](super::Dispatcher::add_sink).
    /// Sinks that fail away from `write`, on a worker thread say, keep the
    /// reporter and send those failures through it.
    fn attach(&self, _reporter: FailureReporter) {}
}

//! What the dispatcher does when a sink fails
//!
//! Sink failures never reach the code that logged the event. The policy only
//! decides whether anyone hears about them.

use super::log_level::LogLevel;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Write one diagnostic line straight to stderr. Unlike `eprintln!` this
/// never panics when stderr is gone.
pub(crate) fn stderr_line(args: fmt::Arguments<'_>) {
    let _ = writeln!(std::io::stderr().lock(), "{}", args);
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Details of one failed sink write (or flush).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkFailure {
    pub sink: String,
    /// Level of the event being written, `None` for flush failures
    pub level: Option<LogLevel>,
    pub error: String,
    /// True when the sink panicked rather than returning an error
    pub panicked: bool,
}

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = if self.panicked { "panicked" } else { "failed" };
        match self.level {
            Some(level) => write!(
                f,
                "Sink '{}' {} writing {} event: {}",
                self.sink, what, level, self.error
            ),
            None => write!(f, "Sink '{}' {} during flush: {}", self.sink, what, self.error),
        }
    }
}

/// Callback invoked once per failed sink write
pub type SinkFailureCallback = Arc<dyn Fn(&SinkFailure) + Send + Sync>;

/// Policy for reporting sink failures
///
/// # Example
///
/// ```
/// use blabber::{Dispatcher, SinkFailure, SinkFailurePolicy};
/// use std::sync::Arc;
///
/// let dispatcher = Dispatcher::builder()
///     .failure_policy(SinkFailurePolicy::Callback(Arc::new(|failure: &SinkFailure| {
///         eprintln!("sink down: {}", failure);
///     })))
///     .build();
/// ```
#[derive(Clone, Default)]
pub enum SinkFailurePolicy {
    /// Drop silently; the failure is only counted in metrics.
    Drop,

    /// Print one line to stderr. Never goes through a sink.
    #[default]
    Stderr,

    /// Hand the failure to a user callback.
    Callback(SinkFailureCallback),
}

impl SinkFailurePolicy {
    pub(crate) fn report(&self, failure: &SinkFailure) {
        match self {
            SinkFailurePolicy::Drop => {}
            SinkFailurePolicy::Stderr => {
                let tag = if failure.panicked {
                    "[LOGGER CRITICAL]"
                } else {
                    "[LOGGER ERROR]"
                };
                stderr_line(format_args!("{} {}", tag, failure));
            }
            SinkFailurePolicy::Callback(callback) => {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(failure)
                }));
                if outcome.is_err() {
                    stderr_line(format_args!(
                        "[LOGGER CRITICAL] Sink failure callback panicked. {}",
                        failure
                    ));
                }
            }
        }
    }
}

impl fmt::Debug for SinkFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkFailurePolicy::Drop => write!(f, "Drop"),
            SinkFailurePolicy::Stderr => write!(f, "Stderr"),
            SinkFailurePolicy::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

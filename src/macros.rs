//! Logging macros with lazy formatting and call-site capture.
//!
//! The format arguments are wrapped in a closure, so they are only evaluated
//! when the event passes the level filter. File, function and line are those
//! of the macro invocation.
//!
//! Every macro accepts the same optional prefixes:
//!
//! - `dispatcher: <expr>` logs to the given [`Dispatcher`](crate::Dispatcher)
//!   instead of the shared one
//! - `module: <expr>` tags the event with a module name
//!
//! # Examples
//!
//! ```
//! use blabber::prelude::*;
//! use blabber::{error, info, verbose, warning};
//!
//! let dispatcher = Dispatcher::with_level(LogLevel::Info);
//!
//! info!(dispatcher: &dispatcher, "Server started");
//!
//! let port = 8080;
//! info!(dispatcher: &dispatcher, "Server listening on port {}", port);
//!
//! warning!(dispatcher: &dispatcher, module: "Net", "Retry {} of {}", 1, 3);
//! verbose!(dispatcher: &dispatcher, "never formatted at this level");
//! error!(dispatcher: &dispatcher, "Failed to bind {}", port);
//! ```

/// Shared expansion of every logging macro.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:expr, dispatcher: $dispatcher:expr, module: $module:expr, $($arg:tt)+) => {
        $dispatcher.log(
            $level,
            ::std::option::Option::Some(::std::convert::AsRef::<str>::as_ref(&$module)),
            $crate::call_site!(),
            || ::std::format!($($arg)+),
        )
    };
    ($level:expr, dispatcher: $dispatcher:expr, $($arg:tt)+) => {
        $dispatcher.log(
            $level,
            ::std::option::Option::None,
            $crate::call_site!(),
            || ::std::format!($($arg)+),
        )
    };
    ($level:expr, module: $module:expr, $($arg:tt)+) => {
        $crate::__log_at!($level, dispatcher: $crate::Dispatcher::shared(), module: $module, $($arg)+)
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::__log_at!($level, dispatcher: $crate::Dispatcher::shared(), $($arg)+)
    };
}

/// Log a message at a level chosen at runtime.
///
/// # Examples
///
/// ```
/// # use blabber::prelude::*;
/// # let dispatcher = Dispatcher::with_level(LogLevel::Verbose);
/// use blabber::log;
/// log!(LogLevel::Info, dispatcher: &dispatcher, "Simple message");
/// log!(LogLevel::Error, dispatcher: &dispatcher, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)+) => {
        $crate::__log_at!($level, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// use blabber::error;
/// error!("Failed to connect to database");
/// error!(module: "Db", "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::__log_at!($crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// use blabber::warning;
/// warning!("Low disk space");
/// warning!("Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warning {
    ($($arg:tt)+) => {
        $crate::__log_at!($crate::LogLevel::Warning, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// use blabber::info;
/// info!("Application started");
/// info!("Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::__log_at!($crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a verbose-level message.
///
/// # Examples
///
/// ```
/// use blabber::verbose;
/// verbose!("Entering function: calculate()");
/// verbose!(module: "Math", "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)+) => {
        $crate::__log_at!($crate::LogLevel::Verbose, $($arg)+)
    };
}

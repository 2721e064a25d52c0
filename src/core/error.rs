//! Error types for the dispatcher and its sinks

pub type Result<T> = std::result::Result<T, DispatcherError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    /// A sink could not write an event
    #[error("Sink '{sink}' failed to write: {message}")]
    SinkWrite { sink: String, message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Async sink queue is full
    #[error("Sink queue full: {capacity} events buffered")]
    QueueFull { capacity: usize },

    /// Async sink worker is gone
    #[error("Sink worker stopped")]
    WorkerStopped,

    /// The process-wide dispatcher was already created
    #[error("Shared dispatcher already initialized")]
    AlreadyInitialized,

    /// Unknown log level name
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DispatcherError {
    /// Create a sink write error
    pub fn sink_write(sink: impl Into<String>, message: impl Into<String>) -> Self {
        DispatcherError::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn queue_full(capacity: usize) -> Self {
        DispatcherError::QueueFull { capacity }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DispatcherError::Other(msg.into())
    }
}

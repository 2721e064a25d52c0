//! Background-thread wrapper for slow sinks
//!
//! The dispatcher always calls sinks synchronously. Wrapping a sink in
//! [`AsyncSink`] moves the actual write onto a worker thread, so `log` only
//! pays for a channel send. Ordering between events is kept; ordering
//! relative to other sinks is not.
//!
//! Queuing can be limited to some levels with
//! [`with_async_levels`](AsyncSink::with_async_levels), e.g. to queue verbose
//! output while errors are written before `log` returns.
//! [`set_force_sync`](AsyncSink::set_force_sync) turns queuing off at
//! runtime, which helps when stepping through code in a debugger.
//!
//! Failures on the worker thread go through the failure policy of the
//! dispatcher the sink is registered with, and count in its metrics.

use crate::core::failure_policy::{panic_message, stderr_line};
use crate::core::{
    DispatcherError, FailureReporter, LogEvent, LogLevel, Result, Sink, SinkFailure,
    SinkFailurePolicy,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long `flush` waits for the worker to drain the queue
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    Write(Box<LogEvent>),
    /// Acknowledged once everything queued before it is written
    Barrier(Sender<()>),
    Flush(Sender<()>),
}

type ReporterSlot = Arc<RwLock<Option<FailureReporter>>>;

fn level_bit(level: LogLevel) -> u8 {
    1 << (level as u8)
}

fn level_mask(levels: impl IntoIterator<Item = LogLevel>) -> u8 {
    levels.into_iter().fold(0, |mask, level| mask | level_bit(level))
}

pub struct AsyncSink {
    name: String,
    capacity: usize,
    inner: Arc<dyn Sink>,
    async_levels: u8,
    force_sync: AtomicBool,
    reporter: ReporterSlot,
    sender: Option<Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
    failed_writes: Arc<AtomicU64>,
}

impl AsyncSink {
    /// Wrap `inner`, buffering up to `capacity` events. Every level is queued.
    pub fn new<S: Sink + 'static>(inner: S, capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let name = format!("async({})", inner.name());
        let inner: Arc<dyn Sink> = Arc::new(inner);
        let (sender, receiver) = bounded(capacity);
        let failed_writes = Arc::new(AtomicU64::new(0));
        let reporter: ReporterSlot = Arc::new(RwLock::new(None));

        let worker = Worker {
            inner: Arc::clone(&inner),
            reporter: Arc::clone(&reporter),
            failed: Arc::clone(&failed_writes),
        };
        let handle = thread::Builder::new()
            .name(format!("blabber-{}", inner.name()))
            .spawn(move || worker.run(receiver))?;

        Ok(Self {
            name,
            capacity,
            inner,
            async_levels: level_mask(LogLevel::ALL),
            force_sync: AtomicBool::new(false),
            reporter,
            sender: Some(sender),
            worker: Some(handle),
            failed_writes,
        })
    }

    /// Queue only events at `levels`; the rest are written on the calling
    /// thread, after anything already queued.
    #[must_use = "builder methods return a new value"]
    pub fn with_async_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.async_levels = level_mask(levels);
        self
    }

    /// Write every event on the calling thread while `on` is true.
    pub fn set_force_sync(&self, on: bool) {
        self.force_sync.store(on, Ordering::Relaxed);
    }

    pub fn is_force_sync(&self) -> bool {
        self.force_sync.load(Ordering::Relaxed)
    }

    /// Whether an event at `level` would currently be queued.
    pub fn is_async(&self, level: LogLevel) -> bool {
        !self.is_force_sync() && self.async_levels & level_bit(level) != 0
    }

    /// Writes the wrapped sink rejected, or panicked on, on the worker thread.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    fn sender(&self) -> Result<&Sender<Command>> {
        self.sender.as_ref().ok_or(DispatcherError::WorkerStopped)
    }

    fn on_worker_thread(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }

    /// Wait for the worker to finish what is queued. Best effort: a stopped
    /// or stuck worker is not waited on past the flush timeout.
    fn drain(&self) {
        // The worker waiting on itself would only time out
        if self.on_worker_thread() {
            return;
        }
        let Ok(sender) = self.sender() else {
            return;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if sender
            .send_timeout(Command::Barrier(ack_tx), DEFAULT_FLUSH_TIMEOUT)
            .is_ok()
        {
            let _ = ack_rx.recv_timeout(DEFAULT_FLUSH_TIMEOUT);
        }
    }

    /// Wait until everything queued before this call has been written and
    /// the wrapped sink flushed.
    pub fn flush_timeout(&self, timeout: Duration) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.sender()?
            .send_timeout(Command::Flush(ack_tx), timeout)
            .map_err(|_| DispatcherError::WorkerStopped)?;
        ack_rx
            .recv_timeout(timeout)
            .map_err(|_| DispatcherError::other(format!("{} flush timed out", self.name)))
    }
}

struct Worker {
    inner: Arc<dyn Sink>,
    reporter: ReporterSlot,
    failed: Arc<AtomicU64>,
}

impl Worker {
    fn run(self, receiver: Receiver<Command>) {
        for command in receiver {
            match command {
                Command::Write(event) => self.write(&event),
                Command::Barrier(ack) => {
                    let _ = ack.send(());
                }
                Command::Flush(ack) => {
                    self.flush();
                    let _ = ack.send(());
                }
            }
        }

        self.flush();
    }

    fn write(&self, event: &LogEvent) {
        let (error, panicked) = match catch_unwind(AssertUnwindSafe(|| self.inner.write(event))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => (e.to_string(), false),
            Err(panic_info) => (panic_message(panic_info.as_ref()), true),
        };
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.report(SinkFailure {
            sink: self.inner.name().to_string(),
            level: Some(event.level),
            error,
            panicked,
        });
    }

    fn flush(&self) {
        let (error, panicked) = match catch_unwind(AssertUnwindSafe(|| self.inner.flush())) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => (e.to_string(), false),
            Err(panic_info) => (panic_message(panic_info.as_ref()), true),
        };
        self.report(SinkFailure {
            sink: self.inner.name().to_string(),
            level: None,
            error,
            panicked,
        });
    }

    fn report(&self, failure: SinkFailure) {
        // Cloned out so the report may re-attach the sink
        let reporter = self.reporter.read().clone();
        match reporter {
            Some(reporter) => reporter.report(&failure),
            None => SinkFailurePolicy::default().report(&failure),
        }
    }
}

impl Sink for AsyncSink {
    fn write(&self, event: &LogEvent) -> Result<()> {
        if !self.is_async(event.level) {
            self.drain();
            return self.inner.write(event);
        }

        match self.sender()?.try_send(Command::Write(Box::new(event.clone()))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DispatcherError::queue_full(self.capacity)),
            Err(TrySendError::Disconnected(_)) => Err(DispatcherError::WorkerStopped),
        }
    }

    fn flush(&self) -> Result<()> {
        self.flush_timeout(DEFAULT_FLUSH_TIMEOUT)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, reporter: FailureReporter) {
        *self.reporter.write() = Some(reporter);
    }
}

impl Drop for AsyncSink {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit
        drop(self.sender.take());

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                stderr_line(format_args!("[LOGGER ERROR] Worker for sink '{}' panicked", self.name));
            }
        }
    }
}

//! Leveled dispatcher that fans log events out to registered sinks

use super::{
    call_site::CallSite,
    error::{DispatcherError, Result},
    failure_policy::{panic_message, stderr_line, SinkFailure, SinkFailurePolicy},
    log_event::LogEvent,
    log_level::LogLevel,
    metrics::DispatcherMetrics,
    sink::Sink,
};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static SHARED: OnceCell<Dispatcher> = OnceCell::new();

thread_local! {
    // Sinks whose failure is currently being reported on this thread. Events
    // logged from inside the report skip them.
    static REPORTING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Handle returned by [`Dispatcher::add_sink`], used to remove the sink again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

/// Everything a `log` call needs, swapped as a whole on every change.
#[derive(Clone)]
struct DispatchState {
    min_level: LogLevel,
    module_levels: HashMap<String, LogLevel>,
    sinks: Vec<(SinkId, Arc<dyn Sink>)>,
    failure_policy: SinkFailurePolicy,
}

impl DispatchState {
    fn threshold(&self, module: Option<&str>) -> LogLevel {
        module
            .and_then(|name| self.module_levels.get(name))
            .copied()
            .unwrap_or(self.min_level)
    }
}

type StateCell = RwLock<Arc<DispatchState>>;

/// Reports failures a sink sees outside [`Sink::write`], e.g. on its own
/// worker thread, through the dispatcher it is registered with.
///
/// Handed to [`Sink::attach`] by [`Dispatcher::add_sink`]. The current
/// failure policy is read on every report, so later calls to
/// [`Dispatcher::set_failure_policy`] apply.
#[derive(Clone)]
pub struct FailureReporter {
    state: Weak<StateCell>,
    metrics: Arc<DispatcherMetrics>,
    key: usize,
}

impl FailureReporter {
    /// Count a failed write and pass it to the policy. Flush failures
    /// (`level: None`) are passed on without being counted.
    ///
    /// Events logged from inside the report skip the sink that failed.
    pub fn report(&self, failure: &SinkFailure) {
        if failure.level.is_some() {
            self.metrics.record_sink_failure();
        }
        let policy = match self.state.upgrade() {
            Some(state) => state.read().failure_policy.clone(),
            None => SinkFailurePolicy::default(),
        };
        report(&policy, self.key, failure);
    }
}

impl std::fmt::Debug for FailureReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureReporter")
            .field("attached", &(self.state.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

pub struct Dispatcher {
    state: Arc<StateCell>,
    next_sink_id: AtomicU64,
    metrics: Arc<DispatcherMetrics>,
}

impl Dispatcher {
    /// Dispatcher with no sinks and the build's default level.
    #[must_use]
    pub fn new() -> Self {
        Self::with_level(LogLevel::build_default())
    }

    #[must_use]
    pub fn with_level(min_level: LogLevel) -> Self {
        Self {
            state: Arc::new(RwLock::new(Arc::new(DispatchState {
                min_level,
                module_levels: HashMap::new(),
                sinks: Vec::new(),
                failure_policy: SinkFailurePolicy::default(),
            }))),
            next_sink_id: AtomicU64::new(1),
            metrics: Arc::new(DispatcherMetrics::new()),
        }
    }

    /// The process-wide dispatcher.
    ///
    /// Created on first use with the build's default level and, when the
    /// `console` feature is on, a [`ConsoleSink`](crate::sinks::ConsoleSink).
    /// Lives until the process exits.
    pub fn shared() -> &'static Dispatcher {
        SHARED.get_or_init(|| {
            let dispatcher = Dispatcher::new();
            #[cfg(feature = "console")]
            dispatcher.add_sink(Arc::new(crate::sinks::ConsoleSink::new()));
            dispatcher
        })
    }

    /// Install `dispatcher` as the process-wide instance.
    ///
    /// Must run before anything touches [`Dispatcher::shared`]; afterwards
    /// it fails with [`DispatcherError::AlreadyInitialized`].
    pub fn init_shared(dispatcher: Dispatcher) -> Result<&'static Dispatcher> {
        SHARED
            .try_insert(dispatcher)
            .map_err(|_| DispatcherError::AlreadyInitialized)
    }

    fn snapshot(&self) -> Arc<DispatchState> {
        Arc::clone(&self.state.read())
    }

    fn update(&self, change: impl FnOnce(&mut DispatchState)) {
        let mut guard = self.state.write();
        let mut next = DispatchState::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }

    /// Dispatch one event.
    ///
    /// `message` is only called when `level` passes the threshold that applies
    /// to `module`, and then exactly once. Sink failures and panics are
    /// contained here; this never fails.
    pub fn log<F>(&self, level: LogLevel, module: Option<&str>, site: CallSite<'_>, message: F)
    where
        F: FnOnce() -> String,
    {
        let state = self.snapshot();
        if !level.passes(state.threshold(module)) {
            self.metrics.record_filtered();
            return;
        }

        let message = match catch_unwind(AssertUnwindSafe(message)) {
            Ok(message) => message,
            Err(panic_info) => {
                stderr_line(format_args!(
                    "[LOGGER CRITICAL] Message for {} event at {}:{} panicked: {}",
                    level,
                    site.file,
                    site.line,
                    panic_message(panic_info.as_ref())
                ));
                return;
            }
        };

        let event = LogEvent::new(level, module, &site, message);
        self.metrics.record_dispatched();
        self.process(&state, &event);
    }

    /// Write `event` to every sink of `state`, isolating each sink.
    fn process(&self, state: &DispatchState, event: &LogEvent) {
        for (_, sink) in &state.sinks {
            let key = sink_key(sink);
            if REPORTING.with(|r| r.borrow().contains(&key)) {
                continue;
            }

            let failure = match catch_unwind(AssertUnwindSafe(|| sink.write(event))) {
                Ok(Ok(())) => {
                    self.metrics.record_sink_write();
                    continue;
                }
                Ok(Err(e)) => SinkFailure {
                    sink: sink.name().to_string(),
                    level: Some(event.level),
                    error: e.to_string(),
                    panicked: false,
                },
                Err(panic_info) => SinkFailure {
                    sink: sink.name().to_string(),
                    level: Some(event.level),
                    error: panic_message(panic_info.as_ref()),
                    panicked: true,
                },
            };

            self.metrics.record_sink_failure();
            report(&state.failure_policy, key, &failure);
        }
    }

    /// Flush every sink. Failures go to the failure policy.
    pub fn flush(&self) {
        let state = self.snapshot();
        for (_, sink) in &state.sinks {
            let (error, panicked) = match catch_unwind(AssertUnwindSafe(|| sink.flush())) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => (e.to_string(), false),
                Err(panic_info) => (panic_message(panic_info.as_ref()), true),
            };

            let failure = SinkFailure {
                sink: sink.name().to_string(),
                level: None,
                error,
                panicked,
            };
            report(&state.failure_policy, sink_key(sink), &failure);
        }
    }

    /// Register a sink after all existing ones.
    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> SinkId {
        sink.attach(FailureReporter {
            state: Arc::downgrade(&self.state),
            metrics: Arc::clone(&self.metrics),
            key: sink_key(&sink),
        });
        let id = SinkId(self.next_sink_id.fetch_add(1, Ordering::Relaxed));
        self.update(|state| state.sinks.push((id, sink)));
        id
    }

    /// Unregister a sink. Returns false when `id` is not registered.
    pub fn remove_sink(&self, id: SinkId) -> bool {
        let mut removed = false;
        self.update(|state| {
            let before = state.sinks.len();
            state.sinks.retain(|(sink_id, _)| *sink_id != id);
            removed = state.sinks.len() != before;
        });
        removed
    }

    pub fn sink_count(&self) -> usize {
        self.state.read().sinks.len()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.update(|state| state.min_level = level);
    }

    pub fn min_level(&self) -> LogLevel {
        self.state.read().min_level
    }

    /// Give events tagged with `module` their own threshold.
    pub fn set_module_level(&self, module: impl Into<String>, level: LogLevel) {
        let module = module.into();
        self.update(|state| {
            state.module_levels.insert(module, level);
        });
    }

    /// Threshold applied to `module`, falling back to the generic level.
    pub fn module_level(&self, module: &str) -> LogLevel {
        self.state.read().threshold(Some(module))
    }

    /// The module's own threshold, `None` when it follows the generic level.
    pub fn own_module_level(&self, module: &str) -> Option<LogLevel> {
        self.state.read().module_levels.get(module).copied()
    }

    /// Whether `module` has a threshold of its own.
    pub fn has_module_level(&self, module: &str) -> bool {
        self.state.read().module_levels.contains_key(module)
    }

    /// Drop the module's own threshold. Returns false if it had none.
    pub fn clear_module_level(&self, module: &str) -> bool {
        let mut cleared = false;
        self.update(|state| cleared = state.module_levels.remove(module).is_some());
        cleared
    }

    /// Whether an event at `level` for `module` would reach the sinks.
    pub fn enabled(&self, level: LogLevel, module: Option<&str>) -> bool {
        level.passes(self.state.read().threshold(module))
    }

    pub fn set_failure_policy(&self, policy: SinkFailurePolicy) {
        self.update(|state| state.failure_policy = policy);
    }

    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }

    /// Create a builder for Dispatcher
    ///
    /// # Example
    /// ```
    /// use blabber::prelude::*;
    ///
    /// let dispatcher = Dispatcher::builder()
    ///     .min_level(LogLevel::Info)
    ///     .module_level("Net", LogLevel::Warning)
    ///     .sink(MemorySink::new())
    ///     .build();
    /// assert_eq!(dispatcher.module_level("Net"), LogLevel::Warning);
    /// ```
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("Dispatcher")
            .field("min_level", &state.min_level)
            .field("module_levels", &state.module_levels)
            .field(
                "sinks",
                &state.sinks.iter().map(|(_, s)| s.name()).collect::<Vec<_>>(),
            )
            .field("failure_policy", &state.failure_policy)
            .finish()
    }
}

fn sink_key(sink: &Arc<dyn Sink>) -> usize {
    Arc::as_ptr(sink) as *const () as usize
}

fn report(policy: &SinkFailurePolicy, key: usize, failure: &SinkFailure) {
    REPORTING.with(|r| r.borrow_mut().push(key));
    policy.report(failure);
    REPORTING.with(|r| {
        r.borrow_mut().pop();
    });
}

/// Builder for constructing Dispatcher with a fluent API
///
/// # Example
/// ```
/// use blabber::prelude::*;
///
/// let dispatcher = Dispatcher::builder()
///     .min_level(LogLevel::Warning)
///     .sink(ConsoleSink::stderr())
///     .failure_policy(SinkFailurePolicy::Drop)
///     .build();
/// ```
pub struct DispatcherBuilder {
    min_level: LogLevel,
    module_levels: HashMap<String, LogLevel>,
    sinks: Vec<Arc<dyn Sink>>,
    failure_policy: SinkFailurePolicy,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::build_default(),
            module_levels: HashMap::new(),
            sinks: Vec::new(),
            failure_policy: SinkFailurePolicy::default(),
        }
    }

    /// Set the generic minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn module_level(mut self, module: impl Into<String>, level: LogLevel) -> Self {
        self.module_levels.insert(module.into(), level);
        self
    }

    /// Add a sink
    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a sink the caller keeps a handle to
    #[must_use = "builder methods return a new value"]
    pub fn shared_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn failure_policy(mut self, policy: SinkFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn build(self) -> Dispatcher {
        let dispatcher = Dispatcher::with_level(self.min_level);
        let module_levels = self.module_levels;
        let failure_policy = self.failure_policy;
        dispatcher.update(|state| {
            state.module_levels = module_levels;
            state.failure_policy = failure_policy;
        });
        for sink in self.sinks {
            dispatcher.add_sink(sink);
        }
        dispatcher
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;
    use std::sync::atomic::AtomicUsize;

    fn site() -> CallSite<'static> {
        CallSite::new("src/app.rs", "app::run", 10, "app")
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write(&self, _event: &LogEvent) -> Result<()> {
            Err(DispatcherError::sink_write("failing", "always"))
        }

        fn flush(&self) -> Result<()> {
            Err(DispatcherError::other("flush refused"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct PanickingSink;

    impl Sink for PanickingSink {
        fn write(&self, _event: &LogEvent) -> Result<()> {
            panic!("sink exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_filtered_message_is_not_evaluated() {
        let dispatcher = Dispatcher::with_level(LogLevel::Warning);
        let calls = AtomicUsize::new(0);

        dispatcher.log(LogLevel::Info, None, site(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            "x".into()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.metrics().filtered(), 1);
        assert_eq!(dispatcher.metrics().dispatched(), 0);
    }

    #[test]
    fn test_passing_message_evaluated_once() {
        let dispatcher = Dispatcher::with_level(LogLevel::Warning);
        let sink = Arc::new(MemorySink::new());
        dispatcher.add_sink(sink.clone());
        dispatcher.add_sink(Arc::new(MemorySink::new()));
        let calls = AtomicUsize::new(0);

        dispatcher.log(LogLevel::Warning, None, site(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            "y".into()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.messages(), vec!["y".to_string()]);
        assert_eq!(dispatcher.metrics().sink_writes(), 2);
    }

    #[test]
    fn test_module_level_overrides_generic() {
        let dispatcher = Dispatcher::builder()
            .min_level(LogLevel::Error)
            .module_level("Giotto", LogLevel::Verbose)
            .build();
        let sink = Arc::new(MemorySink::new());
        dispatcher.add_sink(sink.clone());

        dispatcher.log(LogLevel::Info, Some("Giotto"), site(), || "themed".into());
        dispatcher.log(LogLevel::Info, Some("Other"), site(), || "other".into());
        dispatcher.log(LogLevel::Info, None, site(), || "generic".into());

        assert_eq!(sink.messages(), vec!["themed".to_string()]);
        assert_eq!(sink.events()[0].module.as_deref(), Some("Giotto"));
        assert_eq!(dispatcher.module_level("Other"), LogLevel::Error);

        assert!(dispatcher.clear_module_level("Giotto"));
        assert!(!dispatcher.clear_module_level("Giotto"));
        assert!(!dispatcher.enabled(LogLevel::Info, Some("Giotto")));
    }

    #[test]
    fn test_add_and_remove_sink() {
        let dispatcher = Dispatcher::with_level(LogLevel::Verbose);
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let first_id = dispatcher.add_sink(first.clone());
        let second_id = dispatcher.add_sink(second.clone());
        assert_ne!(first_id, second_id);
        assert_eq!(dispatcher.sink_count(), 2);

        assert!(dispatcher.remove_sink(first_id));
        assert!(!dispatcher.remove_sink(first_id));
        dispatcher.log(LogLevel::Info, None, site(), || "after".into());

        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_failing_sink_does_not_block_later_sinks() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_clone = Arc::clone(&failures);
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::builder()
            .min_level(LogLevel::Verbose)
            .sink(FailingSink)
            .sink(PanickingSink)
            .shared_sink(sink.clone())
            .failure_policy(SinkFailurePolicy::Callback(Arc::new(move |_: &SinkFailure| {
                failures_clone.fetch_add(1, Ordering::SeqCst);
            })))
            .build();

        dispatcher.log(LogLevel::Error, None, site(), || "still delivered".into());

        assert_eq!(sink.messages(), vec!["still delivered".to_string()]);
        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.metrics().sink_failures(), 2);
        assert_eq!(dispatcher.metrics().sink_writes(), 1);
    }

    #[test]
    fn test_flush_failure_reported() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_clone = Arc::clone(&failures);
        let dispatcher = Dispatcher::builder()
            .sink(FailingSink)
            .sink(MemorySink::new())
            .failure_policy(SinkFailurePolicy::Callback(Arc::new(move |f: &SinkFailure| {
                assert!(f.level.is_none());
                failures_clone.fetch_add(1, Ordering::SeqCst);
            })))
            .build();

        dispatcher.flush();
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_message_is_contained() {
        let dispatcher = Dispatcher::with_level(LogLevel::Verbose);
        let sink = Arc::new(MemorySink::new());
        dispatcher.add_sink(sink.clone());

        dispatcher.log(LogLevel::Info, None, site(), || panic!("bad format"));

        assert!(sink.is_empty());
        assert_eq!(dispatcher.metrics().dispatched(), 0);
    }

    #[test]
    fn test_set_min_level_applies_to_next_call() {
        let dispatcher = Dispatcher::with_level(LogLevel::Error);
        let sink = Arc::new(MemorySink::new());
        dispatcher.add_sink(sink.clone());

        dispatcher.log(LogLevel::Info, None, site(), || "dropped".into());
        dispatcher.set_min_level(LogLevel::Info);
        dispatcher.log(LogLevel::Info, None, site(), || "kept".into());

        assert_eq!(dispatcher.min_level(), LogLevel::Info);
        assert_eq!(sink.messages(), vec!["kept".to_string()]);
    }

    #[test]
    fn test_own_module_level_distinguishes_fallback() {
        let dispatcher = Dispatcher::builder()
            .min_level(LogLevel::Warning)
            .module_level("Net", LogLevel::Warning)
            .build();

        assert_eq!(dispatcher.own_module_level("Net"), Some(LogLevel::Warning));
        assert_eq!(dispatcher.own_module_level("Ui"), None);
        assert!(dispatcher.has_module_level("Net"));
        assert!(!dispatcher.has_module_level("Ui"));
        assert_eq!(dispatcher.module_level("Ui"), LogLevel::Warning);

        dispatcher.clear_module_level("Net");
        assert!(!dispatcher.has_module_level("Net"));
    }

    /// Keeps the reporter it is attached with and fails later, off `write`.
    struct DeferredSink {
        reporter: parking_lot::Mutex<Option<FailureReporter>>,
    }

    impl DeferredSink {
        fn fail_later(&self, level: Option<LogLevel>) {
            let reporter = self.reporter.lock().clone().expect("attached");
            reporter.report(&SinkFailure {
                sink: "deferred".into(),
                level,
                error: "late".into(),
                panicked: false,
            });
        }
    }

    impl Sink for DeferredSink {
        fn write(&self, _event: &LogEvent) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "deferred"
        }

        fn attach(&self, reporter: FailureReporter) {
            *self.reporter.lock() = Some(reporter);
        }
    }

    #[test]
    fn test_attached_reporter_follows_current_policy() {
        let sink = Arc::new(DeferredSink {
            reporter: parking_lot::Mutex::new(None),
        });
        let dispatcher = Dispatcher::builder()
            .shared_sink(sink.clone())
            .failure_policy(SinkFailurePolicy::Drop)
            .build();

        sink.fail_later(Some(LogLevel::Info));
        assert_eq!(dispatcher.metrics().sink_failures(), 1);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        dispatcher.set_failure_policy(SinkFailurePolicy::Callback(Arc::new(
            move |f: &SinkFailure| {
                assert_eq!(f.sink, "deferred");
                seen_clone.fetch_add(1, Ordering::SeqCst);
            },
        )));

        sink.fail_later(Some(LogLevel::Error));
        sink.fail_later(None);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        // flush failures are reported but not counted
        assert_eq!(dispatcher.metrics().sink_failures(), 2);
    }

    #[test]
    fn test_reporter_outlives_dispatcher() {
        let sink = Arc::new(DeferredSink {
            reporter: parking_lot::Mutex::new(None),
        });
        let dispatcher = Dispatcher::builder()
            .shared_sink(sink.clone())
            .failure_policy(SinkFailurePolicy::Drop)
            .build();
        drop(dispatcher);

        // Falls back to the default policy instead of failing
        sink.fail_later(Some(LogLevel::Info));
    }

    #[test]
    fn test_debug_lists_sink_names() {
        let dispatcher = Dispatcher::builder().sink(MemorySink::new()).build();
        let debug = format!("{:?}", dispatcher);
        assert!(debug.contains("memory"));
        assert!(debug.contains("Stderr"));
    }
}

//! In-memory sink
//!
//! Keeps dispatched events so they can be inspected later. Handy for tests
//! and for hosts that show recent log lines in their own UI.

use crate::core::{LogEvent, Result, Sink};
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct MemorySink {
    events: Mutex<VecDeque<LogEvent>>,
    capacity: Option<usize>,
}

impl MemorySink {
    /// Unbounded sink.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: None,
        }
    }

    /// Keep at most `capacity` events, evicting the oldest.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        }
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return everything retained so far.
    pub fn take(&self) -> Vec<LogEvent> {
        self.events.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn write(&self, event: &LogEvent) -> Result<()> {
        let mut events = self.events.lock();
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return Ok(());
            }
            while events.len() >= capacity {
                events.pop_front();
            }
        }
        events.push_back(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

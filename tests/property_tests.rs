//! Property-based tests for blabber using proptest

use blabber::prelude::*;
use blabber::sinks::console::format_text;
use proptest::prelude::*;
use std::cell::Cell;
use std::sync::Arc;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Verbose),
        Just(LogLevel::Info),
        Just(LogLevel::Warning),
        Just(LogLevel::Error),
    ]
}

fn site() -> CallSite<'static> {
    CallSite::new("src/prop.rs", "prop::run", 7, "prop")
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// Test that LogLevel ordering matches the discriminants
    #[test]
    fn test_log_level_ordering(a in any_level(), b in any_level()) {
        prop_assert_eq!(a <= b, (a as u8) <= (b as u8));
        prop_assert_eq!(a.passes(b), (a as u8) >= (b as u8));
    }

    /// Test that parsing accepts case-insensitive input
    #[test]
    fn test_log_level_case_insensitive(level in any_level(), lower in any::<bool>()) {
        let input = if lower {
            level.to_str().to_lowercase()
        } else {
            level.to_str().to_string()
        };
        prop_assert_eq!(input.parse::<LogLevel>().unwrap(), level);
    }
}

// ============================================================================
// Filtering Tests
// ============================================================================

proptest! {
    /// The message producer runs exactly when the level passes the threshold
    #[test]
    fn test_producer_runs_only_when_enabled(level in any_level(), threshold in any_level()) {
        let dispatcher = Dispatcher::with_level(threshold);
        let memory = Arc::new(MemorySink::new());
        dispatcher.add_sink(memory.clone());
        let calls = Cell::new(0);

        dispatcher.log(level, None, site(), || {
            calls.set(calls.get() + 1);
            "m".to_string()
        });

        let expected = usize::from(level >= threshold);
        prop_assert_eq!(calls.get(), expected);
        prop_assert_eq!(memory.len(), expected);
    }

    /// Module thresholds take precedence over the generic one
    #[test]
    fn test_module_threshold_precedence(
        level in any_level(),
        generic in any_level(),
        module_level in any_level(),
    ) {
        let dispatcher = Dispatcher::builder()
            .min_level(generic)
            .module_level("M", module_level)
            .build();

        prop_assert_eq!(dispatcher.enabled(level, Some("M")), level >= module_level);
        prop_assert_eq!(dispatcher.enabled(level, Some("other")), level >= generic);
        prop_assert_eq!(dispatcher.enabled(level, None), level >= generic);
    }

    /// Every sink sees every passing event, in call order
    #[test]
    fn test_all_sinks_see_all_events(
        levels in proptest::collection::vec(any_level(), 0..40),
        sink_count in 1usize..5,
    ) {
        let dispatcher = Dispatcher::with_level(LogLevel::Info);
        let sinks: Vec<Arc<MemorySink>> = (0..sink_count)
            .map(|_| Arc::new(MemorySink::new()))
            .collect();
        for sink in &sinks {
            dispatcher.add_sink(sink.clone());
        }

        for (i, level) in levels.iter().enumerate() {
            dispatcher.log(*level, None, site(), || i.to_string());
        }

        let expected: Vec<String> = levels
            .iter()
            .enumerate()
            .filter(|(_, level)| **level >= LogLevel::Info)
            .map(|(i, _)| i.to_string())
            .collect();
        for sink in &sinks {
            prop_assert_eq!(sink.messages(), expected.clone());
        }
    }
}

// ============================================================================
// Text Format Tests
// ============================================================================

proptest! {
    /// A rendered event is always a single line
    #[test]
    fn test_text_format_single_line(message in ".*") {
        let event = LogEvent::new(LogLevel::Info, None, &site(), message);
        let line = format_text(&event);

        prop_assert!(!line.contains('\n'));
        prop_assert!(!line.contains('\r'));
    }

    /// Events keep the call site they were created with
    #[test]
    fn test_event_keeps_call_site(
        file in "[a-z]+\\.rs",
        function in "[a-z_:]+",
        line in 1u32..10000u32,
    ) {
        let site = CallSite::new(&file, &function, line, "prop");
        let event = LogEvent::new(LogLevel::Warning, Some("M"), &site, String::new());

        prop_assert_eq!(event.file, file);
        prop_assert_eq!(event.function, function);
        prop_assert_eq!(event.line, line);
    }
}

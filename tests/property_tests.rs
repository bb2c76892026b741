//! Property-based tests for rust_logger_core using proptest

use proptest::prelude::*;
use rust_logger_core::core::{LevelRegistry, NEW_LINE};
use rust_logger_core::prelude::*;
use rust_logger_core::CompiledPattern;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Off),
    ]
}

fn emittable_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

/// Module paths such as `app::net::http`
fn module_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_]{0,6}", 1..5).prop_map(|segments| segments.join("::"))
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_level(), use_lower in any::<bool>()) {
        let text = if use_lower {
            level.to_str().to_lowercase()
        } else {
            level.to_str().to_string()
        };
        let parsed: LogLevel = text.parse().unwrap();
        prop_assert_eq!(level, parsed);
        prop_assert_eq!(format!("{}", level), level.to_str());
    }

    /// Test that LogLevel ordering follows the severity values
    #[test]
    fn test_log_level_ordering(level1 in any_level(), level2 in any_level()) {
        let val1 = level1 as u8;
        let val2 = level2 as u8;

        prop_assert_eq!(level1 <= level2, val1 <= val2);
        prop_assert_eq!(level1 < level2, val1 < val2);
        prop_assert_eq!(level1.cmp(&level2), val1.cmp(&val2));
    }

    /// Invalid names never parse
    #[test]
    fn test_log_level_invalid_parse(invalid in "[0-9#%&]{1,8}") {
        prop_assert!(invalid.parse::<LogLevel>().is_err());
    }
}

// ============================================================================
// LevelRegistry Tests
// ============================================================================

proptest! {
    /// A level enabled for a caller stays enabled for every higher level
    #[test]
    fn test_enabled_is_monotonic(
        default in any_level(),
        rule in any_level(),
        prefix in module_path(),
        caller in module_path(),
        level in emittable_level(),
    ) {
        let registry = LevelRegistry::new(default, [(prefix, rule)]);
        if registry.is_enabled(&caller, level) {
            for higher in LogLevel::EMITTABLE.into_iter().filter(|l| *l >= level) {
                prop_assert!(registry.is_enabled(&caller, higher));
                prop_assert!(registry.may_be_enabled(higher));
            }
        }
    }

    /// Every caller below a prefix inherits its level, unrelated callers keep the default
    #[test]
    fn test_prefix_resolution(
        default in any_level(),
        rule in any_level(),
        prefix in module_path(),
        suffix in prop::option::of(module_path()),
        other in "[A-Z][a-z]{1,6}",
    ) {
        let registry = LevelRegistry::new(default, [(prefix.clone(), rule)]);

        let caller = match suffix {
            Some(suffix) => format!("{}::{}", prefix, suffix),
            None => prefix.clone(),
        };
        prop_assert_eq!(registry.effective_level(&caller), rule);
        prop_assert_eq!(registry.effective_level(&other), default);

        // Not a segment boundary
        let glued = format!("{}x", prefix);
        prop_assert_eq!(registry.effective_level(&glued), default);
    }

    /// The longest matching prefix wins regardless of rule order
    #[test]
    fn test_longest_prefix_wins(
        outer in any_level(),
        inner in any_level(),
        root in module_path(),
        child in "[a-z]{1,6}",
        leaf in "[a-z]{1,6}",
    ) {
        let nested = format!("{}::{}", root, child);
        let caller = format!("{}::{}", nested, leaf);

        let forward =
            LevelRegistry::new(LogLevel::Info, [(root.clone(), outer), (nested.clone(), inner)]);
        let backward = LevelRegistry::new(LogLevel::Info, [(nested, inner), (root, outer)]);
        prop_assert_eq!(forward.effective_level(&caller), inner);
        prop_assert_eq!(backward.effective_level(&caller), inner);
    }
}

// ============================================================================
// Pattern Tests
// ============================================================================

proptest! {
    /// Text without tokens renders verbatim followed by the line terminator
    #[test]
    fn test_literal_pattern_renders_verbatim(text in "[^{]*", level in emittable_level()) {
        let pattern = CompiledPattern::compile(&text).unwrap();
        prop_assert!(pattern.required_fields().is_empty());

        let record = LogRecord::new(level).with_message("ignored");
        prop_assert_eq!(pattern.render(&record), format!("{}{}", text, NEW_LINE));
    }

    /// Messages are copied as given, surrounded by the literal parts
    #[test]
    fn test_message_token(prefix in "[^{]{0,10}", message in ".*", level in emittable_level()) {
        let source = format!("{}{{level}} {{message}}", prefix);
        let pattern = CompiledPattern::compile(&source).unwrap();
        prop_assert!(pattern
            .required_fields()
            .contains(RequiredFields::LEVEL | RequiredFields::MESSAGE));

        let record = LogRecord::new(level).with_message(message.clone());
        prop_assert_eq!(
            pattern.render(&record),
            format!("{}{} {}{}", prefix, level, message, NEW_LINE)
        );
    }

    /// Unknown tokens are always rejected
    #[test]
    fn test_unknown_token_rejected(name in "[A-Z][a-z]{0,8}") {
        let source = format!("{{{}}}", name);
        prop_assert!(CompiledPattern::compile(&source).is_err());
    }
}

// ============================================================================
// Throwable Tests
// ============================================================================

proptest! {
    /// Never more than `depth` frames per exception, plus one marker when a
    /// non-zero depth cut frames
    #[test]
    fn test_stack_depth_limit(frames in 0usize..20, depth in 0usize..25) {
        let throwable = Throwable::new("Failure").with_frames(
            (0..frames).map(|i| StackFrame::new(format!("app::step{}", i))).collect(),
        );
        let rendered = rust_logger_core::core::throwable::render(&throwable, Some(depth));

        prop_assert_eq!(rendered.matches("\tat ").count(), frames.min(depth));
        prop_assert_eq!(rendered.contains("\t..."), depth > 0 && frames > depth);
        prop_assert!(!rendered.ends_with(NEW_LINE));
    }
}

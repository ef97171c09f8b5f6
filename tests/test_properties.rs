//! Property-based tests using proptest
//!
//! Response parsing must tolerate whatever a socket hands back, and the command encoder must
//! keep every command on one wire line.

use hapctl::frame::{self, Frame, FrameStatus};
use hapctl::parsers::{self, EntryLine};
use hapctl::{Command, PatternEntry};
use proptest::prelude::*;

// =============================================================================
// 1. Frame classification
// =============================================================================

proptest! {
    #[test]
    fn prop_decode_never_panics(s in "\\PC*") {
        let _ = Frame::decode(&s);
        let _ = frame::response_error(&s);
    }

    #[test]
    fn prop_error_severity_detected(severity in 0u8..=3, message in "[A-Za-z .!']{0,40}") {
        let text = format!("[{}]: {}", severity, message);
        let (found, rest) = frame::error_severity(&text).expect("marker not detected");
        prop_assert_eq!(found, severity);
        prop_assert_eq!(rest, message.trim());
        prop_assert_eq!(Frame::decode(&text).status, FrameStatus::Error(severity));
    }

    #[test]
    fn prop_informational_severity_is_not_an_error(severity in 4u8..=9, message in "[A-Za-z .!']{0,40}") {
        let text = format!("[{}]: {}", severity, message);
        prop_assert!(frame::error_severity(&text).is_none());
        prop_assert!(!Frame::decode(&text).is_error());
    }

    #[test]
    fn prop_first_non_empty_frame_decides(blank in 0usize..4, body in "[a-z ]{1,20}") {
        let response = format!("{}[2]: {}\nmore output", "\n".repeat(blank), body);
        prop_assert_eq!(frame::response_error(&response).map(|(s, _)| s), Some(2));
        let trailing = format!("ok\n[2]: {}", body);
        prop_assert!(frame::response_error(&trailing).is_none());
    }
}

// =============================================================================
// 2. Listing parsers
// =============================================================================

proptest! {
    #[test]
    fn prop_parsers_are_deterministic(text in "[ -~\\n\\t]{0,200}") {
        let first: Vec<String> = parsers::parse_lines(&text, |line| line.parse::<PatternEntry>().ok().map(|e| e.key));
        let second: Vec<String> = parsers::parse_lines(&text, |line| line.parse::<PatternEntry>().ok().map(|e| e.key));
        prop_assert_eq!(first, second);
        prop_assert_eq!(parsers::assignments(&text), parsers::assignments(&text));
    }

    #[test]
    fn prop_data_lines_skip_comments_and_blanks(text in "[ -~\\n]{0,200}") {
        for line in parsers::data_lines(&text) {
            prop_assert!(!line.trim().is_empty());
            prop_assert!(!line.trim_start().starts_with('#'));
        }
    }

    #[test]
    fn prop_pattern_entry_fields(id in any::<u64>(), key in "[a-z0-9./]{1,20}", value in proptest::option::of("[a-z0-9]{1,10}")) {
        let line = match &value {
            Some(value) => format!("{:#x} {} {}", id, key, value),
            None => format!("{:#x} {}", id, key),
        };
        let entry: PatternEntry = line.parse().unwrap();
        prop_assert_eq!(entry.id, id);
        prop_assert_eq!(entry.key, key);
        prop_assert_eq!(entry.value, value);
    }

    #[test]
    fn prop_entry_line_fields(
        name in "/[a-z]{1,10}\\.pem",
        number in proptest::option::of(1u32..10_000),
        config in proptest::option::of("[a-z0-9 ]{0,20}"),
        filters in proptest::collection::vec("[a-z*.!]{1,12}", 0..4),
    ) {
        let mut line = name.clone();
        if let Some(number) = number {
            line.push_str(&format!(":{}", number));
        }
        if let Some(config) = &config {
            line.push_str(&format!(" [{}]", config));
        }
        for filter in &filters {
            line.push(' ');
            line.push_str(filter);
        }

        let entry = EntryLine::parse(&line).unwrap();
        prop_assert_eq!(entry.name, name);
        prop_assert_eq!(entry.line_number, number);
        prop_assert_eq!(entry.config, config.map(|c| c.trim().to_owned()));
        prop_assert_eq!(entry.filters, filters);
    }
}

// =============================================================================
// 3. Command encoding
// =============================================================================

proptest! {
    #[test]
    fn prop_wire_is_one_line(text in "[a-z #/.-]{1,40}") {
        let wire = Command::new(text.as_str()).wire();
        prop_assert!(wire.starts_with("set severity-output number;"));
        prop_assert!(wire.ends_with('\n'));
        prop_assert_eq!(wire.matches('\n').count(), 1);
    }
}

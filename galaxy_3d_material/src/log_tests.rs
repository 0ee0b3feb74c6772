//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry formatting, DefaultLogger filtering and CaptureLogger.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, CaptureLogger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, message: &str) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "galaxy3d::MaterialManager".to_string(),
        message: message.to_string(),
        file: None,
        line: None,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
}

// ============================================================================
// FORMAT TESTS
// ============================================================================

#[test]
fn test_format_entry_without_location() {
    let line = DefaultLogger::format_entry(&entry(LogSeverity::Warn, "Material instance is not exists: rock"));
    assert!(line.contains("[WARN ]"));
    assert!(line.contains("[galaxy3d::MaterialManager]"));
    assert!(line.ends_with("Material instance is not exists: rock"));
}

#[test]
fn test_format_entry_with_location() {
    let mut e = entry(LogSeverity::Error, "Failed to compile");
    e.file = Some("material_layout.rs");
    e.line = Some(42);
    let line = DefaultLogger::format_entry(&e);
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("(material_layout.rs:42)"));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger::new(LogSeverity::Trace);
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        // Just verify it doesn't panic
        logger.log(&entry(severity, "message"));
    }
}

#[test]
fn test_default_logger_threshold_is_kept() {
    let logger = DefaultLogger::new(LogSeverity::Warn);
    assert_eq!(logger.min_severity, LogSeverity::Warn);
    // Below threshold: silently dropped
    logger.log(&entry(LogSeverity::Debug, "dropped"));
}

// ============================================================================
// CAPTURE LOGGER TESTS
// ============================================================================

#[test]
fn test_capture_logger_records_entries() {
    let logger = CaptureLogger::new();
    logger.log(&entry(LogSeverity::Info, "registered"));
    logger.log(&entry(LogSeverity::Error, "compile failed"));

    assert_eq!(logger.entries().len(), 2);
    assert_eq!(logger.count_at_least(LogSeverity::Warn), 1);
    assert!(logger.contains("compile"));
    assert!(!logger.contains("missing"));
}

#[test]
fn test_capture_logger_clones_share_storage() {
    let logger = CaptureLogger::new();
    let installed = logger.clone();
    installed.log(&entry(LogSeverity::Warn, "shared"));
    assert!(logger.contains("shared"));

    logger.clear();
    assert!(installed.entries().is_empty());
}

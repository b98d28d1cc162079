//! Tests for `src/logging.rs`.

use plugboard::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("nested").join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber per process; the directory is created
    // before installation is attempted.
    let _result = plugboard::logging::init_production(&logs_dir, "debug");
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_cli_tolerates_existing_subscriber() {
    plugboard::logging::init_cli("info");
    plugboard::logging::init_cli("not a valid directive [");
}

#[test]
fn startup_logging_returns_closure_value() {
    let loaded = plugboard::logging::with_startup_logging(|| {
        tracing::info!("loading before global init");
        42
    });
    assert_eq!(loaded, 42);
}

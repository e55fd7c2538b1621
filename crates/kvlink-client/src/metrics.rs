//! Metrics for session and command monitoring.
//!
//! Only the `metrics` facade is used here; the embedding application decides
//! which exporter, if any, receives them.

use metrics::{counter, describe_counter};

/// Metric names for the cache client.
pub mod names {
    /// Sessions established.
    pub const CONNECTS_TOTAL: &str = "kvlink_connects_total";
    /// Connect sequences that failed, labelled by error code.
    pub const CONNECT_FAILURES_TOTAL: &str = "kvlink_connect_failures_total";
    /// Reconnects caused by a call asking for another database.
    pub const DB_SWITCHES_TOTAL: &str = "kvlink_db_switches_total";
    /// Commands issued, labelled by command.
    pub const COMMANDS_TOTAL: &str = "kvlink_commands_total";
    /// Commands that failed, labelled by command.
    pub const COMMAND_FAILURES_TOTAL: &str = "kvlink_command_failures_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CONNECTS_TOTAL, "Total number of Redis sessions established");
    describe_counter!(
        names::CONNECT_FAILURES_TOTAL,
        "Total number of failed Redis connect sequences"
    );
    describe_counter!(
        names::DB_SWITCHES_TOTAL,
        "Total number of reconnects caused by a database switch"
    );
    describe_counter!(names::COMMANDS_TOTAL, "Total number of Redis commands issued");
    describe_counter!(
        names::COMMAND_FAILURES_TOTAL,
        "Total number of Redis commands that failed"
    );
}

pub(crate) fn record_connect() {
    counter!(names::CONNECTS_TOTAL).increment(1);
}

pub(crate) fn record_connect_failure(code: &'static str) {
    counter!(names::CONNECT_FAILURES_TOTAL, "code" => code).increment(1);
}

pub(crate) fn record_db_switch() {
    counter!(names::DB_SWITCHES_TOTAL).increment(1);
}

/// Counts a command and, if it failed, the failure.
pub(crate) fn record_command<T>(command: &'static str, outcome: &Result<T, kvlink_core::KvError>) {
    counter!(names::COMMANDS_TOTAL, "command" => command).increment(1);
    if outcome.is_err() {
        counter!(names::COMMAND_FAILURES_TOTAL, "command" => command).increment(1);
    }
}

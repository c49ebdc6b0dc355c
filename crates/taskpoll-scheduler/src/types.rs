use std::path::PathBuf;

use chrono::NaiveDateTime;

pub const COL_ENABLED: &str = "Enabled";
pub const COL_PROCESS_NAME: &str = "ProcessName";
pub const COL_EXECUTABLE_PATH: &str = "ExecutablePath";
pub const COL_FREQUENCY: &str = "Frequency";
pub const COL_ARGUMENTS: &str = "Arguments";
pub const COL_LAST_RUN_TIME: &str = "LastRunTime";

/// Columns every task table must declare.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    COL_ENABLED,
    COL_PROCESS_NAME,
    COL_EXECUTABLE_PATH,
    COL_FREQUENCY,
];

/// On-disk `LastRunTime` format (local wall-clock, no zone).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Typed view of one validated table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// `ProcessName`; also the RunCache key.
    pub name: String,
    pub enabled: bool,
    /// Raw `ExecutablePath`, absolute or relative to the base directory.
    pub executable_path: String,
    /// Unsplit `Arguments` cell, `None` when empty.
    pub arguments: Option<String>,
    pub frequency_minutes: i64,
    /// Raw `LastRunTime` cell, `None` when empty ("never run").
    pub last_run_time: Option<String>,
}

/// A unit of work handed to the execution pool.
///
/// Owns copies of everything it needs; workers never see the table.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub record: TaskRecord,
    pub resolved_path: PathBuf,
}

/// `true` / `1` / `yes` (any case) enable a task; every other token disables it.
pub fn parse_enabled(token: &str) -> bool {
    matches!(
        token.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_tokens() {
        for t in ["true", "TRUE", "True", "1", "yes", "YES", " yes "] {
            assert!(parse_enabled(t), "{t:?} should enable");
        }
        for t in ["false", "0", "no", "", "y", "enabled"] {
            assert!(!parse_enabled(t), "{t:?} should disable");
        }
    }

    #[test]
    fn timestamp_format_is_stable() {
        let ts = parse_timestamp("2024-03-01 08:05:09").unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-01 08:05:09");
        assert!(parse_timestamp("2024-03-01T08:05:09").is_none());
    }
}

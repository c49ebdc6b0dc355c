use std::path::{Path, PathBuf};

use crate::error::{RowError, StructuralError};
use crate::table::TaskRow;
use crate::types::{
    parse_enabled, TaskRecord, COL_ARGUMENTS, COL_ENABLED, COL_EXECUTABLE_PATH, COL_FREQUENCY,
    COL_LAST_RUN_TIME, REQUIRED_COLUMNS,
};

/// Whole-table check: every required column must be declared.
pub fn validate_structure(columns: &[String]) -> Result<(), StructuralError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|req| !columns.iter().any(|c| c == *req))
        .map(|req| req.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StructuralError { missing })
    }
}

/// Per-row check. On success returns the typed record for scheduling.
///
/// Rejects an empty `ExecutablePath` and a `Frequency` that is not an integer.
pub fn validate_row(row: &TaskRow) -> Result<TaskRecord, RowError> {
    let task = row.name().to_string();

    let executable_path = row.get(COL_EXECUTABLE_PATH);
    if executable_path.is_empty() {
        return Err(RowError::MissingExecutablePath { task });
    }

    let raw_frequency = row.get(COL_FREQUENCY);
    let frequency_minutes =
        parse_frequency(raw_frequency).ok_or_else(|| RowError::InvalidFrequency {
            task: task.clone(),
            value: raw_frequency.to_string(),
        })?;

    Ok(TaskRecord {
        name: task,
        enabled: parse_enabled(row.get(COL_ENABLED)),
        executable_path: executable_path.to_string(),
        arguments: non_empty(row.get(COL_ARGUMENTS)),
        frequency_minutes,
        last_run_time: non_empty(row.get(COL_LAST_RUN_TIME)),
    })
}

/// Integer minutes. Surrounding whitespace is ignored and single underscores
/// may group digits (`1_000`).
fn parse_frequency(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    let grouped = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'_'
            || (i > 0
                && bytes[i - 1].is_ascii_digit()
                && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
    });
    if !grouped {
        return None;
    }
    trimmed.replace('_', "").parse().ok()
}

/// Absolute paths are used as-is; relative ones are joined onto `base_dir`.
pub fn resolve_executable(base_dir: &Path, executable_path: &str) -> PathBuf {
    let path = Path::new(executable_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Resolve the executable and require it to exist. `Err` carries the missing path.
pub fn check_executable(base_dir: &Path, executable_path: &str) -> Result<PathBuf, PathBuf> {
    let resolved = resolve_executable(base_dir, executable_path);
    if resolved.exists() {
        Ok(resolved)
    } else {
        Err(resolved)
    }
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(path: &str, freq: &str) -> TaskRow {
        TaskRow::from_pairs([
            ("Enabled", "true"),
            ("ProcessName", "job"),
            ("ExecutablePath", path),
            ("Frequency", freq),
        ])
    }

    #[test]
    fn structure_accepts_superset() {
        let cols = columns(&[
            "Enabled",
            "ProcessName",
            "ExecutablePath",
            "Frequency",
            "Arguments",
            "Owner",
        ]);
        assert!(validate_structure(&cols).is_ok());
    }

    #[test]
    fn structure_names_missing_columns() {
        let err = validate_structure(&columns(&["Enabled", "ProcessName"])).unwrap_err();
        assert_eq!(err.missing, ["ExecutablePath", "Frequency"]);
        assert!(err.to_string().contains("ExecutablePath"));
    }

    #[test]
    fn structure_rejects_empty_header() {
        let err = validate_structure(&[]).unwrap_err();
        assert_eq!(err.missing.len(), 4);
    }

    #[test]
    fn row_rejects_empty_path() {
        let err = validate_row(&row("", "10")).unwrap_err();
        assert_eq!(
            err,
            RowError::MissingExecutablePath {
                task: "job".into()
            }
        );
    }

    #[test]
    fn row_rejects_non_integer_frequency() {
        for bad in ["", "ten", "1.5", "5m", "_1", "1_", "1__0", "-_5"] {
            let err = validate_row(&row("job.sh", bad)).unwrap_err();
            assert!(
                matches!(err, RowError::InvalidFrequency { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn row_accepts_integer_frequency() {
        for ok in ["0", "10", " 15 ", "-5"] {
            assert!(validate_row(&row("job.sh", ok)).is_ok(), "{ok:?}");
        }
    }

    #[test]
    fn digit_groups_may_use_underscores() {
        assert_eq!(validate_row(&row("job.sh", "1_000")).unwrap().frequency_minutes, 1000);
        assert_eq!(validate_row(&row("job.sh", " -1_5 ")).unwrap().frequency_minutes, -15);
    }

    #[test]
    fn row_builds_typed_record() {
        let mut r = row("bin/job.sh", "30");
        r.set("Arguments", "--fast");
        r.set("LastRunTime", "2024-05-01 10:00:00");
        r.set("Enabled", "No");

        let rec = validate_row(&r).unwrap();
        assert_eq!(rec.name, "job");
        assert!(!rec.enabled);
        assert_eq!(rec.frequency_minutes, 30);
        assert_eq!(rec.arguments.as_deref(), Some("--fast"));
        assert_eq!(rec.last_run_time.as_deref(), Some("2024-05-01 10:00:00"));
    }

    #[test]
    fn empty_optional_cells_become_none() {
        let rec = validate_row(&row("job.sh", "1")).unwrap();
        assert!(rec.arguments.is_none());
        assert!(rec.last_run_time.is_none());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/tasks");
        assert_eq!(
            resolve_executable(base, "scripts/a.sh"),
            PathBuf::from("/srv/tasks/scripts/a.sh")
        );
    }

    #[cfg(unix)]
    #[test]
    fn absolute_paths_are_kept() {
        let base = Path::new("/srv/tasks");
        assert_eq!(resolve_executable(base, "/bin/sh"), PathBuf::from("/bin/sh"));
    }

    #[test]
    fn existence_check_reports_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.sh"), "").unwrap();

        assert_eq!(
            check_executable(dir.path(), "present.sh").unwrap(),
            dir.path().join("present.sh")
        );
        assert_eq!(
            check_executable(dir.path(), "absent.sh").unwrap_err(),
            dir.path().join("absent.sh")
        );
    }
}

//! Durable commit of the task table: write a sibling temp file, then swap it
//! into place with bounded, linearly backed-off retries.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use taskpoll_core::TaskpollConfig;
use tracing::{error, info, warn};

use crate::error::PersistError;
use crate::table::TaskTable;

/// Atomic "move `from` over `to`" primitive.
pub trait FileReplacer: Send + Sync {
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// `rename(2)` / `MoveFileExW(MOVEFILE_REPLACE_EXISTING)` via `std::fs::rename`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameReplacer;

impl FileReplacer for RenameReplacer {
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

/// `attempts` tries, waiting `base + attempt × step` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub step: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TaskpollConfig) -> Self {
        Self {
            attempts: config.persist_retries,
            base: Duration::from_millis(config.retry_base_ms),
            step: Duration::from_millis(config.retry_step_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base + self.step * attempt
    }

    fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TaskpollConfig::default())
    }
}

/// Writes the whole table back to `destination`.
pub struct TableWriter {
    destination: PathBuf,
    retry: RetryPolicy,
    replacer: Box<dyn FileReplacer>,
}

impl TableWriter {
    pub fn new(destination: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self::with_replacer(destination, retry, Box::new(RenameReplacer))
    }

    pub fn with_replacer(
        destination: impl Into<PathBuf>,
        retry: RetryPolicy,
        replacer: Box<dyn FileReplacer>,
    ) -> Self {
        Self {
            destination: destination.into(),
            retry,
            replacer,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// `<destination>.tmp`, in the same directory so the final rename never
    /// crosses filesystems. Appending keeps it distinct from any destination name.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .destination
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.destination.with_file_name(name)
    }

    /// Commit every row of `table`, in order.
    ///
    /// On exhausted retries the destination keeps its previous content and the
    /// temporary file is removed.
    pub async fn commit(&self, table: &TaskTable) -> Result<(), PersistError> {
        let tmp = self.temp_path();
        let bytes = table.to_csv_bytes()?;

        if let Err(source) = tokio::fs::write(&tmp, &bytes).await {
            error!(path = %tmp.display(), "Failed to write temporary table: {source}");
            remove_temp(&tmp).await;
            return Err(PersistError::TempWrite { path: tmp, source });
        }

        let max = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            match self.replacer.replace(&tmp, &self.destination) {
                Ok(()) => {
                    info!(path = %self.destination.display(), "CSV Schedule updated.");
                    return Ok(());
                }
                Err(e) if attempt + 1 < max => {
                    let wait = self.retry.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max,
                        wait_ms = wait.as_millis() as u64,
                        "CSV update failed (Attempt {}/{max}). Retrying in {:.1}s. Error: {e}",
                        attempt + 1,
                        wait.as_secs_f64(),
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(source) => {
                    error!(attempts = max, "Failed to update CSV: {source}");
                    remove_temp(&tmp).await;
                    return Err(PersistError::ReplaceExhausted {
                        attempts: max,
                        source,
                    });
                }
            }
        }
    }
}

async fn remove_temp(tmp: &Path) {
    match tokio::fs::remove_file(tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %tmp.display(), "could not remove temporary table: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TaskRow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` replacements with a sharing-violation-like
    /// error, then delegates to a real rename.
    struct FlakyReplacer {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl FileReplacer for FlakyReplacer {
        fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "destination locked",
                ));
            }
            std::fs::rename(from, to)
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            base: Duration::from_millis(1),
            step: Duration::from_millis(1),
        }
    }

    fn table(stamp: &str) -> TaskTable {
        TaskTable::new(
            vec![
                "Enabled".into(),
                "ProcessName".into(),
                "ExecutablePath".into(),
                "Frequency".into(),
                "LastRunTime".into(),
            ],
            vec![TaskRow::from_pairs([
                ("Enabled", "true"),
                ("ProcessName", "job"),
                ("ExecutablePath", "job.sh"),
                ("Frequency", "10"),
                ("LastRunTime", stamp),
            ])],
        )
    }

    fn writer(dest: &Path, failures: u32) -> (TableWriter, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let w = TableWriter::with_replacer(
            dest,
            fast_retry(),
            Box::new(FlakyReplacer {
                failures,
                calls: Arc::clone(&calls),
            }),
        );
        (w, calls)
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempts, 5);
        assert_eq!(p.delay(0), Duration::from_millis(1_000));
        assert_eq!(p.delay(1), Duration::from_millis(1_500));
        assert_eq!(p.delay(3), Duration::from_millis(2_500));
    }

    #[test]
    fn temp_file_sits_next_to_destination() {
        let w = TableWriter::new("/data/process_schedule.csv", fast_retry());
        assert_eq!(
            w.temp_path(),
            PathBuf::from("/data/process_schedule.csv.tmp")
        );
    }

    #[test]
    fn tmp_destination_gets_a_distinct_temp_file() {
        let w = TableWriter::new("/data/schedule.tmp", fast_retry());
        assert_eq!(w.temp_path(), PathBuf::from("/data/schedule.tmp.tmp"));
        assert_ne!(w.temp_path(), w.destination());
    }

    #[tokio::test]
    async fn clean_commit_writes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("schedule.csv");
        let w = TableWriter::new(&dest, fast_retry());

        w.commit(&table("2024-01-01 00:00:00")).await.unwrap();

        let reloaded = TaskTable::load(&dest).unwrap();
        assert_eq!(reloaded, table("2024-01-01 00:00:00"));
        assert!(!w.temp_path().exists());
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("schedule.csv");
        std::fs::write(&dest, table("").to_csv_bytes().unwrap()).unwrap();

        let (w, calls) = writer(&dest, 3);
        w.commit(&table("2024-03-03 03:03:03")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            TaskTable::load(&dest).unwrap().rows()[0].get("LastRunTime"),
            "2024-03-03 03:03:03"
        );
        assert!(!w.temp_path().exists());
    }

    #[tokio::test]
    async fn exhausted_retries_leave_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("schedule.csv");
        let before = table("2020-01-01 00:00:00").to_csv_bytes().unwrap();
        std::fs::write(&dest, &before).unwrap();

        let (w, calls) = writer(&dest, 5);
        let err = w.commit(&table("2024-03-03 03:03:03")).await.unwrap_err();

        assert!(matches!(
            err,
            PersistError::ReplaceExhausted { attempts: 5, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(std::fs::read(&dest).unwrap(), before);
        assert!(!w.temp_path().exists());
    }

    #[tokio::test]
    async fn unwritable_temp_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing-dir").join("schedule.csv");
        let w = TableWriter::new(&dest, fast_retry());

        let err = w.commit(&table("")).await.unwrap_err();
        assert!(matches!(err, PersistError::TempWrite { .. }));
    }
}

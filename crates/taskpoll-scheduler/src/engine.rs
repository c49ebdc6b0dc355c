use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use taskpoll_core::TaskpollConfig;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    cache::RunCache,
    error::{CycleError, Result, RowError},
    persist::{RetryPolicy, TableWriter},
    pool::ExecutionPool,
    runner::{ProcessRunner, TaskExecutor},
    schedule::{should_run, DecisionReason},
    table::TaskTable,
    types::{format_timestamp, Dispatch, COL_LAST_RUN_TIME, COL_PROCESS_NAME},
    validate::{check_executable, validate_row, validate_structure},
};

/// Why a row was carried through a cycle without being triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Invalid(RowError),
    Disabled,
    MissingExecutable(PathBuf),
    NotDue(DecisionReason),
    /// The pool refused the dispatch (only after shutdown).
    PoolClosed,
}

/// Outcome of the end-of-cycle commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistOutcome {
    /// Nothing triggered, nothing written.
    #[default]
    Unchanged,
    Written,
    /// Retries exhausted; the RunCache now masks the stale file.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggered {
    pub task: String,
    pub reason: DecisionReason,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub triggered: Vec<Triggered>,
    pub skipped: Vec<(String, SkipReason)>,
    pub persist: PersistOutcome,
}

impl CycleReport {
    pub fn triggered_names(&self) -> Vec<&str> {
        self.triggered.iter().map(|t| t.task.as_str()).collect()
    }

    pub fn skip_reason(&self, task: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, reason)| reason)
    }
}

/// Orchestrates load → validate → decide → dispatch → persist, once per tick.
///
/// Only the loop owns the table and the RunCache; pool workers receive owned
/// [`Dispatch`] copies.
pub struct Scheduler {
    config: TaskpollConfig,
    table_path: PathBuf,
    pool: ExecutionPool,
    writer: TableWriter,
    cache: RunCache,
}

impl Scheduler {
    /// Production wiring: process runner, rename-based writer. Needs a Tokio runtime.
    pub fn new(config: TaskpollConfig) -> Self {
        let executor = Arc::new(ProcessRunner::new(config.python.clone()));
        let writer = TableWriter::new(
            config.resolved_table_path(),
            RetryPolicy::from_config(&config),
        );
        Self::with_parts(config, executor, writer)
    }

    pub fn with_parts(
        config: TaskpollConfig,
        executor: Arc<dyn TaskExecutor>,
        writer: TableWriter,
    ) -> Self {
        let pool = ExecutionPool::new(config.effective_pool_size(), executor);
        Self {
            table_path: writer.destination().to_path_buf(),
            config,
            pool,
            writer,
            cache: RunCache::new(),
        }
    }

    pub fn cache(&self) -> &RunCache {
        &self.cache
    }

    /// One cycle at the current local time.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run_cycle_at(Local::now().naive_local()).await
    }

    /// One cycle evaluated at `now`.
    ///
    /// Structural and load errors abort before anything is scheduled or
    /// written. Row-level problems are logged and the row is carried through.
    pub async fn run_cycle_at(&mut self, now: NaiveDateTime) -> Result<CycleReport> {
        if !self.table_path.exists() {
            return Err(CycleError::TableMissing(self.table_path.clone()));
        }

        let mut table = TaskTable::load(&self.table_path)?;
        validate_structure(table.columns())?;
        table.ensure_last_run_column();
        self.cache.apply(&mut table);

        let stamp = format_timestamp(now);
        let mut report = CycleReport::default();

        for row in table.rows_mut() {
            // The cache is keyed on the raw cell; "Unknown" is display-only.
            let cache_key = row.get(COL_PROCESS_NAME).to_string();
            let record = match validate_row(row) {
                Ok(record) => record,
                Err(e) => {
                    warn!("{e}");
                    report
                        .skipped
                        .push((row.name().to_string(), SkipReason::Invalid(e)));
                    continue;
                }
            };
            let name = record.name.clone();

            // Disabled rows skip the file check entirely.
            if !record.enabled {
                debug!(task = %name, "[{name}] Disabled. Skipping.");
                report.skipped.push((name, SkipReason::Disabled));
                continue;
            }

            let resolved = match check_executable(&self.config.base_dir, &record.executable_path)
            {
                Ok(path) => path,
                Err(missing) => {
                    error!(task = %name, "[{name}] File not found: {}", missing.display());
                    report
                        .skipped
                        .push((name, SkipReason::MissingExecutable(missing)));
                    continue;
                }
            };

            let decision = should_run(&record, now);
            if !decision.due {
                debug!(task = %name, reason = %decision.reason, "[{name}] Not due.");
                report
                    .skipped
                    .push((name, SkipReason::NotDue(decision.reason)));
                continue;
            }

            info!(task = %name, reason = %decision.reason, "[{name}] Triggered ({})", decision.reason);
            let dispatch = Dispatch {
                record,
                resolved_path: resolved,
            };
            if let Err(e) = self.pool.submit(dispatch) {
                error!(task = %name, "[{name}] Dispatch refused: {e}");
                report.skipped.push((name, SkipReason::PoolClosed));
                continue;
            }

            // Stamped at submission, before the commit, so a failed write
            // cannot cause a second trigger next cycle.
            row.set(COL_LAST_RUN_TIME, stamp.clone());
            self.cache.record(&cache_key, &stamp);
            report.triggered.push(Triggered {
                task: name,
                reason: decision.reason,
            });
        }

        if !report.triggered.is_empty() {
            report.persist = match self.writer.commit(&table).await {
                Ok(()) => PersistOutcome::Written,
                Err(e) => {
                    error!(
                        cached = self.cache.len(),
                        "table commit failed, run cache masks stale timestamps: {e}"
                    );
                    PersistOutcome::Failed
                }
            };
        }

        Ok(report)
    }

    /// Main loop. Runs a cycle, sleeps the poll interval, repeats until
    /// `shutdown` broadcasts `true`; then waits for in-flight tasks.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.poll_interval();
        info!(
            interval_secs = interval.as_secs(),
            table = %self.table_path.display(),
            "Scheduler started. Interval: {}s",
            interval.as_secs()
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                error!("scheduler cycle error: {e}");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler shutting down");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Stop accepting work and wait for every dispatched task to finish.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}

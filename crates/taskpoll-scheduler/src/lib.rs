//! `taskpoll-scheduler` — poll-based periodic task scheduler over a CSV task table.
//!
//! # Overview
//!
//! Each cycle the [`engine::Scheduler`] reloads the task table, validates it,
//! decides which rows are due, hands due rows to the bounded
//! [`pool::ExecutionPool`] and atomically rewrites the table with the new
//! `LastRunTime` stamps.
//!
//! # Decision reasons
//!
//! | Reason               | Due | When                                             |
//! |----------------------|-----|--------------------------------------------------|
//! | `disabled`           | no  | `Enabled` is not `true` / `1` / `yes`            |
//! | `first run`          | yes | `LastRunTime` is empty                           |
//! | `invalid date reset` | yes | `LastRunTime` does not parse                     |
//! | `scheduled`          | yes | `now >= LastRunTime + Frequency` minutes         |
//! | `next run at …`      | no  | interval has not elapsed yet                     |

pub mod cache;
pub mod engine;
pub mod error;
pub mod persist;
pub mod pool;
pub mod runner;
pub mod schedule;
pub mod table;
pub mod types;
pub mod validate;

pub use cache::RunCache;
pub use engine::{CycleReport, PersistOutcome, Scheduler, SkipReason};
pub use error::{
    CycleError, PersistError, PoolError, RowError, RunError, StructuralError, TableError,
};
pub use persist::{FileReplacer, RenameReplacer, RetryPolicy, TableWriter};
pub use pool::ExecutionPool;
pub use runner::{ProcessRunner, TaskExecutor};
pub use schedule::{should_run, Decision, DecisionReason};
pub use table::{TaskRow, TaskTable};
pub use types::{Dispatch, TaskRecord};

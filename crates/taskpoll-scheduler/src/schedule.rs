use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};

use crate::types::{format_timestamp, parse_timestamp, TaskRecord};

/// Why a task is or is not due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReason {
    Disabled,
    FirstRun,
    /// `LastRunTime` was unparsable and is treated as "never run".
    InvalidDateReset,
    Scheduled,
    NotYet { next_run: NaiveDateTime },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::Disabled => write!(f, "disabled"),
            DecisionReason::FirstRun => write!(f, "first run"),
            DecisionReason::InvalidDateReset => write!(f, "invalid date reset"),
            DecisionReason::Scheduled => write!(f, "scheduled"),
            DecisionReason::NotYet { next_run } => {
                write!(f, "next run at {}", format_timestamp(*next_run))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub due: bool,
    pub reason: DecisionReason,
}

impl Decision {
    fn due(reason: DecisionReason) -> Self {
        Self { due: true, reason }
    }

    fn skip(reason: DecisionReason) -> Self {
        Self { due: false, reason }
    }
}

/// Decide whether `record` should be triggered at `now`.
///
/// Pure and total. The boundary is inclusive: a task whose next run equals
/// `now` is due. An unparsable `LastRunTime` fails open.
pub fn should_run(record: &TaskRecord, now: NaiveDateTime) -> Decision {
    if !record.enabled {
        return Decision::skip(DecisionReason::Disabled);
    }

    let Some(raw) = record.last_run_time.as_deref() else {
        return Decision::due(DecisionReason::FirstRun);
    };

    let Some(last_run) = parse_timestamp(raw) else {
        return Decision::due(DecisionReason::InvalidDateReset);
    };

    let next_run = next_run_after(last_run, record.frequency_minutes);
    if now >= next_run {
        Decision::due(DecisionReason::Scheduled)
    } else {
        Decision::skip(DecisionReason::NotYet { next_run })
    }
}

/// `last_run + minutes`, saturating at the calendar bounds.
fn next_run_after(last_run: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    let saturated = if minutes < 0 {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    };
    TimeDelta::try_minutes(minutes)
        .and_then(|delta| last_run.checked_add_signed(delta))
        .unwrap_or(saturated)
}

use std::collections::HashMap;

use tracing::debug;

use crate::table::TaskTable;
use crate::types::{COL_LAST_RUN_TIME, COL_PROCESS_NAME};

/// In-memory shadow of the `LastRunTime` stamps this process has written.
///
/// Masks a stale on-disk value after a failed commit so the task is not
/// triggered again on the next cycle. Lives as long as the process; a restart
/// starts empty.
#[derive(Debug, Clone, Default)]
pub struct RunCache {
    entries: HashMap<String, String>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `stamp` as the latest trigger of `task`. A later duplicate name
    /// overwrites an earlier one.
    pub fn record(&mut self, task: &str, stamp: &str) {
        self.entries.insert(task.to_string(), stamp.to_string());
    }

    pub fn get(&self, task: &str) -> Option<&str> {
        self.entries.get(task).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite `LastRunTime` on every row whose `ProcessName` has an entry.
    /// Returns the number of rows touched.
    pub fn apply(&self, table: &mut TaskTable) -> usize {
        if self.entries.is_empty() {
            return 0;
        }

        let mut applied = 0;
        for row in table.rows_mut() {
            if let Some(stamp) = self.entries.get(row.get(COL_PROCESS_NAME)) {
                row.set(COL_LAST_RUN_TIME, stamp.clone());
                applied += 1;
            }
        }
        if applied > 0 {
            debug!(rows = applied, "run cache overrides applied");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TaskRow;

    fn table() -> TaskTable {
        TaskTable::new(
            vec!["ProcessName".into(), "LastRunTime".into()],
            vec![
                TaskRow::from_pairs([("ProcessName", "a"), ("LastRunTime", "2024-01-01 00:00:00")]),
                TaskRow::from_pairs([("ProcessName", "b"), ("LastRunTime", "")]),
                TaskRow::from_pairs([("ProcessName", "a"), ("LastRunTime", "")]),
            ],
        )
    }

    #[test]
    fn empty_cache_leaves_table_alone() {
        let mut t = table();
        assert_eq!(RunCache::new().apply(&mut t), 0);
        assert_eq!(t, table());
    }

    #[test]
    fn overrides_every_row_with_a_cached_name() {
        let mut cache = RunCache::new();
        cache.record("a", "2024-02-02 02:02:02");

        let mut t = table();
        assert_eq!(cache.apply(&mut t), 2);
        assert_eq!(t.rows()[0].get("LastRunTime"), "2024-02-02 02:02:02");
        assert_eq!(t.rows()[1].get("LastRunTime"), "");
        assert_eq!(t.rows()[2].get("LastRunTime"), "2024-02-02 02:02:02");
    }

    #[test]
    fn later_record_shadows_earlier() {
        let mut cache = RunCache::new();
        cache.record("a", "2024-01-01 00:00:00");
        cache.record("a", "2024-01-01 00:05:00");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some("2024-01-01 00:05:00"));
    }
}

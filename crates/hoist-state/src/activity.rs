//! Job activity log.
//!
//! Completed jobs are appended under a key that starts with the RFC 3339
//! completion time (fixed-width, nanosecond precision, `Z` suffix) so a
//! lexicographic range scan is a time range query.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StateResult;
use crate::store::{StateStore, decode};
use crate::tables::ACTIVITY;

/// Summary of one finished job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityRecord {
    pub job_id: Uuid,
    pub namespace: String,
    /// `create` or `delete`.
    pub kind: String,
    pub succeeded: bool,
    pub execution_count: u32,
    pub failure_count: u32,
    pub errors: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn table_key(&self) -> String {
        format!("{}#{}", time_key(self.completed_at), self.job_id)
    }
}

fn time_key(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl StateStore {
    pub fn record_activity(&self, record: &ActivityRecord) -> StateResult<()> {
        self.put_json(ACTIVITY, &record.table_key(), record)
    }

    /// Records completed within `from..=to`, oldest first.
    pub fn activity_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StateResult<Vec<ActivityRecord>> {
        // `~` sorts after `#`, so keys at exactly `to` are included.
        let min = time_key(from);
        let max = format!("{}~", time_key(to));
        self.get_in_range(ACTIVITY, &min, &max)?
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }

    /// Records for one deployment completed within `from..=to`.
    pub fn activity_for(
        &self,
        namespace: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StateResult<Vec<ActivityRecord>> {
        Ok(self
            .activity_between(from, to)?
            .into_iter()
            .filter(|r| r.namespace == namespace)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(namespace: &str, completed_at: DateTime<Utc>) -> ActivityRecord {
        ActivityRecord {
            job_id: Uuid::new_v4(),
            namespace: namespace.to_string(),
            kind: "create".to_string(),
            succeeded: true,
            execution_count: 1,
            failure_count: 0,
            errors: Vec::new(),
            enqueued_at: completed_at - Duration::seconds(5),
            started_at: Some(completed_at - Duration::seconds(4)),
            completed_at,
        }
    }

    #[test]
    fn range_query_by_completion_time() {
        let store = StateStore::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        for minutes in [0, 10, 20, 30] {
            store
                .record_activity(&record("api", base + Duration::minutes(minutes)))
                .unwrap();
        }

        let hits = store
            .activity_between(base + Duration::minutes(10), base + Duration::minutes(20))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].completed_at < hits[1].completed_at);
    }

    #[test]
    fn same_instant_records_do_not_collide() {
        let store = StateStore::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store.record_activity(&record("api", at)).unwrap();
        store.record_activity(&record("api", at)).unwrap();

        assert_eq!(store.activity_between(at, at).unwrap().len(), 2);
    }

    #[test]
    fn filter_by_namespace() {
        let store = StateStore::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store.record_activity(&record("api", at)).unwrap();
        store.record_activity(&record("web", at)).unwrap();

        let api = store
            .activity_for("api", at - Duration::hours(1), at + Duration::hours(1))
            .unwrap();
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].namespace, "api");
    }
}

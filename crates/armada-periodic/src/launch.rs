use std::collections::HashMap;

use armada_core::types::NamespacedId;
use chrono::{DateTime, Utc};

/// Most recent launch per periodic job.
///
/// Purely advisory: entries outlive `Remove` and are only dropped when the
/// job is tracked anew or the dispatcher is flushed.
#[derive(Debug, Default)]
pub struct LaunchTimeTable {
    launches: HashMap<NamespacedId, DateTime<Utc>>,
}

impl LaunchTimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, job: NamespacedId, launch: DateTime<Utc>) {
        self.launches.insert(job, launch);
    }

    pub fn get(&self, job: &NamespacedId) -> Option<DateTime<Utc>> {
        self.launches.get(job).copied()
    }

    pub fn forget(&mut self, job: &NamespacedId) {
        self.launches.remove(job);
    }

    pub fn clear(&mut self) {
        self.launches.clear();
    }

    pub fn len(&self) -> usize {
        self.launches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.launches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_latest_record_per_job() {
        let mut table = LaunchTimeTable::new();
        let job = NamespacedId::new("default", "report");
        let first = DateTime::from_timestamp(100, 0).unwrap();
        let second = DateTime::from_timestamp(160, 0).unwrap();

        assert_eq!(table.get(&job), None);
        table.record(job.clone(), first);
        table.record(job.clone(), second);
        assert_eq!(table.get(&job), Some(second));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn namespaces_are_isolated() {
        let mut table = LaunchTimeTable::new();
        let launch = DateTime::from_timestamp(100, 0).unwrap();
        table.record(NamespacedId::new("default", "report"), launch);

        assert_eq!(table.get(&NamespacedId::new("test", "report")), None);
    }

    #[test]
    fn forget_and_clear() {
        let mut table = LaunchTimeTable::new();
        let launch = DateTime::from_timestamp(100, 0).unwrap();
        let a = NamespacedId::new("default", "a");
        let b = NamespacedId::new("default", "b");
        table.record(a.clone(), launch);
        table.record(b.clone(), launch);

        table.forget(&a);
        assert_eq!(table.get(&a), None);
        assert_eq!(table.get(&b), Some(launch));

        table.clear();
        assert!(table.is_empty());
    }
}

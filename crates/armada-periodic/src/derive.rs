//! Child jobs spawned from a periodic parent.

use armada_core::types::Job;
use chrono::{DateTime, Utc};

use crate::error::{PeriodicError, Result};

/// Separates the parent id from the launch's Unix seconds in a child id.
pub const PERIODIC_LAUNCH_SUFFIX: &str = "/periodic-";

/// `"<parent>/periodic-<unix seconds>"`.
pub fn derived_job_id(parent: &Job, launch: DateTime<Utc>) -> String {
    format!("{}{}{}", parent.id, PERIODIC_LAUNCH_SUFFIX, launch.timestamp())
}

/// Build the concrete job to run for `parent`'s launch at `launch`.
///
/// The child has no schedule of its own and never inherits the parent's run
/// status: a fresh launch always starts unstarted.
pub fn derive_child(parent: &Job, launch: DateTime<Utc>) -> Job {
    let id = derived_job_id(parent, launch);
    Job {
        name: id.clone(),
        id,
        parent_id: Some(parent.id.clone()),
        periodic: None,
        status: None,
        status_description: None,
        ..parent.clone()
    }
}

/// Recover the launch instant from a derived child id.
pub fn derived_launch_time(child_id: &str) -> Result<DateTime<Utc>> {
    let invalid = || PeriodicError::InvalidDerivedId(child_id.to_string());
    let (_, secs) = child_id
        .rsplit_once(PERIODIC_LAUNCH_SUFFIX)
        .ok_or_else(invalid)?;
    let secs: i64 = secs.parse().map_err(|_| invalid())?;
    DateTime::from_timestamp(secs, 0).ok_or_else(invalid)
}

/// Whether `child` is a launch of `parent` (same namespace, derived id).
pub fn is_child_of(child: &Job, parent: &Job) -> bool {
    child.namespace == parent.namespace
        && child.parent_id.as_deref() == Some(parent.id.as_str())
        && child
            .id
            .strip_prefix(parent.id.as_str())
            .is_some_and(|rest| rest.starts_with(PERIODIC_LAUNCH_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_core::types::{JobStatus, PeriodicConfig, PeriodicSpec, DEFAULT_NAMESPACE};

    fn parent() -> Job {
        let mut job = Job::new(DEFAULT_NAMESPACE, "nightly")
            .with_periodic(PeriodicConfig::new(PeriodicSpec::cron("@daily")));
        job.status = Some(JobStatus::Running);
        job.status_description = Some("running fine".to_string());
        job.priority = 70;
        job
    }

    #[test]
    fn child_drops_schedule_and_status() {
        let launch = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let child = derive_child(&parent(), launch);

        assert_eq!(child.id, "nightly/periodic-1700000000");
        assert_eq!(child.name, child.id);
        assert_eq!(child.parent_id.as_deref(), Some("nightly"));
        assert_eq!(child.namespace, DEFAULT_NAMESPACE);
        assert_eq!(child.priority, 70);
        assert!(child.periodic.is_none());
        assert!(child.status.is_none());
        assert!(child.status_description.is_none());
        assert!(is_child_of(&child, &parent()));
    }

    #[test]
    fn launch_time_round_trips_through_child_id() {
        let launch = DateTime::from_timestamp(1_700_000_123, 0).unwrap();
        let child = derive_child(&parent(), launch);
        assert_eq!(derived_launch_time(&child.id).unwrap(), launch);
    }

    #[test]
    fn parent_id_containing_suffix_uses_last_occurrence() {
        assert_eq!(
            derived_launch_time("a/periodic-1/periodic-42").unwrap(),
            DateTime::from_timestamp(42, 0).unwrap()
        );
    }

    #[test]
    fn non_derived_ids_are_rejected() {
        assert!(matches!(
            derived_launch_time("nightly"),
            Err(PeriodicError::InvalidDerivedId(_))
        ));
        assert!(derived_launch_time("nightly/periodic-soon").is_err());
    }

    #[test]
    fn other_namespace_or_parent_is_not_a_child() {
        let launch = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut child = derive_child(&parent(), launch);
        child.namespace = "test".to_string();
        assert!(!is_child_of(&child, &parent()));

        let stranger = Job::new(DEFAULT_NAMESPACE, "nightly/periodic-1");
        assert!(!is_child_of(&stranger, &parent()));
    }
}

use thiserror::Error;

/// Errors that can occur within the periodic dispatcher.
#[derive(Debug, Error)]
pub enum PeriodicError {
    /// The job's schedule (cron, literal instants or time zone) is malformed.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The job is not tracked by the dispatcher.
    #[error("Periodic job not tracked: {id} (namespace {namespace})")]
    JobNotTracked { namespace: String, id: String },

    /// No launch has been recorded for the job.
    #[error("No launch recorded for {id} (namespace {namespace})")]
    LaunchNotFound { namespace: String, id: String },

    /// The id does not carry a periodic launch suffix.
    #[error("Couldn't parse launch time from job id: {0}")]
    InvalidDerivedId(String),

    /// The dispatcher is not enabled (e.g. this server is not the leader).
    #[error("Periodic dispatch disabled")]
    Disabled,

    /// The eval dispatcher failed to create a run or query children.
    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    /// A call into the eval dispatcher exceeded its budget.
    #[error("Dispatcher call timed out after {ms}ms")]
    Timeout { ms: u64 },
}

pub type Result<T> = std::result::Result<T, PeriodicError>;

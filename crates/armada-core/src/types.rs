use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used when a job does not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default scheduling priority for new jobs.
pub const DEFAULT_JOB_PRIORITY: u8 = 50;

/// Job identity: IDs are only unique within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedId {
    pub namespace: String,
    pub id: String,
}

impl NamespacedId {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for NamespacedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ns: {:?}, id: {:?}>", self.namespace, self.id)
    }
}

/// Run status of a job as last reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Dead,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Dead => "dead",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "dead" => Ok(JobStatus::Dead),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// When a periodic job launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodicSpec {
    /// One or more cron expressions; the earliest upcoming match wins.
    Cron { expressions: Vec<String> },

    /// Comma-separated Unix seconds, e.g. `"1700000000,1700000060"`.
    /// Only meant for deterministic tests.
    Literal { instants: String },
}

impl PeriodicSpec {
    /// Convenience constructor for a single cron expression.
    pub fn cron(expression: impl Into<String>) -> Self {
        PeriodicSpec::Cron {
            expressions: vec![expression.into()],
        }
    }

    /// Build a literal spec firing at each of `instants` (sub-second parts are dropped).
    pub fn literal<I>(instants: I) -> Self
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let instants = instants
            .into_iter()
            .map(|t| t.timestamp().to_string())
            .collect::<Vec<_>>()
            .join(",");
        PeriodicSpec::Literal { instants }
    }
}

/// The `periodic` block of a job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicConfig {
    /// A disabled block is treated as if the job had no schedule at all.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub spec: PeriodicSpec,
    /// Skip a launch while an earlier child still has live evals or allocs.
    #[serde(default)]
    pub prohibit_overlap: bool,
    /// IANA zone the cron expressions are evaluated in. `None` uses the
    /// dispatcher's configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl PeriodicConfig {
    pub fn new(spec: PeriodicSpec) -> Self {
        Self {
            enabled: true,
            spec,
            prohibit_overlap: false,
            time_zone: None,
        }
    }
}

/// Marks a job as a template that is instantiated on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterizedJobConfig {
    /// `"optional"`, `"required"` or `"forbidden"`.
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub meta_required: Vec<String>,
    #[serde(default)]
    pub meta_optional: Vec<String>,
}

/// A job definition as submitted to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub namespace: String,
    pub id: String,
    pub name: String,
    /// Set on jobs spawned from a periodic or parameterized parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic: Option<PeriodicConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameterized: Option<ParameterizedJobConfig>,
    /// Administratively stopped.
    #[serde(default)]
    pub stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
}

impl Job {
    /// A plain batch job with no schedule.
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            namespace: namespace.into(),
            name: id.clone(),
            id,
            parent_id: None,
            priority: DEFAULT_JOB_PRIORITY,
            periodic: None,
            parameterized: None,
            stop: false,
            status: None,
            status_description: None,
        }
    }

    pub fn with_periodic(mut self, periodic: PeriodicConfig) -> Self {
        self.periodic = Some(periodic);
        self
    }

    pub fn namespaced_id(&self) -> NamespacedId {
        NamespacedId::new(self.namespace.clone(), self.id.clone())
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic.is_some()
    }

    pub fn is_parameterized(&self) -> bool {
        self.parameterized.is_some()
    }

    /// Whether the periodic dispatcher should be tracking this job: it has an
    /// enabled schedule, is not a parameterized template and is not stopped.
    pub fn is_periodic_active(&self) -> bool {
        let enabled = self.periodic.as_ref().is_some_and(|p| p.enabled);
        enabled && !self.is_parameterized() && !self.stop
    }
}

/// Lifecycle of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Blocked,
    Pending,
    Complete,
    Failed,
    Canceled,
}

impl EvalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EvalStatus::Complete | EvalStatus::Failed | EvalStatus::Canceled
        )
    }
}

/// What caused an evaluation to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalTrigger {
    JobRegister,
    PeriodicJob,
}

/// One unit of scheduling work for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// UUIDv7 so evaluations sort by creation in logs.
    pub id: Uuid,
    pub namespace: String,
    pub job_id: String,
    pub priority: u8,
    pub triggered_by: EvalTrigger,
    pub status: EvalStatus,
    pub create_time: DateTime<Utc>,
}

impl Evaluation {
    /// A fresh pending evaluation for `job`.
    pub fn for_job(job: &Job, triggered_by: EvalTrigger) -> Self {
        Self {
            id: Uuid::now_v7(),
            namespace: job.namespace.clone(),
            job_id: job.id.clone(),
            priority: job.priority,
            triggered_by,
            status: EvalStatus::Pending,
            create_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocDesiredStatus {
    Run,
    Stop,
    Evict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
    Unknown,
}

/// Placement of a job's work on a client node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub namespace: String,
    pub job_id: String,
    pub eval_id: Uuid,
    pub desired_status: AllocDesiredStatus,
    pub client_status: AllocClientStatus,
}

impl Allocation {
    /// Terminal when the server wants it gone or the client reports it finished.
    pub fn is_terminal(&self) -> bool {
        match self.desired_status {
            AllocDesiredStatus::Stop | AllocDesiredStatus::Evict => true,
            AllocDesiredStatus::Run => matches!(
                self.client_status,
                AllocClientStatus::Complete | AllocClientStatus::Failed | AllocClientStatus::Lost
            ),
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_priority() -> u8 {
    DEFAULT_JOB_PRIORITY
}

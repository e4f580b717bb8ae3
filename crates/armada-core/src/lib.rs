//! `armada-core` — domain types, configuration and errors shared by every
//! Armada crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ArmadaConfig, PeriodicDispatchConfig};
pub use error::{ArmadaError, Result};
pub use types::{
    Allocation, AllocClientStatus, AllocDesiredStatus, EvalStatus, EvalTrigger, Evaluation, Job,
    JobStatus, NamespacedId, ParameterizedJobConfig, PeriodicConfig, PeriodicSpec,
    DEFAULT_NAMESPACE,
};

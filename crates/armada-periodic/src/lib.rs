//! `armada-periodic` — leader-side dispatcher for periodic jobs.
//!
//! # Overview
//!
//! Periodic jobs are templates: on every scheduled instant the
//! [`PeriodicDispatch`] derives a concrete child job
//! (`<parent>/periodic-<unix secs>`) and hands it to a [`JobEvalDispatcher`],
//! which registers it and creates an evaluation. Only the leader enables the
//! dispatcher; followers keep it disabled.
//!
//! # Schedules
//!
//! | Variant   | Behaviour                                                     |
//! |-----------|---------------------------------------------------------------|
//! | `Cron`    | One or more cron expressions, earliest match wins, per zone    |
//! | `Literal` | Comma-separated Unix seconds, for deterministic tests          |

pub mod derive;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod heap;
pub mod launch;
pub mod schedule;
pub mod state;

pub use derive::{derive_child, derived_job_id, derived_launch_time};
pub use dispatcher::JobEvalDispatcher;
pub use engine::PeriodicDispatch;
pub use error::{PeriodicError, Result};
pub use heap::DispatchHeap;
pub use launch::LaunchTimeTable;
pub use schedule::next_launch;
pub use state::InMemoryState;

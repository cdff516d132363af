//! Scheduling and dispatch core.
//!
//! `Scheduler` enumerates active AOIs on a cron cadence and submits each id to
//! the `Dispatcher`, which admits at most one in-flight check per AOI and hands
//! accepted jobs to the bounded `WorkerPool`. Each job runs the `ChangePipeline`.

pub mod dispatcher;
pub mod pipeline;
pub mod pool;
pub mod scheduler;

pub use dispatcher::{Dispatcher, SubmitOutcome};
pub use pipeline::{ChangePipeline, PipelineError, PipelineSettings};
pub use pool::{CheckRunner, WorkerPool};
pub use scheduler::{FiringReport, Scheduler, SchedulerError};

//! gridx-schedulers: the backend-agnostic scheduler contract.
//!
//! Wraps a [`SchedulerBackend`] (one cluster manager's client) in a
//! [`Scheduler`] that owns validation, workspace building, role
//! pre-processing, dry runs, idempotent cancel and close, and log
//! iteration:
//!
//! ```text
//! Runner (session)
//!   └── SchedulerRegistry (backend name → factory)
//!       └── Scheduler<B>
//!           ├── B: SchedulerBackend (dry run, schedule, describe, cancel, logs)
//!           └── Workspace (optional, builds images from local dirs)
//! ```

pub mod api;
pub mod dryrun;
pub mod error;
pub mod ids;
pub mod logs;
pub mod registry;
pub mod runner;
pub mod scheduler;

pub use api::{ChunkedLogSource, LogQuery, LogSource, SchedulerBackend, Stream, Workspace};
pub use dryrun::DryRunInfo;
pub use error::{SchedulerError, SchedulerResult};
pub use ids::{make_unique, random_id};
pub use logs::{LogIter, LogOptions, TerminalProbe, split_lines};
pub use registry::{AnyScheduler, SchedulerFactory, SchedulerRegistry};
pub use runner::Runner;
pub use scheduler::Scheduler;

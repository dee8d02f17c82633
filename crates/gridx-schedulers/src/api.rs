//! Capability traits implemented by scheduler backends.
//!
//! A backend adapter implements [`SchedulerBackend`], a thin wrapper over
//! one cluster manager's client. Backends that can turn a local workspace
//! into a runnable image additionally implement [`Workspace`]. The two are
//! composed in [`crate::Scheduler`], which owns the submission state machine
//! and the idempotency rules around these calls.

use std::fmt;
use std::time::SystemTime;

use gridx_specs::{AppDef, AppStatus, Role, RunConfig, RunOpts};

use crate::dryrun::DryRunInfo;

/// Which output stream of a replica to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
    Combined,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
            Stream::Combined => "combined",
        })
    }
}

/// Everything a backend needs to open a log source for one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub app_id: String,
    pub role_name: String,
    pub replica_id: u32,
    /// Lower time bound. Backends without time-indexed logs ignore it.
    pub since: Option<SystemTime>,
    /// Upper time bound. Backends without time-indexed logs ignore it.
    pub until: Option<SystemTime>,
    pub stream: Stream,
    pub should_tail: bool,
}

/// Raw log text of one replica, read incrementally.
pub trait LogSource: Send {
    /// Next chunk of output, or `None` if nothing more is available right
    /// now. Chunks need not end on line boundaries.
    fn read_chunk(&mut self) -> anyhow::Result<Option<String>>;
}

/// Log source over a fixed sequence of chunks.
pub struct ChunkedLogSource<I> {
    chunks: I,
}

impl<I> ChunkedLogSource<I>
where
    I: Iterator<Item = String> + Send,
{
    pub fn new<T>(chunks: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            chunks: chunks.into_iter(),
        }
    }
}

impl<I> LogSource for ChunkedLogSource<I>
where
    I: Iterator<Item = String> + Send,
{
    fn read_chunk(&mut self) -> anyhow::Result<Option<String>> {
        Ok(self.chunks.next())
    }
}

/// The backend-specific half of a scheduler.
///
/// Every method is required. Nothing here validates config or roles; that
/// happens in [`crate::Scheduler`] before any of these are called.
pub trait SchedulerBackend: Send + Sync {
    /// Backend-native submission request, e.g. a job definition.
    type Request: fmt::Debug + Send + Sync + 'static;

    /// Name used as the scheme of app handles, e.g. `aws_batch`.
    fn backend_name(&self) -> &str;

    /// The options this backend accepts.
    fn run_opts(&self) -> RunOpts;

    /// Translate an app into a request without contacting the cluster.
    fn submit_dryrun(
        &self,
        app: &AppDef,
        cfg: &RunConfig,
    ) -> anyhow::Result<DryRunInfo<Self::Request>>;

    /// Submit a prepared request and return the backend's app id.
    fn schedule(&self, dryrun: &DryRunInfo<Self::Request>) -> anyhow::Result<String>;

    /// Current status, or `None` if the app is unknown to this backend.
    fn describe(&self, app_id: &str) -> anyhow::Result<Option<AppStatus>>;

    /// Cancel an app known to exist.
    fn cancel_existing(&self, app_id: &str) -> anyhow::Result<()>;

    /// Open the raw log output of one replica.
    fn stream_logs(&self, query: &LogQuery) -> anyhow::Result<Box<dyn LogSource>>;

    /// Stream read when the caller does not choose one.
    fn default_log_stream(&self) -> Stream;

    /// Release clients and connections. Called at most once.
    fn close(&self) -> anyhow::Result<()>;
}

/// Builds a workspace into a role's image.
pub trait Workspace: Send + Sync {
    /// Build `workspace` on top of the role's current image and point the
    /// role at the result.
    fn build_workspace_and_update_role(
        &self,
        role: &mut Role,
        workspace: &str,
        cfg: &RunConfig,
    ) -> anyhow::Result<()>;
}

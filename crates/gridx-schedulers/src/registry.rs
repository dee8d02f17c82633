//! Scheduler registry: backend name to scheduler factory.
//!
//! Backends are registered explicitly at process start; nothing is
//! discovered implicitly. Schedulers are handed out as [`AnyScheduler`]
//! trait objects so callers can drive any backend without naming its
//! request type.

use std::collections::BTreeMap;

use gridx_specs::{AppDef, AppHandle, AppStatus, CfgMap, RunOpts};
use tracing::debug;

use crate::api::SchedulerBackend;
use crate::error::{SchedulerError, SchedulerResult};
use crate::logs::{LogIter, LogOptions};
use crate::scheduler::Scheduler;

/// Object-safe view of a [`Scheduler`]. Dry runs are returned rendered.
pub trait AnyScheduler: Send + Sync {
    fn backend_name(&self) -> &str;
    fn session_name(&self) -> &str;
    fn run_opts(&self) -> RunOpts;
    fn submit(
        &self,
        app: &mut AppDef,
        cfg: &CfgMap,
        workspace: Option<&str>,
    ) -> SchedulerResult<AppHandle>;
    fn submit_dryrun(&self, app: &mut AppDef, cfg: &CfgMap) -> SchedulerResult<String>;
    fn exists(&self, app_id: &str) -> SchedulerResult<bool>;
    fn cancel(&self, app_id: &str) -> SchedulerResult<()>;
    fn describe(&self, app_id: &str) -> SchedulerResult<Option<AppStatus>>;
    fn log_iter(
        &self,
        app_id: &str,
        role_name: &str,
        k: u32,
        opts: LogOptions,
    ) -> SchedulerResult<LogIter<'_>>;
    fn close(&self);
}

impl<B: SchedulerBackend> AnyScheduler for Scheduler<B> {
    fn backend_name(&self) -> &str {
        Scheduler::backend_name(self)
    }

    fn session_name(&self) -> &str {
        Scheduler::session_name(self)
    }

    fn run_opts(&self) -> RunOpts {
        Scheduler::run_opts(self)
    }

    fn submit(
        &self,
        app: &mut AppDef,
        cfg: &CfgMap,
        workspace: Option<&str>,
    ) -> SchedulerResult<AppHandle> {
        Scheduler::submit(self, app, cfg, workspace)
    }

    fn submit_dryrun(&self, app: &mut AppDef, cfg: &CfgMap) -> SchedulerResult<String> {
        Scheduler::submit_dryrun(self, app, cfg).map(|info| info.render())
    }

    fn exists(&self, app_id: &str) -> SchedulerResult<bool> {
        Scheduler::exists(self, app_id)
    }

    fn cancel(&self, app_id: &str) -> SchedulerResult<()> {
        Scheduler::cancel(self, app_id)
    }

    fn describe(&self, app_id: &str) -> SchedulerResult<Option<AppStatus>> {
        Scheduler::describe(self, app_id)
    }

    fn log_iter(
        &self,
        app_id: &str,
        role_name: &str,
        k: u32,
        opts: LogOptions,
    ) -> SchedulerResult<LogIter<'_>> {
        Scheduler::log_iter(self, app_id, role_name, k, opts)
    }

    fn close(&self) {
        Scheduler::close(self)
    }
}

/// Builds a scheduler for a session name.
pub type SchedulerFactory =
    Box<dyn Fn(&str) -> anyhow::Result<Box<dyn AnyScheduler>> + Send + Sync>;

/// Explicit mapping of backend names to scheduler factories.
#[derive(Default)]
pub struct SchedulerRegistry {
    factories: BTreeMap<String, SchedulerFactory>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str) -> anyhow::Result<Box<dyn AnyScheduler>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(scheduler = %name, "scheduler registered");
        self.factories.insert(name, Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the scheduler registered as `name` for `session_name`.
    pub fn create(&self, name: &str, session_name: &str) -> SchedulerResult<Box<dyn AnyScheduler>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownScheduler {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })?;
        factory(session_name).map_err(|e| SchedulerError::backend(name, "create", e))
    }
}

impl std::fmt::Debug for SchedulerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerRegistry")
            .field("schedulers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

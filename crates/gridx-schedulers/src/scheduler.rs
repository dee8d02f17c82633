//! Scheduler: the backend-agnostic submission pipeline.
//!
//! ```text
//! submit:        check handle prefix ─► resolve cfg ─► validate app ─► workspace (opt) ─► pre-proc roles ─► resource check ─► dry run ─► schedule ─► handle
//! submit_dryrun:                        resolve cfg ─► validate app ─────────────────────► pre-proc roles ─► resource check ─► dry run
//! ```
//!
//! Every check runs before the backend sees the app, so an invalid config or
//! an unresolved role never costs a remote call. `cancel` is idempotent via
//! an existence probe, and `close` tears the backend down at most once.

use std::sync::atomic::{AtomicBool, Ordering};

use gridx_specs::{AppDef, AppHandle, AppStatus, CfgMap, RunConfig, RunOpts, SpecError};
use tracing::{debug, info, warn};

use crate::api::{LogQuery, SchedulerBackend, Workspace};
use crate::dryrun::DryRunInfo;
use crate::error::{SchedulerError, SchedulerResult};
use crate::logs::{LogIter, LogOptions, TerminalProbe};

/// A backend plus its optional workspace capability, bound to one session.
pub struct Scheduler<B: SchedulerBackend> {
    backend: B,
    workspace: Option<Box<dyn Workspace>>,
    session_name: String,
    closed: AtomicBool,
}

impl<B: SchedulerBackend> Scheduler<B> {
    pub fn new(backend: B, session_name: impl Into<String>) -> Self {
        Self {
            backend,
            workspace: None,
            session_name: session_name.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enable `submit(.., Some(workspace))` through `workspace`.
    pub fn with_workspace(mut self, workspace: impl Workspace + 'static) -> Self {
        self.workspace = Some(Box::new(workspace));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn supports_workspace(&self) -> bool {
        self.workspace.is_some()
    }

    pub fn run_opts(&self) -> RunOpts {
        self.backend.run_opts()
    }

    /// Submit `app` and return the handle addressing it.
    ///
    /// If `workspace` is given it is built into the image of the app's
    /// first role before anything else touches the roles.
    pub fn submit(
        &self,
        app: &mut AppDef,
        cfg: &CfgMap,
        workspace: Option<&str>,
    ) -> SchedulerResult<AppHandle> {
        AppHandle::check_prefix(self.backend_name(), &self.session_name)?;
        let resolved = self.resolve_cfg(cfg)?;
        app.validate()?;

        if let Some(workspace) = workspace {
            self.build_workspace(app, workspace, &resolved)?;
        }

        let dryrun = self.prepare(app, resolved)?;
        let app_id = self.schedule(&dryrun)?;
        let handle = AppHandle::new(self.backend_name(), &self.session_name, app_id)?;
        info!(%handle, app = %app.name, "app submitted");
        Ok(handle)
    }

    /// Everything `submit` does short of building a workspace and
    /// contacting the cluster.
    pub fn submit_dryrun(
        &self,
        app: &mut AppDef,
        cfg: &CfgMap,
    ) -> SchedulerResult<DryRunInfo<B::Request>> {
        let resolved = self.resolve_cfg(cfg)?;
        app.validate()?;
        self.prepare(app, resolved)
    }

    /// Submit a request built by [`Scheduler::submit_dryrun`].
    ///
    /// Returns the backend app id.
    pub fn schedule(&self, dryrun: &DryRunInfo<B::Request>) -> SchedulerResult<String> {
        let app_id = self
            .backend
            .schedule(dryrun)
            .map_err(|e| self.backend_error("schedule", e))?;
        debug!(backend = %self.backend_name(), %app_id, "request scheduled");
        Ok(app_id)
    }

    /// Whether the backend knows `app_id`.
    pub fn exists(&self, app_id: &str) -> SchedulerResult<bool> {
        Ok(self.describe(app_id)?.is_some())
    }

    /// Cancel `app_id`. Unknown apps are a silent no-op.
    pub fn cancel(&self, app_id: &str) -> SchedulerResult<()> {
        if !self.exists(app_id)? {
            debug!(backend = %self.backend_name(), %app_id, "app does not exist, nothing to cancel");
            return Ok(());
        }
        self.backend
            .cancel_existing(app_id)
            .map_err(|e| self.backend_error("cancel", e))?;
        info!(backend = %self.backend_name(), %app_id, "app cancelled");
        Ok(())
    }

    /// Current status, or `None` if the app is unknown to this backend.
    pub fn describe(&self, app_id: &str) -> SchedulerResult<Option<AppStatus>> {
        self.backend
            .describe(app_id)
            .map_err(|e| self.backend_error("describe", e))
    }

    /// Lines of output from replica `k` of `role_name`.
    ///
    /// Opening the source does not wait for output; only iteration does,
    /// and only when tailing. `since`/`until` are handed to the backend,
    /// which ignores them if its logs are not time-indexed.
    pub fn log_iter(
        &self,
        app_id: &str,
        role_name: &str,
        k: u32,
        opts: LogOptions,
    ) -> SchedulerResult<LogIter<'_>> {
        let filter = opts.compile_regex()?;
        let query = LogQuery {
            app_id: app_id.to_string(),
            role_name: role_name.to_string(),
            replica_id: k,
            since: opts.since,
            until: opts.until,
            stream: opts.streams.unwrap_or_else(|| self.backend.default_log_stream()),
            should_tail: opts.should_tail,
        };
        let source = self
            .backend
            .stream_logs(&query)
            .map_err(|e| self.backend_error("stream_logs", e))?;
        debug!(
            backend = %self.backend_name(),
            %app_id,
            role = %role_name,
            replica = k,
            stream = %query.stream,
            tail = query.should_tail,
            "log stream opened"
        );

        let app_id = app_id.to_string();
        let probe: TerminalProbe<'_> = Box::new(move || -> SchedulerResult<bool> {
            Ok(self
                .describe(&app_id)?
                .is_none_or(|status| status.is_terminal()))
        });
        Ok(LogIter::new(
            source,
            filter,
            opts.should_tail,
            opts.poll_interval,
            probe,
        ))
    }

    /// Release backend resources. Later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.backend.close() {
            Ok(()) => debug!(backend = %self.backend_name(), session = %self.session_name, "scheduler closed"),
            Err(e) => warn!(backend = %self.backend_name(), error = %e, "error while closing scheduler"),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn resolve_cfg(&self, cfg: &CfgMap) -> SchedulerResult<RunConfig> {
        self.run_opts()
            .resolve(cfg)
            .map_err(|e| SchedulerError::Spec(SpecError::InvalidRunConfig(e)))
    }

    fn build_workspace(
        &self,
        app: &mut AppDef,
        workspace: &str,
        cfg: &RunConfig,
    ) -> SchedulerResult<()> {
        let builder = self
            .workspace
            .as_ref()
            .ok_or_else(|| SchedulerError::WorkspaceUnsupported(self.backend_name().to_string()))?;
        let Some(role) = app.roles.first_mut() else {
            return Ok(());
        };
        builder
            .build_workspace_and_update_role(role, workspace, cfg)
            .map_err(|source| SchedulerError::Workspace {
                workspace: workspace.to_string(),
                source,
            })?;
        info!(%workspace, role = %role.name, image = %role.image, "workspace built");
        Ok(())
    }

    /// Pre-process roles, check them, and build the dry run.
    fn prepare(
        &self,
        app: &mut AppDef,
        cfg: RunConfig,
    ) -> SchedulerResult<DryRunInfo<B::Request>> {
        for role in &mut app.roles {
            role.run_pre_proc(&cfg)
                .map_err(|source| SchedulerError::RolePreProc {
                    role: role.name.clone(),
                    source,
                })?;
        }

        if let Some(role) = app.roles.iter().find(|r| r.resource.is_null()) {
            return Err(SchedulerError::ResourceUnresolved {
                role: role.name.clone(),
            });
        }

        let mut dryrun = self
            .backend
            .submit_dryrun(app, &cfg)
            .map_err(|e| self.backend_error("submit_dryrun", e))?;
        dryrun.app = Some(app.clone());
        dryrun.cfg = Some(cfg);
        Ok(dryrun)
    }

    fn backend_error(&self, op: &'static str, source: anyhow::Error) -> SchedulerError {
        SchedulerError::backend(self.backend_name(), op, source)
    }
}

//! Session-scoped front end over the scheduler registry.
//!
//! A [`Runner`] creates schedulers on first use, merges `.gridxconfig`
//! defaults into run configs, and routes handle-addressed calls to the
//! scheduler named in the handle.

use std::collections::HashMap;
use std::time::Duration;

use gridx_specs::{AppDef, AppHandle, AppStatus, CfgMap, GridxConfig, RunOpts, parse_app_handle};
use tracing::{debug, info, warn};

use crate::error::SchedulerResult;
use crate::logs::LogOptions;
use crate::registry::{AnyScheduler, SchedulerRegistry};

pub struct Runner {
    session_name: String,
    registry: SchedulerRegistry,
    schedulers: HashMap<String, Box<dyn AnyScheduler>>,
    config: Option<GridxConfig>,
}

impl Runner {
    pub fn new(session_name: impl Into<String>, registry: SchedulerRegistry) -> Self {
        Self {
            session_name: session_name.into(),
            registry,
            schedulers: HashMap::new(),
            config: None,
        }
    }

    /// Use `config` for per-backend run option defaults.
    pub fn with_config(mut self, config: GridxConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn run_opts(&mut self, scheduler: &str) -> SchedulerResult<RunOpts> {
        Ok(self.scheduler(scheduler)?.run_opts())
    }

    /// Rendered request `run` would submit.
    pub fn dryrun(&mut self, app: &mut AppDef, scheduler: &str, cfg: &CfgMap) -> SchedulerResult<String> {
        let cfg = self.merged_cfg(scheduler, cfg)?;
        self.scheduler(scheduler)?.submit_dryrun(app, &cfg)
    }

    pub fn run(
        &mut self,
        app: &mut AppDef,
        scheduler: &str,
        cfg: &CfgMap,
        workspace: Option<&str>,
    ) -> SchedulerResult<AppHandle> {
        let cfg = self.merged_cfg(scheduler, cfg)?;
        let handle = self.scheduler(scheduler)?.submit(app, &cfg, workspace)?;
        info!(%handle, session = %self.session_name, "app launched");
        Ok(handle)
    }

    /// Cancel the app behind `handle`. Unknown apps are a no-op.
    pub fn cancel(&mut self, handle: &str) -> SchedulerResult<()> {
        let handle = self.decode(handle)?;
        self.scheduler(&handle.scheduler_backend)?
            .cancel(&handle.app_id)
    }

    pub fn status(&mut self, handle: &str) -> SchedulerResult<Option<AppStatus>> {
        let handle = self.decode(handle)?;
        self.scheduler(&handle.scheduler_backend)?
            .describe(&handle.app_id)
    }

    /// Block until the app is terminal or gone, polling every `interval`.
    pub fn wait(&mut self, handle: &str, interval: Duration) -> SchedulerResult<Option<AppStatus>> {
        let handle = self.decode(handle)?;
        let scheduler = self.scheduler(&handle.scheduler_backend)?;
        loop {
            let status = scheduler.describe(&handle.app_id)?;
            match &status {
                Some(s) if !s.is_terminal() => {
                    debug!(%handle, state = %s.state, "waiting for app");
                    std::thread::sleep(interval);
                }
                _ => return Ok(status),
            }
        }
    }

    /// All log lines of replica `k` of `role_name`, collected eagerly.
    pub fn log_lines(
        &mut self,
        handle: &str,
        role_name: &str,
        k: u32,
        opts: LogOptions,
    ) -> SchedulerResult<Vec<String>> {
        let handle = self.decode(handle)?;
        self.scheduler(&handle.scheduler_backend)?
            .log_iter(&handle.app_id, role_name, k, opts)?
            .collect()
    }

    /// Close every scheduler created so far.
    pub fn close(&mut self) {
        for (name, scheduler) in self.schedulers.drain() {
            debug!(scheduler = %name, "closing scheduler");
            scheduler.close();
        }
    }

    fn decode(&self, handle: &str) -> SchedulerResult<AppHandle> {
        let handle = parse_app_handle(handle)?;
        if handle.session_name != self.session_name {
            warn!(
                %handle,
                session = %self.session_name,
                "handle belongs to a different session; using it anyway"
            );
        }
        Ok(handle)
    }

    fn scheduler(&mut self, name: &str) -> SchedulerResult<&dyn AnyScheduler> {
        if !self.schedulers.contains_key(name) {
            let scheduler = self.registry.create(name, &self.session_name)?;
            debug!(scheduler = %name, session = %self.session_name, "scheduler created");
            self.schedulers.insert(name.to_string(), scheduler);
        }
        Ok(self.schedulers[name].as_ref())
    }

    /// `cfg` with `.gridxconfig` values filled in for unset options.
    fn merged_cfg(&mut self, scheduler: &str, cfg: &CfgMap) -> SchedulerResult<CfgMap> {
        let mut merged = cfg.clone();
        let Some(config) = self.config.clone() else {
            return Ok(merged);
        };
        let opts = self.run_opts(scheduler)?;
        config.apply(scheduler, &opts, &mut merged)?;
        Ok(merged)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("session_name", &self.session_name)
            .field("registry", &self.registry)
            .field("open", &self.schedulers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use gridx_specs::{AppState, OptType, Resource, Role, RunConfig};

    use super::*;
    use crate::api::{ChunkedLogSource, LogQuery, LogSource, SchedulerBackend, Stream};
    use crate::dryrun::DryRunInfo;
    use crate::scheduler::Scheduler;

    type Calls = Arc<Mutex<Vec<String>>>;

    /// Knows a single app, `id`, which is running until cancelled.
    struct FooBackend {
        calls: Calls,
        state: Mutex<Option<AppState>>,
    }

    impl SchedulerBackend for FooBackend {
        type Request = String;

        fn backend_name(&self) -> &str {
            "foo"
        }

        fn run_opts(&self) -> RunOpts {
            let mut opts = RunOpts::new();
            opts.add("queue", OptType::Str, true, None, "queue name");
            opts
        }

        fn submit_dryrun(&self, app: &AppDef, cfg: &RunConfig) -> anyhow::Result<DryRunInfo<String>> {
            let req = format!("{}@{}", app.name, cfg.get_str("queue").unwrap_or("?"));
            Ok(DryRunInfo::new(req, String::clone))
        }

        fn schedule(&self, _dryrun: &DryRunInfo<String>) -> anyhow::Result<String> {
            Ok("id".to_string())
        }

        fn describe(&self, app_id: &str) -> anyhow::Result<Option<AppStatus>> {
            self.calls.lock().unwrap().push(format!("describe {app_id}"));
            let state = if app_id == "id" { *self.state.lock().unwrap() } else { None };
            Ok(state.map(|s| AppStatus::new(app_id, s)))
        }

        fn cancel_existing(&self, app_id: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("cancel {app_id}"));
            *self.state.lock().unwrap() = Some(AppState::Cancelled);
            Ok(())
        }

        fn stream_logs(&self, _query: &LogQuery) -> anyhow::Result<Box<dyn LogSource>> {
            Ok(Box::new(ChunkedLogSource::new(vec!["a\nb".to_string()])))
        }

        fn default_log_stream(&self) -> Stream {
            Stream::Stdout
        }

        fn close(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("close".to_string());
            Ok(())
        }
    }

    fn runner(calls: &Calls) -> Runner {
        let calls = Arc::clone(calls);
        let mut registry = SchedulerRegistry::new();
        registry.register("foo", move |session: &str| -> anyhow::Result<Box<dyn AnyScheduler>> {
            let backend = FooBackend {
                calls: Arc::clone(&calls),
                state: Mutex::new(Some(AppState::Running)),
            };
            Ok(Box::new(Scheduler::new(backend, session)))
        });
        Runner::new("session", registry)
    }

    fn app() -> AppDef {
        AppDef::new(
            "trainer",
            vec![Role::new("worker", "img").with_resource(Resource::new(1, 0, 128))],
        )
    }

    #[test]
    fn cancel_routes_by_handle() {
        let calls = Calls::default();
        let mut runner = runner(&calls);
        runner.cancel("foo://session/id").unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["describe id", "cancel id"]);
    }

    #[test]
    fn cancel_rejects_malformed_handle() {
        let calls = Calls::default();
        let mut runner = runner(&calls);
        assert!(runner.cancel("not a handle").is_err());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn run_fills_cfg_from_config_file() {
        let config = GridxConfig::from_toml_str("[foo]\nqueue = \"gpu\"\n").unwrap();
        let calls = Calls::default();
        let mut runner = runner(&calls).with_config(config);

        assert_eq!(runner.dryrun(&mut app(), "foo", &CfgMap::new()).unwrap(), "trainer@gpu");

        let mut cfg = CfgMap::new();
        cfg.insert("queue".into(), "cpu".into());
        assert_eq!(runner.dryrun(&mut app(), "foo", &cfg).unwrap(), "trainer@cpu");

        let handle = runner.run(&mut app(), "foo", &CfgMap::new(), None).unwrap();
        assert_eq!(handle.to_string(), "foo://session/id");
    }

    #[test]
    fn unknown_scheduler_is_reported() {
        let calls = Calls::default();
        let mut runner = runner(&calls);
        let err = runner.status("slurm://session/id").unwrap_err();
        assert!(err.to_string().contains("slurm"));
    }

    #[test]
    fn wait_returns_terminal_status() {
        let calls = Calls::default();
        let mut runner = runner(&calls);
        runner.cancel("foo://session/id").unwrap();
        let status = runner
            .wait("foo://session/id", Duration::ZERO)
            .unwrap()
            .unwrap();
        assert_eq!(status.state, AppState::Cancelled);
        assert!(runner.wait("foo://session/other", Duration::ZERO).unwrap().is_none());
    }

    #[test]
    fn log_lines_collects_all_lines() {
        let calls = Calls::default();
        let mut runner = runner(&calls);
        let lines = runner
            .log_lines("foo://session/id", "worker", 0, LogOptions::default())
            .unwrap();
        assert_eq!(lines, vec!["a\n", "b"]);
    }

    #[test]
    fn close_closes_created_schedulers_once() {
        let calls = Calls::default();
        let mut runner = runner(&calls);
        runner.status("foo://session/id").unwrap();
        runner.close();
        runner.close();
        drop(runner);
        assert_eq!(
            calls.lock().unwrap().iter().filter(|c| *c == "close").count(),
            1
        );
    }
}

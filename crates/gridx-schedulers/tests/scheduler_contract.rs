//! Contract tests for `Scheduler` driven through a mock backend.
//!
//! The mock declares a single required string option, `foo`, counts every
//! backend call, and knows no apps until something is scheduled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use gridx_schedulers::{
    ChunkedLogSource, DryRunInfo, LogOptions, LogQuery, LogSource, Scheduler, SchedulerBackend,
    SchedulerError, Stream, Workspace,
};
use gridx_specs::{
    AppDef, AppState, AppStatus, CfgMap, CfgVal, NULL_RESOURCE, NamedResources, OptType, Resource,
    Role, RunConfig, RunOpts, SpecError, parse_app_handle,
};

// ── Tracing setup ────────────────────────────────────────────────

static TRACING_INIT: Once = Once::new();

/// Controlled by `RUST_LOG` (e.g. `RUST_LOG=gridx_schedulers=debug`).
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ── Mock backend ─────────────────────────────────────────────────

#[derive(Default)]
struct MockBackend {
    backend_calls: AtomicUsize,
    close_calls: AtomicUsize,
    cancelled: Mutex<Vec<String>>,
    scheduled: Mutex<Vec<String>>,
}

impl MockBackend {
    fn calls(&self) -> usize {
        self.backend_calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl SchedulerBackend for MockBackend {
    type Request = AppDef;

    fn backend_name(&self) -> &str {
        "mock"
    }

    fn run_opts(&self) -> RunOpts {
        let mut opts = RunOpts::new();
        opts.add("foo", OptType::Str, true, None, "required option foo");
        opts
    }

    fn submit_dryrun(&self, app: &AppDef, _cfg: &RunConfig) -> anyhow::Result<DryRunInfo<AppDef>> {
        self.hit();
        Ok(DryRunInfo::new(app.clone(), |app| app.name.clone()))
    }

    fn schedule(&self, dryrun: &DryRunInfo<AppDef>) -> anyhow::Result<String> {
        self.hit();
        let app_id = format!("{}-0", dryrun.request().name);
        self.scheduled.lock().unwrap().push(app_id.clone());
        Ok(app_id)
    }

    fn describe(&self, app_id: &str) -> anyhow::Result<Option<AppStatus>> {
        let scheduled = self.scheduled.lock().unwrap().iter().any(|id| id == app_id);
        let cancelled = self.cancelled.lock().unwrap().iter().any(|id| id == app_id);
        Ok(match (scheduled, cancelled) {
            (false, _) => None,
            (true, false) => Some(AppStatus::new(app_id, AppState::Running)),
            (true, true) => Some(AppStatus::new(app_id, AppState::Cancelled)),
        })
    }

    fn cancel_existing(&self, app_id: &str) -> anyhow::Result<()> {
        self.cancelled.lock().unwrap().push(app_id.to_string());
        Ok(())
    }

    fn stream_logs(&self, _query: &LogQuery) -> anyhow::Result<Box<dyn LogSource>> {
        Ok(Box::new(ChunkedLogSource::new(vec![
            "epoch 1 loss=0.9\nepoch 2 ".to_string(),
            "loss=0.5\ndone\n".to_string(),
        ])))
    }

    fn default_log_stream(&self) -> Stream {
        Stream::Stderr
    }

    fn close(&self) -> anyhow::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Replaces the first role's image with the workspace path.
struct ImageFromWorkspace;

impl Workspace for ImageFromWorkspace {
    fn build_workspace_and_update_role(
        &self,
        role: &mut Role,
        workspace: &str,
        _cfg: &RunConfig,
    ) -> anyhow::Result<()> {
        role.image = workspace.to_string();
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn scheduler() -> Scheduler<MockBackend> {
    init_tracing();
    Scheduler::new(MockBackend::default(), "test_session")
}

fn cfg_with(key: &str, value: CfgVal) -> CfgMap {
    let mut cfg = CfgMap::new();
    cfg.insert(key.to_string(), value);
    cfg
}

fn valid_cfg() -> CfgMap {
    cfg_with("foo", "bar".into())
}

fn app() -> AppDef {
    AppDef::new(
        "app_mock",
        vec![Role::new("trainer", "pytorch:latest").with_resource(Resource::new(4, 1, 8 * 1024))],
    )
}

// ── Config validation ────────────────────────────────────────────

#[test]
fn missing_required_option_fails_before_backend() {
    let scheduler = scheduler();
    let err = scheduler.submit(&mut app(), &CfgMap::new(), None).unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("foo"));

    let err = scheduler.submit_dryrun(&mut app(), &CfgMap::new()).unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(scheduler.backend().calls(), 0);
}

#[test]
fn mistyped_option_fails() {
    let scheduler = scheduler();
    let cfg = cfg_with("foo", CfgVal::Int(100));
    for err in [
        scheduler.submit(&mut app(), &cfg, None).unwrap_err(),
        scheduler.submit_dryrun(&mut app(), &cfg).unwrap_err(),
    ] {
        match err {
            SchedulerError::Spec(SpecError::InvalidRunConfig(e)) => {
                assert!(e.mentions("foo"));
            }
            other => panic!("expected config error, got {other}"),
        }
    }
    assert_eq!(scheduler.backend().calls(), 0);
}

#[test]
fn valid_config_submits() {
    let scheduler = scheduler();
    let handle = scheduler.submit(&mut app(), &valid_cfg(), None).unwrap();
    assert_eq!(handle.to_string(), "mock://test_session/app_mock-0");

    let parsed = parse_app_handle(&handle.to_string()).unwrap();
    assert_eq!(parsed, handle);

    let dryrun = scheduler.submit_dryrun(&mut app(), &valid_cfg()).unwrap();
    assert_eq!(dryrun.render(), "app_mock");
}

#[test]
fn unencodable_session_fails_before_backend() {
    init_tracing();
    let scheduler = Scheduler::new(MockBackend::default(), "alice/bob");
    let err = scheduler.submit(&mut app(), &valid_cfg(), None).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Spec(SpecError::MalformedAppHandle { .. })
    ));
    assert_eq!(scheduler.backend().calls(), 0);
    assert!(scheduler.backend().scheduled.lock().unwrap().is_empty());
}

// ── Workspace and role pre-processing ────────────────────────────

#[test]
fn workspace_updates_first_role_image() {
    let scheduler = scheduler().with_workspace(ImageFromWorkspace);
    let mut app = app();
    scheduler
        .submit(&mut app, &valid_cfg(), Some("some_workspace"))
        .unwrap();
    assert_eq!(app.roles[0].image, "some_workspace");

    let scheduled = scheduler.backend().scheduled.lock().unwrap().clone();
    assert_eq!(scheduled, vec!["app_mock-0"]);
}

#[test]
fn dryrun_never_builds_workspace() {
    let scheduler = scheduler().with_workspace(ImageFromWorkspace);
    let mut app = app();
    let dryrun = scheduler.submit_dryrun(&mut app, &valid_cfg()).unwrap();
    assert_eq!(dryrun.request().roles[0].image, "pytorch:latest");
}

#[test]
fn pre_proc_runs_exactly_once_per_submission() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let role = Role::new("trainer", "pytorch:latest")
        .with_resource(Resource::new(1, 0, 1024))
        .with_pre_proc(move |role, cfg| {
            counter.fetch_add(1, Ordering::SeqCst);
            let foo = cfg.get_str("foo").unwrap_or_default().to_string();
            role.env.insert("FOO".into(), foo);
            Ok(())
        });
    let mut app = AppDef::new("app_mock", vec![role]);

    let scheduler = scheduler();
    let dryrun = scheduler.submit_dryrun(&mut app, &valid_cfg()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(dryrun.request().roles[0].env["FOO"], "bar");
}

#[test]
fn pre_proc_runs_once_per_role_on_submit() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let role = |name: &'static str| {
        let order = Arc::clone(&order);
        Role::new(name, "pytorch:latest")
            .with_resource(Resource::new(1, 0, 1024))
            .with_pre_proc(move |role, _| {
                order.lock().unwrap().push(role.name.clone());
                Ok(())
            })
    };
    let mut app = AppDef::new("app_mock", vec![role("trainer"), role("reader")]);

    let scheduler = scheduler();
    let handle = scheduler.submit(&mut app, &valid_cfg(), None).unwrap();
    assert_eq!(handle.app_id, "app_mock-0");
    assert_eq!(*order.lock().unwrap(), vec!["trainer", "reader"]);
    assert_eq!(scheduler.backend().calls(), 2);
}

#[test]
fn failing_pre_proc_is_reported_with_role() {
    let role = Role::new("trainer", "img")
        .with_resource(Resource::new(1, 0, 1024))
        .with_pre_proc(|_, _| anyhow::bail!("missing credentials"));
    let scheduler = scheduler();
    let err = scheduler
        .submit(&mut AppDef::new("app_mock", vec![role]), &valid_cfg(), None)
        .unwrap_err();
    assert!(matches!(&err, SchedulerError::RolePreProc { role, .. } if role == "trainer"));
    assert_eq!(scheduler.backend().calls(), 0);
}

// ── Resource gate ────────────────────────────────────────────────

#[test]
fn null_resource_is_rejected_before_backend() {
    let scheduler = scheduler();
    let mut app = AppDef::new(
        "app_mock",
        vec![
            Role::new("ok", "img").with_resource(Resource::new(1, 0, 1024)),
            Role::new("unresolved", "img").with_resource(NULL_RESOURCE),
        ],
    );

    let err = scheduler.submit(&mut app, &valid_cfg(), None).unwrap_err();
    assert!(matches!(&err, SchedulerError::ResourceUnresolved { role } if role == "unresolved"));
    let err = scheduler.submit_dryrun(&mut app, &valid_cfg()).unwrap_err();
    assert!(matches!(err, SchedulerError::ResourceUnresolved { .. }));
    assert_eq!(scheduler.backend().calls(), 0);
}

#[test]
fn tagged_null_resource_is_still_unresolved() {
    let scheduler = scheduler();
    let mut app = AppDef::new(
        "app_mock",
        vec![Role::new("trainer", "img").with_resource(NULL_RESOURCE.with_capability("zone", "a"))],
    );
    let err = scheduler.submit(&mut app, &valid_cfg(), None).unwrap_err();
    assert!(matches!(err, SchedulerError::ResourceUnresolved { .. }));
    assert_eq!(scheduler.backend().calls(), 0);
}

#[test]
fn pre_proc_may_resolve_resource() {
    let role = Role::new("trainer", "img").with_pre_proc(|role, _| {
        role.resource = NamedResources::builtin().get("aws_p3.2xlarge")?;
        Ok(())
    });
    let mut app = AppDef::new("app_mock", vec![role]);
    let dryrun = scheduler().submit_dryrun(&mut app, &valid_cfg()).unwrap();
    assert_eq!(dryrun.request().roles[0].resource.gpu, 1);
}

#[test]
fn named_resource_wins_over_raw_fields() {
    let table = NamedResources::builtin();
    let named = table.resource(Some(1), Some(0), Some(1), Some("aws_p3.2xlarge")).unwrap();
    assert_eq!(named, table.get("aws_p3.2xlarge").unwrap());

    let raw = table.resource(Some(1), None, None, None).unwrap();
    assert_eq!((raw.cpu, raw.gpu, raw.mem_mb), (1, 0, 1024));
}

// ── Cancel, describe, close ──────────────────────────────────────

#[test]
fn cancel_is_idempotent() {
    let scheduler = scheduler();
    for _ in 0..3 {
        scheduler.cancel("does_not_exist").unwrap();
    }
    assert!(scheduler.backend().cancelled.lock().unwrap().is_empty());

    let handle = scheduler.submit(&mut app(), &valid_cfg(), None).unwrap();
    scheduler.cancel(&handle.app_id).unwrap();
    let status = scheduler.describe(&handle.app_id).unwrap().unwrap();
    assert_eq!(status.state, AppState::Cancelled);
    assert_eq!(*scheduler.backend().cancelled.lock().unwrap(), vec![handle.app_id]);
}

#[test]
fn close_is_idempotent() {
    let scheduler = scheduler();
    scheduler.close();
    scheduler.close();
    assert_eq!(scheduler.backend().close_calls.load(Ordering::SeqCst), 1);
}

// ── Logs ─────────────────────────────────────────────────────────

#[test]
fn log_iter_reassembles_and_filters() {
    let scheduler = scheduler();
    let lines = scheduler
        .log_iter("app_mock-0", "trainer", 0, LogOptions::default().with_regex("loss"))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(lines, vec!["epoch 1 loss=0.9\n", "epoch 2 loss=0.5\n"]);
}

#[test]
fn tailing_an_unknown_app_stops_after_draining() {
    let scheduler = scheduler();
    let lines = scheduler
        .log_iter("app_mock-0", "trainer", 0, LogOptions::tail())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(lines.len(), 3);
}

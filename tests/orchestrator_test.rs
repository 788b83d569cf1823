mod support;

use dockhand::engine::compose::ComposeAction;
use dockhand::orchestrator::{container_name, image_tag};
use dockhand::runlog::latest_log_file;
use dockhand::{
    detection, Orchestrator, OrchestratorError, Project, ProjectVariant, RunHandle, RunStatus,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use support::{write_files, FakeCompose, FakeEngine};
use tempfile::TempDir;

struct Harness {
    logs: TempDir,
    engine: Arc<FakeEngine>,
    compose: Arc<FakeCompose>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(engine: FakeEngine) -> Self {
        Self::with_compose(engine, FakeCompose::default())
    }

    fn with_compose(engine: FakeEngine, compose: FakeCompose) -> Self {
        let logs = TempDir::new().unwrap();
        let engine = Arc::new(engine);
        let compose = Arc::new(compose);
        let orchestrator = Orchestrator::new(
            Some(engine.clone()),
            compose.clone(),
            logs.path().to_path_buf(),
        );
        Self {
            logs,
            engine,
            compose,
            orchestrator,
        }
    }

    fn log_contents(&self, project: &Project) -> String {
        let path = latest_log_file(self.logs.path(), &project.name).expect("log file");
        fs::read_to_string(path).unwrap()
    }
}

fn node_project(dir: &Path, port: u16) -> Project {
    write_files(
        dir,
        &[
            ("package.json", r#"{"scripts": {"start": "node server.js"}}"#),
            ("server.js", "require('http').createServer().listen(process.env.PORT)"),
        ],
    );
    assert_eq!(detection::detect(dir), ProjectVariant::Node);
    Project::new("api", dir, ProjectVariant::Node, port)
}

fn static_project(dir: &Path, port: u16) -> Project {
    write_files(dir, &[("index.html", "<h1>hi</h1>")]);
    Project::new("site", dir, ProjectVariant::Static, port)
}

fn full_stack_project(dir: &Path, port: u16) -> Project {
    write_files(
        dir,
        &[
            ("backend/package.json", r#"{"scripts": {"start": "node index.js"}}"#),
            ("frontend/package.json", r#"{"dependencies": {"react": "^18.2.0"}}"#),
        ],
    );
    assert_eq!(detection::detect(dir), ProjectVariant::FullStack);
    Project::new("shop", dir, ProjectVariant::FullStack, port)
}

#[tokio::test]
async fn test_first_start_builds_then_runs() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = node_project(dir.path(), 4000);

    let handle = h.orchestrator.start(&mut project).await.unwrap();

    assert_eq!(handle, RunHandle::Container("container-1".to_string()));
    assert_eq!(project.status, RunStatus::Running);
    assert_eq!(project.run_handle, Some(handle));
    assert_eq!(h.engine.count("build"), 1);
    assert!(dir.path().join("Dockerfile").is_file());

    let spec = &h.engine.specs()[0];
    assert_eq!(spec.name, container_name(&project));
    assert_eq!(spec.image, image_tag(&project));
    assert_eq!(spec.host_port, 4000);
    assert_eq!(spec.container_port, 4000);
}

#[tokio::test]
async fn test_start_reuses_existing_image() {
    let dir = TempDir::new().unwrap();
    let mut project = node_project(dir.path(), 3000);
    let h = Harness::new(FakeEngine::new().with_image(&image_tag(&project)));

    h.orchestrator.start(&mut project).await.unwrap();

    assert_eq!(h.engine.count("image_exists"), 1);
    assert_eq!(h.engine.count("build"), 0);
    assert!(h.log_contents(&project).contains("Using existing image"));
}

#[tokio::test]
async fn test_static_site_maps_host_port_to_80() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = static_project(dir.path(), 8080);

    h.orchestrator.start(&mut project).await.unwrap();

    let spec = &h.engine.specs()[0];
    assert_eq!(spec.host_port, 8080);
    assert_eq!(spec.container_port, 80);
    assert_eq!(project.access_url(), "http://localhost:8080");
}

#[tokio::test]
async fn test_stale_container_is_removed_before_create() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = node_project(dir.path(), 3000);

    h.orchestrator.start(&mut project).await.unwrap();

    let calls = h.engine.calls();
    let remove = calls
        .iter()
        .position(|c| c == &format!("remove_container:{}", container_name(&project)))
        .unwrap();
    let create = calls.iter().position(|c| c.starts_with("create:")).unwrap();
    assert!(remove < create);
}

#[tokio::test]
async fn test_run_log_records_the_run() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = node_project(dir.path(), 4100);

    h.orchestrator.start(&mut project).await.unwrap();

    let log = h.log_contents(&project);
    assert!(log.contains("dockhand - Project Log"));
    assert!(log.contains("Project: api"));
    assert!(log.contains("Port: 4100"));
    assert!(log.contains("[BUILD] Step 1/2 : FROM scratch"));
    assert!(log.contains("[CONTAINER] Started container successfully"));
    assert!(log.contains("Access URL: http://localhost:4100"));
    assert!(log.contains("Log ended:"));
}

#[tokio::test]
async fn test_build_failure_sets_error_state() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new().failing_build("npm ERR! missing script: start"));
    let mut project = node_project(dir.path(), 3000);

    let err = h.orchestrator.start(&mut project).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::BuildFailed(ref m) if m.contains("missing script")));
    assert_eq!(project.status, RunStatus::Error);
    assert!(project.run_handle.is_none());
    assert_eq!(h.engine.count("create"), 0);
    assert!(h.log_contents(&project).contains("[ERROR] Failed to start project"));
}

#[tokio::test]
async fn test_build_timeout() {
    let dir = TempDir::new().unwrap();
    let mut h = Harness::new(FakeEngine::new().slow_build(Duration::from_secs(5)));
    h.orchestrator = h.orchestrator.with_build_timeout(Duration::from_millis(50));
    let mut project = node_project(dir.path(), 3000);

    let err = h.orchestrator.start(&mut project).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::BuildTimeout(_)));
    assert_eq!(project.status, RunStatus::Error);
}

#[tokio::test]
async fn test_failed_start_cleans_up_container() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new().failing_start());
    let mut project = node_project(dir.path(), 3000);

    assert!(h.orchestrator.start(&mut project).await.is_err());

    assert_eq!(project.status, RunStatus::Error);
    assert!(h
        .engine
        .calls()
        .contains(&"remove_container:container-1".to_string()));
}

#[tokio::test]
async fn test_start_without_engine_leaves_project_untouched() {
    let dir = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(None, Arc::new(FakeCompose::default()), logs.path());
    let mut project = node_project(dir.path(), 3000);
    let before = project.clone();

    let err = orchestrator.start(&mut project).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::EngineUnavailable));
    assert_eq!(project, before);
    assert!(!dir.path().join("Dockerfile").exists());
    assert!(latest_log_file(logs.path(), &project.name).is_none());
}

#[tokio::test]
async fn test_rebuild_always_builds() {
    let dir = TempDir::new().unwrap();
    let mut project = node_project(dir.path(), 3000);
    let tag = image_tag(&project);
    let h = Harness::new(FakeEngine::new().with_image(&tag));

    h.orchestrator.start(&mut project).await.unwrap();
    h.orchestrator.rebuild(&mut project).await.unwrap();

    let calls = h.engine.calls();
    assert!(calls.contains(&"stop:container-1".to_string()));
    let removed = calls
        .iter()
        .position(|c| c == &format!("remove_image:{}", tag))
        .unwrap();
    let built = calls
        .iter()
        .position(|c| c == &format!("build:{}", tag))
        .unwrap();
    assert!(removed < built);
    assert_eq!(project.status, RunStatus::Running);
    assert_eq!(
        project.run_handle,
        Some(RunHandle::Container("container-2".to_string()))
    );
}

#[tokio::test]
async fn test_stop_without_handle_is_noop() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = node_project(dir.path(), 3000);
    project.status = RunStatus::Error;

    h.orchestrator.stop(&mut project).await;

    assert!(h.engine.calls().is_empty());
    assert_eq!(project.status, RunStatus::Error);
}

#[tokio::test]
async fn test_stop_failure_still_marks_stopped() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new().failing_stop());
    let mut project = node_project(dir.path(), 3000);
    h.orchestrator.start(&mut project).await.unwrap();

    h.orchestrator.stop(&mut project).await;

    assert_eq!(project.status, RunStatus::Stopped);
    assert!(project.run_handle.is_none());
    assert_eq!(h.engine.count("stop"), 1);
}

#[tokio::test]
async fn test_stop_tolerates_vanished_container() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new().stop_not_found());
    let mut project = node_project(dir.path(), 3000);
    h.orchestrator.start(&mut project).await.unwrap();

    h.orchestrator.stop(&mut project).await;

    assert_eq!(project.status, RunStatus::Stopped);
}

#[tokio::test]
async fn test_full_stack_uses_compose_only() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = full_stack_project(dir.path(), 3000);

    let handle = h.orchestrator.start(&mut project).await.unwrap();

    assert_eq!(handle, RunHandle::Stack(project.id.clone()));
    assert_eq!(h.engine.count("image_exists"), 0);
    assert_eq!(h.engine.count("build"), 0);
    assert_eq!(h.compose.actions(), vec![ComposeAction::Up { build: false }]);
    assert_eq!(h.compose.files(), vec![dir.path().join("docker-compose.yml")]);
    assert!(dir.path().join("backend/Dockerfile").is_file());
    assert!(dir.path().join("frontend/Dockerfile").is_file());

    h.orchestrator.stop(&mut project).await;
    assert_eq!(h.compose.actions()[1], ComposeAction::Down);
    assert_eq!(project.status, RunStatus::Stopped);
}

#[tokio::test]
async fn test_full_stack_rebuild_forces_compose_build() {
    let dir = TempDir::new().unwrap();
    let h = Harness::new(FakeEngine::new());
    let mut project = full_stack_project(dir.path(), 3000);

    h.orchestrator.rebuild(&mut project).await.unwrap();

    assert_eq!(h.engine.count("remove_image"), 0);
    assert_eq!(h.compose.actions(), vec![ComposeAction::Up { build: true }]);
}

#[tokio::test]
async fn test_compose_failure_sets_error_state() {
    let dir = TempDir::new().unwrap();
    let h = Harness::with_compose(FakeEngine::new(), FakeCompose::new(1));
    let mut project = full_stack_project(dir.path(), 3000);

    let err = h.orchestrator.start(&mut project).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::ComposeFailed { code: 1 }));
    assert_eq!(project.status, RunStatus::Error);
    assert!(project.run_handle.is_none());
}

#[tokio::test]
async fn test_stop_all_only_touches_running_projects() {
    let h = Harness::new(FakeEngine::new());
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();

    let mut running = node_project(first.path(), 3000);
    h.orchestrator.start(&mut running).await.unwrap();
    let mut idle = static_project(second.path(), 8080);
    idle.run_handle = Some(RunHandle::Container("leftover".to_string()));
    idle.status = RunStatus::Error;

    let mut projects = vec![running, idle];
    h.orchestrator.stop_all(&mut projects).await;

    assert_eq!(projects[0].status, RunStatus::Stopped);
    assert_eq!(h.engine.count("stop"), 1);
    assert_eq!(projects[1].status, RunStatus::Error);
}

#[tokio::test]
async fn test_stop_all_continues_past_a_failed_stop() {
    let h = Harness::with_compose(FakeEngine::new(), FakeCompose::new(1));
    let shop_dir = TempDir::new().unwrap();
    let api_dir = TempDir::new().unwrap();
    let site_dir = TempDir::new().unwrap();

    let mut shop = full_stack_project(shop_dir.path(), 4000);
    shop.status = RunStatus::Running;
    shop.run_handle = Some(RunHandle::Stack(shop.id.clone()));

    let mut api = node_project(api_dir.path(), 3000);
    api.status = RunStatus::Running;
    api.run_handle = Some(RunHandle::Container("container-api".to_string()));

    let mut site = static_project(site_dir.path(), 8080);
    site.status = RunStatus::Running;
    site.run_handle = Some(RunHandle::Container("container-site".to_string()));

    let mut projects = vec![shop, api, site];
    h.orchestrator.stop_all(&mut projects).await;

    assert_eq!(h.compose.actions(), vec![ComposeAction::Down]);
    assert_eq!(h.engine.count("stop"), 2);
    for project in &projects {
        assert_eq!(project.status, RunStatus::Stopped, "{}", project.name);
        assert!(project.run_handle.is_none(), "{}", project.name);
    }
}

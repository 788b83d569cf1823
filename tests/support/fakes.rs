//! In-memory stand-ins for the container engine and the compose tool

#![allow(dead_code)]

use async_trait::async_trait;
use dockhand::engine::compose::{ComposeAction, ComposeRunner};
use dockhand::engine::{BuildRequest, ContainerEngine, ContainerSpec, EngineError, LineSink};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct EngineState {
    calls: Vec<String>,
    images: HashSet<String>,
    specs: Vec<ContainerSpec>,
    next_container: usize,
    build_error: Option<String>,
    build_delay: Option<Duration>,
    start_fails: bool,
    stop_fails: bool,
    stop_not_found: bool,
}

/// Records every call; images "exist" once built or seeded
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, tag: &str) -> Self {
        self.state.lock().unwrap().images.insert(tag.to_string());
        self
    }

    pub fn failing_build(self, message: &str) -> Self {
        self.state.lock().unwrap().build_error = Some(message.to_string());
        self
    }

    pub fn slow_build(self, delay: Duration) -> Self {
        self.state.lock().unwrap().build_delay = Some(delay);
        self
    }

    pub fn failing_start(self) -> Self {
        self.state.lock().unwrap().start_fails = true;
        self
    }

    pub fn failing_stop(self) -> Self {
        self.state.lock().unwrap().stop_fails = true;
        self
    }

    pub fn stop_not_found(self) -> Self {
        self.state.lock().unwrap().stop_not_found = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls whose name is `op`
    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().specs.clone()
    }

    pub fn has_image(&self, tag: &str) -> bool {
        self.state.lock().unwrap().images.contains(tag)
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.record("ping".to_string());
        Ok(())
    }

    async fn image_exists(&self, tag: &str) -> Result<bool, EngineError> {
        self.record(format!("image_exists:{}", tag));
        Ok(self.has_image(tag))
    }

    async fn build_image(
        &self,
        request: &BuildRequest,
        sink: LineSink<'_>,
    ) -> Result<String, EngineError> {
        self.record(format!("build:{}", request.tag));
        let delay = self.state.lock().unwrap().build_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        sink("Step 1/2 : FROM scratch");
        let error = self.state.lock().unwrap().build_error.clone();
        if let Some(message) = error {
            sink(&message);
            return Err(EngineError::Build(message));
        }
        sink("Step 2/2 : COPY . .");

        self.state
            .lock()
            .unwrap()
            .images
            .insert(request.tag.clone());
        Ok(format!("sha256:{}", request.tag.replace(':', "-")))
    }

    async fn remove_image(&self, tag: &str) -> Result<(), EngineError> {
        self.record(format!("remove_image:{}", tag));
        self.state.lock().unwrap().images.remove(tag);
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), EngineError> {
        self.record(format!("remove_container:{}", name));
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        self.record(format!("create:{}", spec.name));
        let mut state = self.state.lock().unwrap();
        state.specs.push(spec.clone());
        state.next_container += 1;
        Ok(format!("container-{}", state.next_container))
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(format!("start:{}", id));
        if self.state.lock().unwrap().start_fails {
            return Err(EngineError::api("start container", "port is already allocated"));
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str, _grace: Duration) -> Result<(), EngineError> {
        self.record(format!("stop:{}", id));
        let state = self.state.lock().unwrap();
        if state.stop_not_found {
            return Err(EngineError::NotFound(id.to_string()));
        }
        if state.stop_fails {
            return Err(EngineError::api("stop container", "daemon went away"));
        }
        Ok(())
    }
}

/// Compose tool double returning a fixed exit code
pub struct FakeCompose {
    exit_code: i32,
    calls: Mutex<Vec<(ComposeAction, PathBuf)>>,
}

impl FakeCompose {
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn actions(&self) -> Vec<ComposeAction> {
        self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, f)| f.clone())
            .collect()
    }
}

impl Default for FakeCompose {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl ComposeRunner for FakeCompose {
    async fn run(
        &self,
        _project_dir: &Path,
        compose_file: &Path,
        action: ComposeAction,
        sink: LineSink<'_>,
    ) -> Result<i32, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((action, compose_file.to_path_buf()));
        sink("Creating network app-network");
        Ok(self.exit_code)
    }
}

//! Project lifecycle: build-or-reuse, run, stop, rebuild
//!
//! State machine per project:
//!
//! ```text
//! Stopped -> Starting -> Running
//!            Starting -> Error -> Starting (retry)
//! any state -> Stopped (explicit stop)
//! ```
//!
//! The orchestrator does not serialize operations on one project. Callers
//! must not issue overlapping operations for the same project;
//! [`crate::supervisor::Supervisor`] enforces that for the CLI.

use crate::artifacts::{self, compose::COMPOSE_FILE, BuildFlavor, StackArtifacts, DOCKERFILE};
use crate::engine::compose::{ComposeAction, ComposeRunner};
use crate::engine::{BuildRequest, ContainerEngine, ContainerSpec, EngineError};
use crate::project::{Project, ProjectVariant, RunHandle, RunStatus};
use crate::runlog::RunLogger;
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Docker is not available")]
    EngineUnavailable,

    #[error("{0} projects cannot be started")]
    UnsupportedVariant(ProjectVariant),

    #[error("Failed to generate build files: {0}")]
    Artifacts(String),

    #[error("Image build failed: {0}")]
    BuildFailed(String),

    #[error("Image build timed out after {} seconds", .0.as_secs())]
    BuildTimeout(Duration),

    #[error("Compose exited with code {code}")]
    ComposeFailed { code: i32 },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl OrchestratorError {
    pub fn help_message(&self) -> String {
        match self {
            OrchestratorError::EngineUnavailable => "Error: Docker is not available\n\n\
                Help: Make sure the Docker daemon is running and reachable:\n\
                - docker info\n\
                - DOCKER_HOST (default: the local socket)"
                .to_string(),
            OrchestratorError::BuildTimeout(limit) => format!(
                "Error: Image build timed out after {} seconds\n\n\
                Help: Check the run log for the step that stalled, or raise\n\
                DOCKHAND_BUILD_TIMEOUT if the build is legitimately slow.",
                limit.as_secs()
            ),
            OrchestratorError::ComposeFailed { code } => format!(
                "Error: Compose exited with code {}\n\n\
                Help: The compose output is in the project's run log.\n\
                Set DOCKHAND_COMPOSE_COMMAND=\"docker compose\" if only the\n\
                compose plugin is installed.",
                code
            ),
            other => format!("Error: {}", other),
        }
    }
}

/// Image tag `<name>:<short id>`, name lowercased and restricted to `[a-z0-9-_.]`
pub fn image_tag(project: &Project) -> String {
    let name: String = project
        .name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect();
    format!("{}:{}", leading_alnum(&name), project.short_id())
}

/// Container name `<name>-<short id>`, restricted to `[a-zA-Z0-9-_.]`
pub fn container_name(project: &Project) -> String {
    let raw = format!("{}-{}", project.name, project.short_id());
    let name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    leading_alnum(&name).to_string()
}

/// Docker rejects names that start with a separator
fn leading_alnum(name: &str) -> &str {
    let trimmed = name.trim_start_matches(['-', '_', '.']);
    if trimmed.is_empty() {
        "project"
    } else {
        trimmed
    }
}

pub struct Orchestrator {
    engine: Option<Arc<dyn ContainerEngine>>,
    compose: Arc<dyn ComposeRunner>,
    logs_root: PathBuf,
    build_timeout: Duration,
    stop_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        engine: Option<Arc<dyn ContainerEngine>>,
        compose: Arc<dyn ComposeRunner>,
        logs_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            compose,
            logs_root: logs_root.into(),
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn engine_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn logs_root(&self) -> &Path {
        &self.logs_root
    }

    /// Starts a project, reusing its image when one exists
    ///
    /// Without an engine this fails with `EngineUnavailable` and leaves the
    /// project untouched. Every other failure leaves the project in `Error`
    /// with no run handle.
    pub async fn start(&self, project: &mut Project) -> Result<RunHandle, OrchestratorError> {
        self.start_with(project, false).await
    }

    /// Stops, deletes the image, then starts with a forced build
    pub async fn rebuild(&self, project: &mut Project) -> Result<RunHandle, OrchestratorError> {
        if self.engine.is_none() {
            return Err(OrchestratorError::EngineUnavailable);
        }

        info!("Rebuilding project: {}", project.name);
        if project.run_handle.is_some() {
            self.stop(project).await;
        }
        self.delete_image(project).await;
        self.start_with(project, true).await
    }

    async fn start_with(
        &self,
        project: &mut Project,
        force_build: bool,
    ) -> Result<RunHandle, OrchestratorError> {
        let Some(engine) = self.engine.clone() else {
            error!("Cannot start {}: Docker is not available", project.name);
            return Err(OrchestratorError::EngineUnavailable);
        };

        info!("Starting project: {}", project.name);
        project.status = RunStatus::Starting;
        project.run_handle = None;

        let logger = RunLogger::new(&self.logs_root, project);
        logger.info(format!("Starting project: {}", project.name));

        let result = if project.variant().is_multi_service() {
            self.start_stack(project, force_build, &logger).await
        } else {
            self.start_container(engine.as_ref(), project, force_build, &logger)
                .await
        };

        match &result {
            Ok(handle) => {
                project.status = RunStatus::Running;
                project.run_handle = Some(handle.clone());
                logger.info(format!("Container is running on port: {}", project.port));
                logger.info(format!("Access URL: {}", project.access_url()));
                info!(
                    "Project {} running at {} ({})",
                    project.name,
                    project.access_url(),
                    handle
                );
            }
            Err(e) => {
                project.status = RunStatus::Error;
                project.run_handle = None;
                logger.error(format!("Failed to start project: {}", e));
                error!("Failed to start project {}: {}", project.name, e);
            }
        }

        logger.close();
        result
    }

    async fn start_container(
        &self,
        engine: &dyn ContainerEngine,
        project: &Project,
        force_build: bool,
        logger: &RunLogger,
    ) -> Result<RunHandle, OrchestratorError> {
        let flavor = BuildFlavor::for_project(project.path(), project.variant())
            .ok_or(OrchestratorError::UnsupportedVariant(project.variant()))?;
        let tag = image_tag(project);

        let exists = !force_build && engine.image_exists(&tag).await?;
        if exists {
            info!("Using existing image: {}", tag);
            logger.info(format!("Using existing image: {}", tag));
        } else {
            info!("Image not found, building new image: {}", tag);
            logger.info(format!("Image not found, building new image: {}", tag));
            self.build_image(engine, project, &tag, logger).await?;
        }

        let name = container_name(project);
        if let Err(e) = engine.remove_container(&name).await {
            warn!("Failed to remove stale container {}: {}", name, e);
        }

        let spec = ContainerSpec::for_project(
            project,
            name,
            tag,
            flavor.container_port(project.port),
        );
        let id = engine.create_container(&spec).await?;
        info!("Created container: {}", id);
        logger.container(format!("Created container: {}", id));

        if let Err(e) = engine.start_container(&id).await {
            if let Err(cleanup) = engine.remove_container(&id).await {
                debug!("Failed to clean up container {}: {}", id, cleanup);
            }
            return Err(e.into());
        }

        logger.container("Started container successfully");
        Ok(RunHandle::Container(id))
    }

    async fn build_image(
        &self,
        engine: &dyn ContainerEngine,
        project: &Project,
        tag: &str,
        logger: &RunLogger,
    ) -> Result<String, OrchestratorError> {
        let dockerfile =
            artifacts::generate_dockerfile(project.path(), project.variant(), project.port)
                .ok_or(OrchestratorError::UnsupportedVariant(project.variant()))?;
        artifacts::write_dockerfile(project.path(), &dockerfile)
            .map_err(|e| OrchestratorError::Artifacts(format!("{:#}", e)))?;
        logger.info("Generated Dockerfile");

        let request = BuildRequest {
            context_dir: project.path().to_path_buf(),
            dockerfile: DOCKERFILE.to_string(),
            tag: tag.to_string(),
        };

        info!("Building Docker image: {}", tag);
        logger.info(format!("Building Docker image: {}", tag));

        let sink = |line: &str| {
            debug!("Build: {}", line);
            logger.build(line);
        };

        match tokio::time::timeout(self.build_timeout, engine.build_image(&request, &sink)).await
        {
            Err(_) => Err(OrchestratorError::BuildTimeout(self.build_timeout)),
            Ok(Err(EngineError::Build(message))) => Err(OrchestratorError::BuildFailed(message)),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(image_id)) => {
                logger.info(format!("Successfully built image: {}", image_id));
                Ok(image_id)
            }
        }
    }

    async fn start_stack(
        &self,
        project: &Project,
        force_build: bool,
        logger: &RunLogger,
    ) -> Result<RunHandle, OrchestratorError> {
        let artifacts = StackArtifacts::generate(project.path(), project.port)
            .map_err(|e| OrchestratorError::Artifacts(format!("{:#}", e)))?;
        let compose_file = artifacts
            .write(project.path())
            .map_err(|e| OrchestratorError::Artifacts(format!("{:#}", e)))?;
        logger.info(format!(
            "Generated {} with services in {}/ and {}/",
            COMPOSE_FILE, artifacts.layout.backend, artifacts.layout.frontend
        ));

        let sink = |line: &str| {
            info!("Docker Compose: {}", line);
            logger.container(line);
        };
        let code = self
            .compose
            .run(
                project.path(),
                &compose_file,
                ComposeAction::Up { build: force_build },
                &sink,
            )
            .await?;

        if code != 0 {
            return Err(OrchestratorError::ComposeFailed { code });
        }
        Ok(RunHandle::Stack(project.id.clone()))
    }

    /// Stops whatever the project's run handle points at
    ///
    /// No handle means nothing to do. Otherwise the project always ends up
    /// `Stopped` with no handle, even when the engine-side stop failed and the
    /// container may still be running; the failure is only logged.
    pub async fn stop(&self, project: &mut Project) {
        let Some(handle) = project.run_handle.clone() else {
            debug!("Project {} has no run handle, nothing to stop", project.name);
            return;
        };

        info!("Stopping project: {}", project.name);
        let outcome = match &handle {
            RunHandle::Stack(_) => self.stop_stack(project).await,
            RunHandle::Container(id) => self.stop_container(id).await,
        };

        match outcome {
            Ok(()) => info!("Stopped project: {}", project.name),
            Err(e) => warn!(
                "Failed to stop project {} ({}): {}; marking it stopped anyway",
                project.name, handle, e
            ),
        }

        project.status = RunStatus::Stopped;
        project.run_handle = None;
    }

    async fn stop_container(&self, id: &str) -> Result<(), OrchestratorError> {
        let engine = self
            .engine
            .as_ref()
            .ok_or(OrchestratorError::EngineUnavailable)?;
        match engine.stop_container(id, self.stop_timeout).await {
            // Auto-removed containers disappear once they exit
            Err(e) if e.is_not_found() => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    async fn stop_stack(&self, project: &Project) -> Result<(), OrchestratorError> {
        let compose_file = project.path().join(COMPOSE_FILE);
        let sink = |line: &str| debug!("Docker Compose: {}", line);
        let code = self
            .compose
            .run(project.path(), &compose_file, ComposeAction::Down, &sink)
            .await?;
        if code != 0 {
            return Err(OrchestratorError::ComposeFailed { code });
        }
        Ok(())
    }

    /// Best-effort removal of the project's image; absence is not an error
    pub async fn delete_image(&self, project: &Project) {
        let Some(engine) = &self.engine else {
            return;
        };
        if project.variant().is_multi_service() {
            debug!("{} is a compose stack, no single image to delete", project.name);
            return;
        }

        let tag = image_tag(project);
        match engine.remove_image(&tag).await {
            Ok(()) => info!("Deleted image: {}", tag),
            Err(e) => warn!("Failed to delete image {}: {}", tag, e),
        }
    }

    /// Stops every `Running` project concurrently
    pub async fn stop_all(&self, projects: &mut [Project]) {
        let running = projects
            .iter_mut()
            .filter(|p| p.status == RunStatus::Running)
            .map(|p| self.stop(p));
        let stopped = join_all(running).await.len();
        if stopped > 0 {
            info!("Stopped {} running project(s)", stopped);
        }
    }
}

//! Control surface over the managed projects
//!
//! The supervisor owns the project list. Long operations run on tokio tasks
//! against an owned copy of the project; when a task finishes it sends a
//! [`ProjectUpdate`] back, and [`Supervisor::next_update`] applies it. At most
//! one operation per project is in flight at any time.

use crate::artifacts::compose;
use crate::detection;
use crate::orchestrator::Orchestrator;
use crate::ports::{PortAllocator, PortError};
use crate::project::{Project, ProjectVariant, ResourceOptions, RunHandle, RunStatus};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Project path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Unable to detect project type for: {0}")]
    UnknownProjectType(PathBuf),

    #[error("{path} is already registered as '{name}'")]
    AlreadyRegistered { path: PathBuf, name: String },

    #[error(transparent)]
    Port(#[from] PortError),
}

impl RegistrationError {
    pub fn help_message(&self) -> String {
        match self {
            RegistrationError::UnknownProjectType(path) => format!(
                "Error: Unable to detect project type\nPath: {}\n\n\
                Help: Supported projects are:\n\
                - static sites (index.html)\n\
                - Node services (package.json with a start script or server entry)\n\
                - React/Vite/Next apps\n\
                - full-stack repos with backend/ and frontend/ directories",
                path.display()
            ),
            RegistrationError::Port(e) => e.help_message(),
            other => format!("Error: {}", other),
        }
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("No project matches '{0}'")]
    NotFound(String),

    #[error("Project '{0}' already has an operation in progress")]
    Busy(String),

    #[error("Project '{0}' must be stopped first")]
    NotIdle(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Rebuild,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Rebuild => "rebuild",
        })
    }
}

/// Result of one background operation
#[derive(Debug, Clone)]
pub struct ProjectUpdate {
    pub project_id: String,
    pub operation: Operation,
    pub status: RunStatus,
    pub run_handle: Option<RunHandle>,
    pub error: Option<String>,
}

pub struct Supervisor {
    orchestrator: Arc<Orchestrator>,
    ports: Arc<PortAllocator>,
    projects: BTreeMap<String, Project>,
    in_flight: HashSet<String>,
    updates_tx: mpsc::UnboundedSender<ProjectUpdate>,
    updates_rx: mpsc::UnboundedReceiver<ProjectUpdate>,
    default_resources: ResourceOptions,
}

impl Supervisor {
    pub fn new(orchestrator: Arc<Orchestrator>, ports: Arc<PortAllocator>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            ports,
            projects: BTreeMap::new(),
            in_flight: HashSet::new(),
            updates_tx,
            updates_rx,
            default_resources: ResourceOptions::default(),
        }
    }

    /// Resource limits given to newly registered projects
    pub fn with_default_resources(mut self, resources: ResourceOptions) -> Self {
        self.default_resources = resources;
        self
    }

    /// Adopts persisted projects, resetting run state and replaying port claims
    pub fn load(&mut self, projects: impl IntoIterator<Item = Project>) {
        for mut project in projects {
            project.reset_runtime();
            if project.port != 0 && !self.ports.reserve(project.port) {
                warn!(
                    "Port {} of project {} is already in use",
                    project.port, project.name
                );
            }
            self.projects.insert(project.id.clone(), project);
        }
        debug!("Loaded {} project(s)", self.projects.len());
    }

    /// Detects and registers the directory at `path`
    ///
    /// The port is the inferred default when free, else the next free one.
    pub fn register(
        &mut self,
        path: &Path,
        name: Option<String>,
    ) -> Result<&mut Project, RegistrationError> {
        if !path.is_dir() {
            return Err(RegistrationError::NotADirectory(path.to_path_buf()));
        }
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if let Some(existing) = self.projects.values().find(|p| p.path() == path) {
            return Err(RegistrationError::AlreadyRegistered {
                path,
                name: existing.name.clone(),
            });
        }

        let variant = detection::detect(&path);
        if variant == ProjectVariant::Unknown {
            return Err(RegistrationError::UnknownProjectType(path));
        }

        let preferred = detection::default_port(&path, variant);
        let port = self.ports.find_available(preferred)?;
        if variant.is_multi_service() && compose::frontend_port(port).is_none() {
            self.ports.release(port);
            return Err(PortError::NoFrontendPort(port).into());
        }
        let name = name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "project".to_string())
        });

        let project =
            Project::new(name, path, variant, port).with_resources(self.default_resources.clone());
        info!(
            "Registered {} project {} on port {}",
            project.variant(),
            project.name,
            project.port
        );

        let id = project.id.clone();
        Ok(self.projects.entry(id).or_insert(project))
    }

    /// Projects sorted by name
    pub fn projects(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        projects
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Looks a project up by id, unique id prefix, or exact name
    pub fn find(&self, key: &str) -> Result<&Project, SupervisorError> {
        if let Some(project) = self.projects.get(key) {
            return Ok(project);
        }

        let mut by_prefix = self.projects.values().filter(|p| p.id.starts_with(key));
        if let (Some(project), None) = (by_prefix.next(), by_prefix.next()) {
            return Ok(project);
        }

        self.projects
            .values()
            .find(|p| p.name == key)
            .ok_or_else(|| SupervisorError::NotFound(key.to_string()))
    }

    /// Mutable access for settings edits; refused while an operation runs
    pub fn project_mut(&mut self, id: &str) -> Result<&mut Project, SupervisorError> {
        if self.in_flight.contains(id) {
            return Err(SupervisorError::Busy(id.to_string()));
        }
        self.projects
            .get_mut(id)
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Moves a stopped project to another host port
    pub fn set_port(&mut self, id: &str, port: u16) -> Result<(), SupervisorError> {
        let project = self.project_mut(id)?;
        if !project.status.is_idle() {
            return Err(SupervisorError::NotIdle(project.name.clone()));
        }
        if project.variant().is_multi_service() && compose::frontend_port(port).is_none() {
            return Err(PortError::NoFrontendPort(port).into());
        }

        let old = project.port;
        if !self.ports.update_assignment(old, port) {
            return Err(PortError::Unavailable(port).into());
        }

        // Re-borrow: `self.ports` was used above
        if let Some(project) = self.projects.get_mut(id) {
            project.port = port;
            info!("Project {} moved from port {} to {}", project.name, old, port);
        }
        Ok(())
    }

    /// Removes a project from management, stopping it first if needed
    ///
    /// Files in the project directory are left alone.
    pub async fn remove(&mut self, id: &str) -> Result<Project, SupervisorError> {
        if self.in_flight.contains(id) {
            return Err(SupervisorError::Busy(id.to_string()));
        }
        let mut project = self
            .projects
            .remove(id)
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?;

        if project.status == RunStatus::Running {
            self.orchestrator.stop(&mut project).await;
        }
        self.ports.release(project.port);
        info!("Removed project {}", project.name);
        Ok(project)
    }

    /// Runs `operation` for the project on a background task
    ///
    /// Start and rebuild mark the project `Starting` right away so the control
    /// surface shows progress before the task reports back.
    pub fn dispatch(&mut self, id: &str, operation: Operation) -> Result<(), SupervisorError> {
        if self.in_flight.contains(id) {
            return Err(SupervisorError::Busy(id.to_string()));
        }
        let project = self
            .projects
            .get_mut(id)
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?;

        let mut working = project.clone();
        if matches!(operation, Operation::Start | Operation::Rebuild)
            && self.orchestrator.engine_available()
        {
            project.status = RunStatus::Starting;
        }
        self.in_flight.insert(id.to_string());
        debug!("Dispatching {} for {}", operation, working.name);

        let orchestrator = Arc::clone(&self.orchestrator);
        let tx = self.updates_tx.clone();
        tokio::spawn(async move {
            let result = match operation {
                Operation::Start => orchestrator.start(&mut working).await.map(|_| ()),
                Operation::Rebuild => orchestrator.rebuild(&mut working).await.map(|_| ()),
                Operation::Stop => {
                    orchestrator.stop(&mut working).await;
                    Ok(())
                }
            };

            let update = ProjectUpdate {
                project_id: working.id.clone(),
                operation,
                status: working.status,
                run_handle: working.run_handle.clone(),
                error: result.err().map(|e| e.to_string()),
            };
            if tx.send(update).is_err() {
                debug!("Supervisor dropped before {} finished", operation);
            }
        });

        Ok(())
    }

    /// Waits for the next finished operation and applies it
    pub async fn next_update(&mut self) -> Option<ProjectUpdate> {
        if self.in_flight.is_empty() {
            return None;
        }
        let update = self.updates_rx.recv().await?;
        self.apply(&update);
        Some(update)
    }

    fn apply(&mut self, update: &ProjectUpdate) {
        self.in_flight.remove(&update.project_id);
        match self.projects.get_mut(&update.project_id) {
            Some(project) => {
                project.status = update.status;
                project.run_handle = update.run_handle.clone();
            }
            None => debug!("Update for removed project {}", update.project_id),
        }
    }

    /// Applies updates until no operation is in flight
    pub async fn wait_idle(&mut self) -> Vec<ProjectUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update);
        }
        updates
    }

    /// Lets in-flight work finish, then stops every running project
    pub async fn shutdown(&mut self) {
        self.wait_idle().await;

        let mut running: Vec<Project> = self
            .projects
            .values()
            .filter(|p| p.status == RunStatus::Running)
            .cloned()
            .collect();
        self.orchestrator.stop_all(&mut running).await;

        for project in running {
            self.projects.insert(project.id.clone(), project);
        }
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

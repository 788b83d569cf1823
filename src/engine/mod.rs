//! Container engine seam
//!
//! The orchestrator talks to images and containers only through
//! [`ContainerEngine`], so it can run against the local Docker daemon
//! ([`docker::DockerEngine`]) or an in-memory double in tests. Multi-service
//! stacks go through [`compose::ComposeRunner`] instead, which drives the
//! external compose tool.

pub mod compose;
pub mod docker;

use crate::project::Project;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Container engine unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error("Image build failed: {0}")]
    Build(String),

    #[error("Failed to prepare build context {path}: {source}")]
    Context {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn api(operation: &'static str, err: impl ToString) -> Self {
        EngineError::Api {
            operation,
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Receives build output one line at a time
pub type LineSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// What to build and how to tag it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub context_dir: PathBuf,
    /// Dockerfile path relative to `context_dir`
    pub dockerfile: String,
    pub tag: String,
}

/// Everything needed to create one project container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    /// `KEY=VALUE` pairs
    pub env: Vec<String>,
    /// `host:container` bind mounts
    pub binds: Vec<String>,
    pub memory_bytes: i64,
    pub nano_cpus: i64,
    pub auto_remove: bool,
}

impl ContainerSpec {
    /// Translates a project's settings into engine terms
    pub fn for_project(
        project: &Project,
        name: String,
        image: String,
        container_port: u16,
    ) -> Self {
        Self {
            name,
            image,
            host_port: project.port,
            container_port,
            env: project
                .env
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect(),
            binds: project.resources.binds(),
            memory_bytes: project.resources.memory_bytes(),
            nano_cpus: project.resources.nano_cpus(),
            auto_remove: true,
        }
    }

    /// Port key in the engine's `<port>/tcp` form
    pub fn port_key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether the engine answers at all
    async fn ping(&self) -> Result<(), EngineError>;

    async fn image_exists(&self, tag: &str) -> Result<bool, EngineError>;

    /// Builds and tags an image, streaming output lines into `sink`
    ///
    /// Returns the built image id.
    async fn build_image(
        &self,
        request: &BuildRequest,
        sink: LineSink<'_>,
    ) -> Result<String, EngineError>;

    /// Removes an image by tag; an absent image is not an error
    async fn remove_image(&self, tag: &str) -> Result<(), EngineError>;

    /// Force-removes a container by name or id; an absent container is not an error
    async fn remove_container(&self, name: &str) -> Result<(), EngineError>;

    /// Returns the new container id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Graceful stop; the engine kills the container after `grace`
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError>;
}

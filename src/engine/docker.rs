//! Docker daemon backend built on bollard

use super::{BuildRequest, ContainerEngine, ContainerSpec, EngineError, LineSink};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directories never shipped to the daemon as build context
const CONTEXT_EXCLUDES: &[&str] = &["node_modules", ".git"];

pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects with the local defaults (`DOCKER_HOST` or the local socket) and pings
    pub async fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let engine = Self { docker };
        engine.ping().await?;

        match engine.docker.version().await {
            Ok(v) => debug!(
                "Connected to Docker {} (API {})",
                v.version.unwrap_or_default(),
                v.api_version.unwrap_or_default()
            ),
            Err(e) => debug!("Failed to get Docker version: {}", e),
        }

        Ok(engine)
    }

    /// Connects if possible; `None` means the orchestrator runs without an engine
    pub async fn try_connect() -> Option<Arc<dyn ContainerEngine>> {
        match Self::connect().await {
            Ok(engine) => Some(Arc::new(engine)),
            Err(e) => {
                warn!("Docker is not available: {}", e);
                None
            }
        }
    }
}

fn classify(operation: &'static str, err: BollardError) -> EngineError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(message),
        other => EngineError::api(operation, other),
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    async fn image_exists(&self, tag: &str) -> Result<bool, EngineError> {
        match self.docker.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(e) => match classify("Inspect image", e) {
                EngineError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn build_image(
        &self,
        request: &BuildRequest,
        sink: LineSink<'_>,
    ) -> Result<String, EngineError> {
        let context_dir = request.context_dir.clone();
        let archive = tokio::task::spawn_blocking(move || pack_context(&context_dir))
            .await
            .map_err(|e| EngineError::Build(format!("Build context task failed: {}", e)))??;
        debug!(
            "Build context for {} is {} bytes",
            request.tag,
            archive.len()
        );

        let options = BuildImageOptions {
            dockerfile: request.dockerfile.clone(),
            t: request.tag.clone(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(archive)));
        let mut image_id = None;

        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| EngineError::Build(e.to_string()))?;

            if let Some(error) = info.error {
                return Err(EngineError::Build(error.trim().to_string()));
            }
            if let Some(text) = info.stream.as_deref() {
                text.lines()
                    .map(str::trim_end)
                    .filter(|line| !line.is_empty())
                    .for_each(sink);
            }
            if let Some(id) = info.aux.and_then(|aux| aux.id) {
                image_id = Some(id);
            }
        }

        let id = image_id.unwrap_or_else(|| request.tag.clone());
        info!("Built image {} ({})", request.tag, id);
        Ok(id)
    }

    async fn remove_image(&self, tag: &str) -> Result<(), EngineError> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_image(tag, Some(options), None).await {
            Ok(_) => Ok(()),
            Err(e) => match classify("Remove image", e) {
                EngineError::NotFound(_) => {
                    debug!("Image {} not present, nothing to remove", tag);
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    async fn remove_container(&self, name: &str) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) => match classify("Remove container", e) {
                EngineError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let host_config = HostConfig {
            port_bindings: Some(HashMap::from([(
                spec.port_key(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(spec.host_port.to_string()),
                }]),
            )])),
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            memory: Some(spec.memory_bytes),
            nano_cpus: Some(spec.nano_cpus),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(HashMap::from([(spec.port_key(), HashMap::new())])),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| classify("Create container", e))?;

        for warning in &response.warnings {
            warn!("Docker: {}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| classify("Start container", e))
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(|e| classify("Stop container", e))
    }
}

/// Tars a project directory as a build context
///
/// Honors `.gitignore` and `.dockerignore`; dependency and VCS directories
/// are always left out.
pub fn pack_context(root: &Path) -> Result<Vec<u8>, EngineError> {
    let context_err = |source: std::io::Error| EngineError::Context {
        path: root.to_path_buf(),
        source,
    };

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .add_custom_ignore_filename(".dockerignore")
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map_or(true, |name| !CONTEXT_EXCLUDES.contains(&name))
        })
        .build();

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    for entry in walker {
        let entry = entry
            .map_err(|e| context_err(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let path = entry.path();
        if path == root {
            continue;
        }

        let relative: PathBuf = match path.strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        if is_dir {
            builder
                .append_dir(&relative, path)
                .map_err(context_err)?;
        } else {
            builder
                .append_path_with_name(path, &relative)
                .map_err(context_err)?;
        }
    }

    builder.into_inner().map_err(context_err)
}

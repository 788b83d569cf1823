//! Build artifact generation
//!
//! Everything here is a pure function of the project directory contents, the
//! variant, and the requested port. Writing the results into the project tree
//! is kept separate so the text can be previewed without side effects.

pub mod compose;
pub mod dockerfile;
pub mod node;

use crate::project::ProjectVariant;
use anyhow::{Context, Result};
use compose::{ComposeFile, ServiceLayout, COMPOSE_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DOCKERFILE: &str = "Dockerfile";

/// Which single-service template a variant resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildFlavor {
    StaticSite,
    NodeService,
    /// Next-like app needing a server runtime
    ServerRendered,
    /// SPA compiled to static files
    StaticBuild,
}

impl BuildFlavor {
    /// `None` for variants without a single-service build (FullStack, Unknown)
    pub fn for_project(dir: &Path, variant: ProjectVariant) -> Option<Self> {
        match variant {
            ProjectVariant::Static => Some(BuildFlavor::StaticSite),
            ProjectVariant::Node => Some(BuildFlavor::NodeService),
            ProjectVariant::FrontendFramework if node::is_next_like(dir) => {
                Some(BuildFlavor::ServerRendered)
            }
            ProjectVariant::FrontendFramework => Some(BuildFlavor::StaticBuild),
            ProjectVariant::FullStack | ProjectVariant::Unknown => None,
        }
    }

    /// Port the generated image listens on inside the container
    pub fn container_port(&self, requested: u16) -> u16 {
        match self {
            BuildFlavor::StaticSite | BuildFlavor::StaticBuild => 80,
            BuildFlavor::ServerRendered => 3000,
            BuildFlavor::NodeService => requested,
        }
    }
}

/// Generates the single-service Dockerfile for a project
///
/// Returns `None` for FullStack (see [`StackArtifacts`]) and Unknown.
pub fn generate_dockerfile(dir: &Path, variant: ProjectVariant, port: u16) -> Option<String> {
    let flavor = BuildFlavor::for_project(dir, variant)?;
    Some(match flavor {
        BuildFlavor::StaticSite => dockerfile::static_site(dir),
        BuildFlavor::NodeService => dockerfile::node_service(dir, port),
        BuildFlavor::ServerRendered => dockerfile::server_rendered(dir),
        BuildFlavor::StaticBuild => dockerfile::static_build(dir),
    })
}

/// Compose descriptor plus one Dockerfile per service
#[derive(Debug, Clone)]
pub struct StackArtifacts {
    pub layout: ServiceLayout,
    pub compose: String,
    pub backend_dockerfile: String,
    pub frontend_dockerfile: String,
}

impl StackArtifacts {
    /// Fails when `port` is the last port, leaving none for the frontend
    pub fn generate(root: &Path, port: u16) -> Result<Self> {
        let frontend_port = compose::frontend_port(port)
            .with_context(|| format!("Port {} leaves no port for the frontend service", port))?;
        let layout = ServiceLayout::resolve(root);
        let compose = ComposeFile::full_stack(&layout, port)?.to_yaml()?;
        let backend_dockerfile = dockerfile::node_service(&root.join(&layout.backend), port);
        let frontend_dockerfile =
            dockerfile::frontend_service(&root.join(&layout.frontend), frontend_port);

        Ok(Self {
            layout,
            compose,
            backend_dockerfile,
            frontend_dockerfile,
        })
    }

    /// Writes all three files and returns the compose file path
    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        write_dockerfile(&root.join(&self.layout.backend), &self.backend_dockerfile)?;
        write_dockerfile(&root.join(&self.layout.frontend), &self.frontend_dockerfile)?;

        let compose_path = root.join(COMPOSE_FILE);
        write_file(&compose_path, &self.compose)?;
        info!("Generated {} at: {}", COMPOSE_FILE, compose_path.display());
        Ok(compose_path)
    }
}

/// Writes `<dir>/Dockerfile`, creating `dir` if needed
pub fn write_dockerfile(dir: &Path, content: &str) -> Result<PathBuf> {
    let path = dir.join(DOCKERFILE);
    write_file(&path, content)?;
    info!("Generated Dockerfile at: {}", path.display());
    Ok(path)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_full_stack_has_no_single_dockerfile() {
        let dir = TempDir::new().unwrap();
        assert!(generate_dockerfile(dir.path(), ProjectVariant::FullStack, 3000).is_none());
        assert!(generate_dockerfile(dir.path(), ProjectVariant::Unknown, 3000).is_none());
    }

    #[test]
    fn test_container_ports() {
        assert_eq!(BuildFlavor::StaticSite.container_port(8080), 80);
        assert_eq!(BuildFlavor::StaticBuild.container_port(8080), 80);
        assert_eq!(BuildFlavor::ServerRendered.container_port(8080), 3000);
        assert_eq!(BuildFlavor::NodeService.container_port(8080), 8080);
    }

    #[test]
    fn test_stack_write_creates_missing_service_dirs() {
        let dir = TempDir::new().unwrap();
        let artifacts = StackArtifacts::generate(dir.path(), 4000).unwrap();
        let compose_path = artifacts.write(dir.path()).unwrap();

        assert!(compose_path.is_file());
        assert!(dir.path().join("backend/Dockerfile").is_file());
        assert!(dir.path().join("frontend/Dockerfile").is_file());
        assert!(artifacts.frontend_dockerfile.contains("EXPOSE 4001"));
        assert!(artifacts.backend_dockerfile.contains("EXPOSE 4000"));
    }

    #[test]
    fn test_stack_refuses_last_port() {
        let dir = TempDir::new().unwrap();
        let err = StackArtifacts::generate(dir.path(), u16::MAX).unwrap_err();
        assert!(format!("{:#}", err).contains("frontend"));
        assert!(!dir.path().join(COMPOSE_FILE).exists());
    }
}

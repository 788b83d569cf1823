//! Compose descriptor for full-stack projects
//!
//! The descriptor is a typed structure rendered with `serde_yaml`, so the
//! output is always well-formed YAML regardless of directory names.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const NETWORK_NAME: &str = "app-network";

/// Host port of the frontend service when the backend uses `port`
///
/// `None` at the top of the port range, where the two services would collide.
pub fn frontend_port(port: u16) -> Option<u16> {
    port.checked_add(1)
}

const BACKEND_CANDIDATES: &[&str] = &["backend", "server", "api"];
const FRONTEND_CANDIDATES: &[&str] = &["frontend", "client", "web"];

/// Subdirectories holding the two services of a full-stack project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLayout {
    pub backend: String,
    pub frontend: String,
}

impl ServiceLayout {
    /// Prefers `backend`/`frontend`, then `server`/`client`, then `api`/`web`
    ///
    /// Falls back to `backend`/`frontend` even when neither exists; the
    /// caller creates the directories before building.
    pub fn resolve(root: &Path) -> Self {
        Self {
            backend: first_existing(root, BACKEND_CANDIDATES),
            frontend: first_existing(root, FRONTEND_CANDIDATES),
        }
    }
}

fn first_existing(root: &Path, candidates: &[&str]) -> String {
    candidates
        .iter()
        .find(|name| root.join(name).is_dir())
        .unwrap_or(&candidates[0])
        .to_string()
}

#[derive(Debug, Serialize)]
pub struct ComposeFile {
    pub version: String,
    pub services: BTreeMap<String, Service>,
    pub networks: BTreeMap<String, Network>,
}

#[derive(Debug, Serialize)]
pub struct Service {
    pub build: BuildSpec,
    pub ports: Vec<String>,
    pub environment: Vec<String>,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: String,
}

#[derive(Debug, Serialize)]
pub struct Network {
    pub driver: String,
}

impl ComposeFile {
    /// Backend on `port`, frontend on `port + 1`
    pub fn full_stack(layout: &ServiceLayout, port: u16) -> Result<Self> {
        let backend_port = port;
        let frontend_port = frontend_port(port)
            .with_context(|| format!("Port {} leaves no port for the frontend service", port))?;
        let api_url = format!("http://localhost:{}", backend_port);

        let backend = Service {
            build: BuildSpec {
                context: format!("./{}", layout.backend),
                dockerfile: "Dockerfile".to_string(),
            },
            ports: vec![format!("{}:{}", backend_port, backend_port)],
            environment: vec![
                "NODE_ENV=development".to_string(),
                format!("PORT={}", backend_port),
            ],
            volumes: vec![format!("./{}:/app", layout.backend), "/app/node_modules".to_string()],
            networks: vec![NETWORK_NAME.to_string()],
            depends_on: vec![],
        };

        let frontend = Service {
            build: BuildSpec {
                context: format!("./{}", layout.frontend),
                dockerfile: "Dockerfile".to_string(),
            },
            ports: vec![format!("{}:{}", frontend_port, frontend_port)],
            environment: vec![
                format!("PORT={}", frontend_port),
                format!("API_URL={}", api_url),
                format!("REACT_APP_API_URL={}", api_url),
                format!("VITE_API_URL={}", api_url),
            ],
            volumes: vec![format!("./{}:/app", layout.frontend), "/app/node_modules".to_string()],
            networks: vec![NETWORK_NAME.to_string()],
            depends_on: vec!["backend".to_string()],
        };

        Ok(Self {
            version: "3.8".to_string(),
            services: BTreeMap::from([
                ("backend".to_string(), backend),
                ("frontend".to_string(), frontend),
            ]),
            networks: BTreeMap::from([(
                NETWORK_NAME.to_string(),
                Network {
                    driver: "bridge".to_string(),
                },
            )]),
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to render compose descriptor")
    }
}

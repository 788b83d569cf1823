//! Project records and the small enums that describe them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_MEMORY_MB: u64 = 512;
const DEFAULT_CPUS: f64 = 1.0;

/// Detected archetype of a project directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectVariant {
    /// Plain markup and assets served as-is
    Static,
    /// Server-side JavaScript service
    Node,
    /// Component-based single page app (React and friends, including Next-like apps)
    FrontendFramework,
    /// Separate backend and frontend services
    FullStack,
    Unknown,
}

impl ProjectVariant {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectVariant::Static => "Static",
            ProjectVariant::Node => "Node",
            ProjectVariant::FrontendFramework => "Frontend framework",
            ProjectVariant::FullStack => "Full-stack",
            ProjectVariant::Unknown => "Unknown",
        }
    }

    /// Port the variant listens on when nothing more specific is known
    pub fn default_port(&self) -> u16 {
        match self {
            ProjectVariant::Static => 80,
            ProjectVariant::Node
            | ProjectVariant::FrontendFramework
            | ProjectVariant::FullStack => 3000,
            ProjectVariant::Unknown => 8080,
        }
    }

    pub fn is_multi_service(&self) -> bool {
        matches!(self, ProjectVariant::FullStack)
    }
}

impl fmt::Display for ProjectVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Error,
}

impl RunStatus {
    /// States in which delete or rebuild may proceed without forcing a stop
    pub fn is_idle(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Stopped => "Stopped",
            RunStatus::Starting => "Starting",
            RunStatus::Running => "Running",
            RunStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Reference to whatever is running on behalf of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RunHandle {
    /// A single container, by engine id
    Container(String),
    /// A compose stack, keyed by project id
    Stack(String),
}

impl RunHandle {
    pub fn is_stack(&self) -> bool {
        matches!(self, RunHandle::Stack(_))
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunHandle::Container(id) => f.write_str(id),
            RunHandle::Stack(project_id) => write!(f, "compose-{}", project_id),
        }
    }
}

/// Container resource limits and mounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    pub memory_mb: u64,
    pub cpus: f64,
    /// Host path -> container path
    pub volumes: BTreeMap<String, String>,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            memory_mb: DEFAULT_MEMORY_MB,
            cpus: DEFAULT_CPUS,
            volumes: BTreeMap::new(),
        }
    }
}

impl ResourceOptions {
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb as i64).saturating_mul(1024 * 1024)
    }

    /// CPU limit in the engine's nano-CPU units (1 core = 1e9)
    pub fn nano_cpus(&self) -> i64 {
        (self.cpus * 1_000_000_000.0).round() as i64
    }

    /// Bind strings in `host:container` form
    pub fn binds(&self) -> Vec<String> {
        self.volumes
            .iter()
            .map(|(host, container)| format!("{}:{}", host, container))
            .collect()
    }
}

/// A managed project
///
/// `path` and `variant` are fixed at creation. Everything else may change over
/// the project's life; `status` and `run_handle` are transient and are reset
/// whenever records are loaded from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    path: PathBuf,
    variant: ProjectVariant,
    pub port: u16,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: ResourceOptions,
    #[serde(default, skip_serializing)]
    pub run_handle: Option<RunHandle>,
    #[serde(default, skip_serializing)]
    pub status: RunStatus,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        variant: ProjectVariant,
        port: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            path: path.into(),
            variant,
            port,
            env: BTreeMap::new(),
            resources: ResourceOptions::default(),
            run_handle: None,
            status: RunStatus::Stopped,
        }
    }

    pub fn with_resources(mut self, resources: ResourceOptions) -> Self {
        self.resources = resources;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variant(&self) -> ProjectVariant {
        self.variant
    }

    /// First eight characters of the id, used in image tags and container names
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    pub fn access_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Drop transient run state after loading from storage
    pub fn reset_runtime(&mut self) {
        self.status = RunStatus::Stopped;
        self.run_handle = None;
    }
}

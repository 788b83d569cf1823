//! Persisted project list
//!
//! Projects live in a single JSON object keyed by project id. Run state is
//! never written, so a loaded project always starts out `Stopped`.

use crate::project::Project;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const PROJECTS_FILE: &str = "projects.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a valid project list: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<home>/projects.json`
    pub fn in_dir(home: &Path) -> Self {
        Self::new(home.join(PROJECTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all valid projects; a missing file is an empty list
    ///
    /// Entries that fail to deserialize, or have an empty id or path, are
    /// skipped with a warning.
    pub fn load(&self) -> Result<Vec<Project>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No project list at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let entries: Map<String, Value> =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut projects = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value::<Project>(value) {
                Ok(project) if project.id.is_empty() || project.path().as_os_str().is_empty() => {
                    warn!("Skipping project entry {} with empty id or path", key);
                }
                Ok(mut project) => {
                    project.reset_runtime();
                    projects.push(project);
                }
                Err(e) => warn!("Skipping invalid project entry {}: {}", key, e),
            }
        }

        debug!("Loaded {} project(s) from {}", projects.len(), self.path.display());
        Ok(projects)
    }

    /// Replaces the stored list with `projects`
    pub fn save<'a>(&self, projects: impl IntoIterator<Item = &'a Project>) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let by_id: BTreeMap<&str, &Project> =
            projects.into_iter().map(|p| (p.id.as_str(), p)).collect();
        let json = serde_json::to_string_pretty(&by_id)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::Other, e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write then rename so a crash never leaves a truncated list
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!("Saved {} project(s) to {}", by_id.len(), self.path.display());
        Ok(())
    }
}

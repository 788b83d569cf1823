//! `package.json` introspection shared by detection and artifact generation

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

pub const MANIFEST_FILE: &str = "package.json";

/// The parts of `package.json` we care about
///
/// Script and dependency maps keep declaration order, which matters for the
/// port scan in [`crate::detection::default_port`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub main: Option<String>,
    #[serde(rename = "type")]
    pub module_type: Option<String>,
    pub scripts: Map<String, Value>,
    pub dependencies: Map<String, Value>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: Map<String, Value>,
    pub workspaces: Option<Value>,
    pub engines: Map<String, Value>,
    pub config: Map<String, Value>,
}

impl PackageManifest {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse package.json")
    }

    /// Reads `<dir>/package.json`; `None` when absent or malformed
    pub fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return None;
        }

        match std::fs::read_to_string(&path)
            .context("Failed to read package.json")
            .and_then(|content| Self::parse(&content))
        {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                debug!("Ignoring manifest at {}: {:#}", path.display(), e);
                None
            }
        }
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).and_then(Value::as_str)
    }

    /// Script bodies in declaration order, skipping non-string values
    pub fn script_bodies(&self) -> impl Iterator<Item = &str> {
        self.scripts.values().filter_map(Value::as_str)
    }

    /// Whether `name` appears in `dependencies` or `devDependencies`
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    pub fn dependency_version(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.dev_dependencies.get(name))
            .and_then(Value::as_str)
    }

    pub fn is_workspace_root(&self) -> bool {
        self.workspaces.is_some()
    }

    /// `config.port`, as a number or a numeric string
    pub fn config_port(&self) -> Option<u16> {
        match self.config.get("port")? {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Major version pinned in `engines.node`, e.g. `">=18.0.0"` -> 18
    pub fn pinned_node_major(&self) -> Option<u32> {
        self.engines
            .get("node")
            .and_then(Value::as_str)
            .and_then(first_integer)
    }
}

/// First run of digits in a version requirement such as `^14.2.0` or `>=20`
pub fn first_integer(text: &str) -> Option<u32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid digit pattern"));
    re.find(text).and_then(|m| m.as_str().parse().ok())
}

//! Ordered detection rules
//!
//! Each rule is a predicate over a [`Probe`] paired with the variant it implies.
//! [`RULES`] is evaluated top to bottom and the first match wins, so the table
//! order is the classification policy.

use super::manifest::{PackageManifest, MANIFEST_FILE};
use crate::project::ProjectVariant;
use std::path::{Path, PathBuf};

const BACKEND_DIRS: &[&str] = &["backend", "server"];
const FRONTEND_DIRS: &[&str] = &["frontend", "client"];
const SERVER_SCRIPTS: &[&str] = &["server", "start:server", "backend", "start:backend"];
const CLIENT_SCRIPTS: &[&str] = &["client", "start:client", "frontend", "start:frontend"];

const FRAMEWORK_DEPENDENCIES: &[&str] = &["react", "react-dom", "next"];
const FRAMEWORK_CONFIG_FILES: &[&str] = &[
    "vite.config.js",
    "vite.config.ts",
    "vite.config.mjs",
    "next.config.js",
    "next.config.mjs",
    "next.config.ts",
    ".next",
];

const NODE_SCRIPTS: &[&str] = &["start", "dev", "serve", "server"];
const SERVER_FRAMEWORKS: &[&str] = &["express", "fastify", "koa", "nestjs", "@nestjs/core", "@hapi/hapi"];
const NODE_ENTRY_FILES: &[&str] = &["server.js", "app.js", "index.js"];

/// Read-only view of a candidate directory
///
/// The manifest is parsed once up front. `manifest_present` stays true for a
/// malformed `package.json` so that presence-only rules still apply while
/// content rules are skipped.
#[derive(Debug)]
pub struct Probe {
    pub root: PathBuf,
    pub manifest_present: bool,
    pub manifest: Option<PackageManifest>,
}

impl Probe {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            manifest_present: root.join(MANIFEST_FILE).is_file(),
            manifest: PackageManifest::load(root),
        }
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    pub fn has_dir(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    fn html_file_count(&self) -> usize {
        std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().is_file())
                    .filter(|e| {
                        e.file_name()
                            .to_string_lossy()
                            .to_lowercase()
                            .ends_with(".html")
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

pub struct Rule {
    pub name: &'static str,
    pub variant: ProjectVariant,
    pub matches: fn(&Probe) -> bool,
}

pub const RULES: &[Rule] = &[
    Rule {
        name: "full-stack",
        variant: ProjectVariant::FullStack,
        matches: is_full_stack,
    },
    Rule {
        name: "frontend-framework",
        variant: ProjectVariant::FrontendFramework,
        matches: is_frontend_framework,
    },
    Rule {
        name: "node",
        variant: ProjectVariant::Node,
        matches: is_node,
    },
    Rule {
        name: "static",
        variant: ProjectVariant::Static,
        matches: is_static,
    },
];

/// First matching rule, if any
pub fn classify(probe: &Probe) -> Option<&'static Rule> {
    RULES.iter().find(|rule| (rule.matches)(probe))
}

pub fn is_full_stack(probe: &Probe) -> bool {
    let has_backend = BACKEND_DIRS.iter().any(|d| probe.has_dir(d));
    let has_frontend = FRONTEND_DIRS.iter().any(|d| probe.has_dir(d));
    if has_backend && has_frontend {
        return true;
    }

    let Some(manifest) = &probe.manifest else {
        return false;
    };

    if manifest.is_workspace_root() {
        return true;
    }

    let has_server_role = SERVER_SCRIPTS.iter().any(|s| manifest.has_script(s));
    let has_client_role = CLIENT_SCRIPTS.iter().any(|s| manifest.has_script(s));
    has_server_role && has_client_role
}

pub fn is_frontend_framework(probe: &Probe) -> bool {
    if !probe.manifest_present {
        return false;
    }

    // A src/App.{jsx,tsx,js} root file only counts once the manifest confirms
    // the dependency, so the dependency check alone decides that case.
    let has_dependency = probe
        .manifest
        .as_ref()
        .is_some_and(|m| FRAMEWORK_DEPENDENCIES.iter().any(|d| m.has_dependency(d)));

    if has_dependency {
        return true;
    }

    FRAMEWORK_CONFIG_FILES.iter().any(|f| probe.exists(f))
}

pub fn is_node(probe: &Probe) -> bool {
    if !probe.manifest_present {
        return false;
    }

    if let Some(manifest) = &probe.manifest {
        if NODE_SCRIPTS.iter().any(|s| manifest.has_script(s)) {
            return true;
        }
        if manifest.module_type.is_some() || manifest.main.is_some() {
            return true;
        }
        if SERVER_FRAMEWORKS.iter().any(|d| manifest.dependencies.contains_key(*d)) {
            return true;
        }
    }

    NODE_ENTRY_FILES.iter().any(|f| probe.has_file(f))
}

pub fn is_static(probe: &Probe) -> bool {
    if !probe.has_file("index.html") {
        return false;
    }

    if !probe.manifest_present {
        return true;
    }

    probe.html_file_count() >= 2
}

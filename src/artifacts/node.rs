//! Node runtime facts derived from a project's manifest

use crate::detection::manifest::{first_integer, PackageManifest};
use std::path::Path;

/// Runtime tier used when nothing pins a version
pub const LTS_NODE_VERSION: &str = "20";
/// Minimum tier for Next-like apps from major 14 on
pub const NEXT_MIN_NODE_VERSION: &str = "20";
const NEXT_MODERN_MAJOR: u32 = 14;

const NEXT_CONFIG_FILES: &[&str] = &["next.config.js", "next.config.mjs", "next.config.ts"];
const ENTRY_FILES: &[&str] = &["index.js", "server.js", "app.js"];

/// Command the container runs, as exec-form arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCommand(pub Vec<String>);

impl StartCommand {
    fn new(args: &[&str]) -> Self {
        Self(args.iter().map(|s| s.to_string()).collect())
    }

    /// Renders the `CMD` JSON array body
    pub fn exec_form(&self) -> String {
        let quoted: Vec<String> = self.0.iter().map(|a| format!("{:?}", a)).collect();
        format!("[{}]", quoted.join(", "))
    }
}

/// Resolves the `node:<version>` tag for a project
///
/// A pinned `engines.node` wins; otherwise a Next-like dependency of major 14
/// or later needs the newer baseline; otherwise the LTS default applies.
pub fn resolve_node_version(dir: &Path) -> String {
    let Some(manifest) = PackageManifest::load(dir) else {
        return LTS_NODE_VERSION.to_string();
    };

    if let Some(major) = manifest.pinned_node_major() {
        return major.to_string();
    }

    let next_major = manifest
        .dependency_version("next")
        .and_then(first_integer);
    if next_major.is_some_and(|major| major >= NEXT_MODERN_MAJOR) {
        return NEXT_MIN_NODE_VERSION.to_string();
    }

    LTS_NODE_VERSION.to_string()
}

/// Whether the project is a Next-like app that needs a server runtime
pub fn is_next_like(dir: &Path) -> bool {
    if NEXT_CONFIG_FILES.iter().any(|f| dir.join(f).is_file()) {
        return true;
    }

    PackageManifest::load(dir).is_some_and(|m| m.has_dependency("next"))
}

/// Picks the start command by priority: `start`, `dev`, `serve` scripts, the
/// manifest `main` entry, a conventional entry file, then `npm start`
pub fn start_command(dir: &Path) -> StartCommand {
    if let Some(manifest) = PackageManifest::load(dir) {
        if manifest.has_script("start") {
            return StartCommand::new(&["npm", "start"]);
        }
        for script in ["dev", "serve"] {
            if manifest.has_script(script) {
                return StartCommand::new(&["npm", "run", script]);
            }
        }
        if let Some(main) = manifest.main.as_deref() {
            return StartCommand::new(&["node", main]);
        }
    }

    if let Some(entry) = ENTRY_FILES.iter().find(|f| dir.join(f).is_file()) {
        return StartCommand::new(&["node", entry]);
    }

    StartCommand::new(&["npm", "start"])
}

/// The command that produces a static build
///
/// Projects without a `build` script still get `npm run build`, so a missing
/// script fails loudly in the build log instead of producing an empty site.
pub const BUILD_COMMAND: &str = "npm run build";

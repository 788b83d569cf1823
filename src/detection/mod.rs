//! Project type detection
//!
//! Classifies a directory into a [`ProjectVariant`] with the ordered rules in
//! [`rules`], and infers the port the project expects to listen on. Both
//! operations only read the filesystem and never fail: a malformed manifest
//! just disables the heuristics that need its contents.

pub mod manifest;
pub mod rules;

use crate::project::ProjectVariant;
use manifest::PackageManifest;
use regex::Regex;
use rules::Probe;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Detects the project variant of `path`
///
/// Returns [`ProjectVariant::Unknown`] for anything that is not a directory or
/// matches no rule. Callers registering projects must reject that outcome.
pub fn detect(path: &Path) -> ProjectVariant {
    if !path.is_dir() {
        warn!("Invalid project path: {}", path.display());
        return ProjectVariant::Unknown;
    }

    let probe = Probe::new(path);
    match rules::classify(&probe) {
        Some(rule) => {
            info!(
                "Detected {} project at {} (rule: {})",
                rule.variant,
                path.display(),
                rule.name
            );
            rule.variant
        }
        None => {
            warn!("Unable to detect project type for: {}", path.display());
            ProjectVariant::Unknown
        }
    }
}

/// Infers the port a project listens on
///
/// Static sites are always served on 80. Otherwise the first `PORT=<n>` or
/// `--port <n>` token in the manifest scripts wins, then `config.port`, then
/// the variant default.
pub fn default_port(path: &Path, variant: ProjectVariant) -> u16 {
    if variant == ProjectVariant::Static {
        return 80;
    }

    if let Some(manifest) = PackageManifest::load(path) {
        if let Some(port) = manifest.script_bodies().find_map(port_from_script) {
            debug!("Port {} found in package.json scripts", port);
            return port;
        }
        if let Some(port) = manifest.config_port() {
            debug!("Port {} found in package.json config", port);
            return port;
        }
    }

    variant.default_port()
}

/// Extracts an explicit port from a script body
///
/// `PORT=<n>` is tried before `--port <n>`; a token that does not parse as a
/// port falls through to the next form. Every `--port <n>` occurrence is
/// considered, so `--port=1` earlier in the script does not hide a later one.
pub fn port_from_script(script: &str) -> Option<u16> {
    let from_env = script
        .split_once("PORT=")
        .and_then(|(_, rest)| first_token(rest))
        .and_then(|token| token.parse::<u16>().ok());

    if from_env.is_some() {
        return from_env;
    }

    port_flag_pattern()?
        .captures_iter(script)
        .find_map(|caps| caps[1].parse::<u16>().ok())
}

fn port_flag_pattern() -> Option<&'static Regex> {
    static PORT_FLAG: OnceLock<Option<Regex>> = OnceLock::new();
    PORT_FLAG
        .get_or_init(|| Regex::new(r"--port\s+(\d+)(?:\s|$)").ok())
        .as_ref()
}

fn first_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

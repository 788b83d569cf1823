//! Output formatting for the CLI
//!
//! Every command that prints structured data supports a human-readable table
//! and pretty-printed JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::artifacts::{compose::COMPOSE_FILE, BuildFlavor, DOCKERFILE};
use crate::config::DockhandConfig;
use crate::project::{Project, ProjectVariant};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Human,
}

/// What `detect` found for one directory
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub path: PathBuf,
    pub variant: ProjectVariant,
    pub default_port: u16,
    /// Files `generate --write` would create, relative to `path`
    pub artifacts: Vec<String>,
}

impl DetectionReport {
    pub fn new(path: PathBuf, variant: ProjectVariant, default_port: u16) -> Self {
        let artifacts = match variant {
            ProjectVariant::FullStack => {
                let layout = crate::artifacts::compose::ServiceLayout::resolve(&path);
                vec![
                    COMPOSE_FILE.to_string(),
                    format!("{}/{}", layout.backend, DOCKERFILE),
                    format!("{}/{}", layout.frontend, DOCKERFILE),
                ]
            }
            ProjectVariant::Unknown => vec![],
            _ => vec![DOCKERFILE.to_string()],
        };
        Self {
            path,
            variant,
            default_port,
            artifacts,
        }
    }
}

/// Project record plus its transient run state, for listing
#[derive(Debug, Serialize)]
struct ProjectRow<'a> {
    id: &'a str,
    name: &'a str,
    path: &'a std::path::Path,
    variant: ProjectVariant,
    port: u16,
    status: String,
    run_handle: Option<String>,
    url: String,
}

impl<'a> From<&'a Project> for ProjectRow<'a> {
    fn from(project: &'a Project) -> Self {
        Self {
            id: &project.id,
            name: &project.name,
            path: project.path(),
            variant: project.variant(),
            port: project.port,
            status: project.status.to_string(),
            run_handle: project.run_handle.as_ref().map(|h| h.to_string()),
            url: project.access_url(),
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_detection(&self, report: &DetectionReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize detection result to JSON"),
            OutputFormat::Human => Ok(self.format_detection_human(report)),
        }
    }

    pub fn format_projects(&self, projects: &[&Project]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<ProjectRow> = projects.iter().map(|p| ProjectRow::from(*p)).collect();
                serde_json::to_string_pretty(&rows).context("Failed to serialize projects to JSON")
            }
            OutputFormat::Human => Ok(self.format_projects_human(projects)),
        }
    }

    pub fn format_config(&self, config: &DockhandConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config.to_display_map())
                .context("Failed to serialize config to JSON"),
            OutputFormat::Human => Ok(format!("{}", config)),
        }
    }

    fn format_detection_human(&self, report: &DetectionReport) -> String {
        let mut output = String::new();

        if report.variant == ProjectVariant::Unknown {
            output.push_str("\u{26A0} Project type not recognized\n");
        } else {
            output.push_str("\u{2713} Project Detection Result\n");
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Path:          {}\n", report.path.display()));
        output.push_str(&format!("Type:          {}\n", report.variant));
        output.push_str(&format!("Default Port:  {}\n", report.default_port));

        if let Some(flavor) = BuildFlavor::for_project(&report.path, report.variant) {
            output.push_str(&format!(
                "Container Port: {}\n",
                flavor.container_port(report.default_port)
            ));
        }

        if !report.artifacts.is_empty() {
            output.push_str("\nGenerated Files:\n");
            for (i, artifact) in report.artifacts.iter().enumerate() {
                let connector = if i == report.artifacts.len() - 1 {
                    "\u{2514}"
                } else {
                    "\u{251C}"
                };
                output.push_str(&format!("{}\u{2500} {}\n", connector, artifact));
            }
        }

        output
    }

    fn format_projects_human(&self, projects: &[&Project]) -> String {
        if projects.is_empty() {
            return "No projects registered. Add one with: dockhand add <PATH>\n".to_string();
        }

        let name_width = projects
            .iter()
            .map(|p| p.name.chars().count())
            .max()
            .unwrap_or(0)
            .max("NAME".len());

        let mut output = format!(
            "{:<8}  {:<name_width$}  {:<18}  {:>5}  {:<8}  {}\n",
            "ID", "NAME", "TYPE", "PORT", "STATUS", "PATH"
        );
        for project in projects {
            output.push_str(&format!(
                "{:<8}  {:<name_width$}  {:<18}  {:>5}  {:<8}  {}\n",
                project.short_id(),
                project.name,
                project.variant().to_string(),
                project.port,
                project.status.to_string(),
                project.path().display()
            ));
        }
        output
    }
}

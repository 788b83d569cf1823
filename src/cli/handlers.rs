//! Command handlers
//!
//! Each handler returns the process exit code. Failures are logged through
//! `tracing` and, for the typed library errors, explained with their
//! `help_message` on stderr.

use super::commands::{
    AddArgs, DetectArgs, EditArgs, GenerateArgs, ListArgs, LogsArgs, ProjectArg, RunArgs,
    SetPortArgs,
};
use super::output::{DetectionReport, OutputFormat, OutputFormatter};
use crate::artifacts::{self, StackArtifacts};
use crate::config::DockhandConfig;
use crate::detection;
use crate::engine::compose::ProcessCompose;
use crate::engine::docker::DockerEngine;
use crate::engine::ContainerEngine;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::ports::{PortAllocator, PortError};
use crate::project::{ProjectVariant, RunStatus};
use crate::runlog;
use crate::store::ProjectStore;
use crate::supervisor::{Operation, ProjectUpdate, RegistrationError, Supervisor};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            if let Some(help) = help_for(&e) {
                eprintln!("\n{}", help);
            }
            1
        }
    }
}

fn help_for(err: &anyhow::Error) -> Option<String> {
    if let Some(e) = err.downcast_ref::<RegistrationError>() {
        return Some(e.help_message());
    }
    if let Some(e) = err.downcast_ref::<OrchestratorError>() {
        return Some(e.help_message());
    }
    err.downcast_ref::<PortError>().map(PortError::help_message)
}

fn resolve_dir(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    if !path.is_dir() {
        bail!("Project path is not a directory: {}", path.display());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to canonicalize {}", path.display()))
}

/// Supervisor over the persisted projects, with the given engine
fn open_supervisor(
    config: &DockhandConfig,
    engine: Option<Arc<dyn ContainerEngine>>,
) -> Result<(ProjectStore, Supervisor)> {
    let store = ProjectStore::new(config.projects_file());
    let projects = store.load()?;

    let orchestrator = Orchestrator::new(
        engine,
        Arc::new(ProcessCompose::new(&config.compose_command)),
        config.logs_root(),
    )
    .with_build_timeout(config.build_timeout())
    .with_stop_timeout(config.stop_timeout());

    let mut supervisor = Supervisor::new(Arc::new(orchestrator), Arc::new(PortAllocator::new()))
        .with_default_resources(config.default_resources());
    supervisor.load(projects);
    Ok((store, supervisor))
}

fn validate_cpus(cpus: f64) -> Result<f64> {
    if !(cpus > 0.0 && cpus.is_finite()) {
        bail!("CPU limit must be positive, got {}", cpus);
    }
    Ok(cpus)
}

fn save(store: &ProjectStore, supervisor: &Supervisor) -> Result<()> {
    store.save(supervisor.projects())?;
    Ok(())
}

pub fn handle_detect(args: &DetectArgs) -> i32 {
    exit_code(run_detect(args))
}

fn run_detect(args: &DetectArgs) -> Result<()> {
    let path = resolve_dir(args.path.as_deref())?;
    debug!("Detecting project at {}", path.display());

    let variant = detection::detect(&path);
    let port = detection::default_port(&path, variant);
    let report = DetectionReport::new(path, variant, port);

    let format: OutputFormat = args.format.into();
    print!("{}", OutputFormatter::new(format).format_detection(&report)?);
    if format == OutputFormat::Json {
        println!();
    }

    if variant == ProjectVariant::Unknown {
        return Err(RegistrationError::UnknownProjectType(report.path).into());
    }
    Ok(())
}

pub fn handle_generate(args: &GenerateArgs) -> i32 {
    exit_code(run_generate(args))
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let path = resolve_dir(args.path.as_deref())?;
    let variant = detection::detect(&path);
    if variant == ProjectVariant::Unknown {
        return Err(RegistrationError::UnknownProjectType(path).into());
    }
    let port = args
        .port
        .unwrap_or_else(|| detection::default_port(&path, variant));

    if variant.is_multi_service() {
        let stack = StackArtifacts::generate(&path, port)?;
        if args.write {
            let compose_file = stack.write(&path)?;
            println!("Wrote {}", compose_file.display());
        } else {
            println!("# {}\n{}", artifacts::compose::COMPOSE_FILE, stack.compose);
            println!(
                "# {}/{}\n{}",
                stack.layout.backend,
                artifacts::DOCKERFILE,
                stack.backend_dockerfile
            );
            print!(
                "# {}/{}\n{}",
                stack.layout.frontend,
                artifacts::DOCKERFILE,
                stack.frontend_dockerfile
            );
        }
        return Ok(());
    }

    let dockerfile = artifacts::generate_dockerfile(&path, variant, port)
        .ok_or_else(|| anyhow!("No Dockerfile template for {} projects", variant))?;
    if args.write {
        let written = artifacts::write_dockerfile(&path, &dockerfile)?;
        println!("Wrote {}", written.display());
    } else {
        print!("{}", dockerfile);
    }
    Ok(())
}

pub fn handle_add(args: &AddArgs, config: &DockhandConfig) -> i32 {
    exit_code(run_add(args, config))
}

fn run_add(args: &AddArgs, config: &DockhandConfig) -> Result<()> {
    let (store, mut supervisor) = open_supervisor(config, None)?;

    let id = supervisor.register(&args.path, args.name.clone())?.id.clone();
    if let Some(port) = args.port {
        supervisor.set_port(&id, port)?;
    }

    let project = supervisor.project_mut(&id)?;
    project.env.extend(args.env.iter().cloned());
    project.resources.volumes.extend(args.volumes.iter().cloned());
    if let Some(memory) = args.memory {
        project.resources.memory_mb = memory;
    }
    if let Some(cpus) = args.cpus {
        project.resources.cpus = validate_cpus(cpus)?;
    }

    println!(
        "Registered {} ({}) on port {}: {}",
        project.name,
        project.variant(),
        project.port,
        project.access_url()
    );
    save(&store, &supervisor)
}

pub fn handle_list(args: &ListArgs, config: &DockhandConfig) -> i32 {
    exit_code(run_list(args, config))
}

fn run_list(args: &ListArgs, config: &DockhandConfig) -> Result<()> {
    let (_, supervisor) = open_supervisor(config, None)?;
    let formatter = OutputFormatter::new(args.format.into());
    print!("{}", formatter.format_projects(&supervisor.projects())?);
    if args.format == super::commands::OutputFormatArg::Json {
        println!();
    }
    Ok(())
}

pub async fn handle_remove(args: &ProjectArg, config: &DockhandConfig) -> i32 {
    exit_code(run_remove(args, config).await)
}

async fn run_remove(args: &ProjectArg, config: &DockhandConfig) -> Result<()> {
    let (store, mut supervisor) = open_supervisor(config, None)?;
    let id = supervisor.find(&args.project)?.id.clone();
    let removed = supervisor.remove(&id).await?;
    save(&store, &supervisor)?;
    println!(
        "Removed {} (files in {} were left untouched)",
        removed.name,
        removed.path().display()
    );
    Ok(())
}

pub fn handle_set_port(args: &SetPortArgs, config: &DockhandConfig) -> i32 {
    exit_code(run_set_port(args, config))
}

fn run_set_port(args: &SetPortArgs, config: &DockhandConfig) -> Result<()> {
    let (store, mut supervisor) = open_supervisor(config, None)?;
    let id = supervisor.find(&args.project)?.id.clone();

    // The project's own port was re-reserved on load; asking for it again is a no-op
    supervisor.set_port(&id, args.port)?;
    save(&store, &supervisor)?;

    if let Some(project) = supervisor.get(&id) {
        println!("{} now uses port {}", project.name, project.port);
    }
    Ok(())
}

pub fn handle_edit(args: &EditArgs, config: &DockhandConfig) -> i32 {
    exit_code(run_edit(args, config))
}

fn run_edit(args: &EditArgs, config: &DockhandConfig) -> Result<()> {
    let (store, mut supervisor) = open_supervisor(config, None)?;
    let id = supervisor.find(&args.project)?.id.clone();

    let cpus = args.cpus.map(validate_cpus).transpose()?;
    let name = match &args.name {
        Some(name) if name.trim().is_empty() => bail!("Project name must not be empty"),
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    let project = supervisor.project_mut(&id)?;
    if let Some(name) = name {
        project.name = name;
    }
    for key in &args.unset_env {
        if project.env.remove(key).is_none() {
            debug!("{} has no environment variable {}", project.name, key);
        }
    }
    project.env.extend(args.env.iter().cloned());
    if let Some(memory) = args.memory {
        project.resources.memory_mb = memory;
    }
    if let Some(cpus) = cpus {
        project.resources.cpus = cpus;
    }
    for host in &args.remove_volume {
        if project.resources.volumes.remove(host).is_none() {
            debug!("{} has no mount for {}", project.name, host);
        }
    }
    project
        .resources
        .volumes
        .extend(args.volumes.iter().cloned());

    println!(
        "Updated {}: {} env var(s), {} MB, {} CPU(s), {} mount(s)",
        project.name,
        project.env.len(),
        project.resources.memory_mb,
        project.resources.cpus,
        project.resources.volumes.len()
    );
    info!("Edited settings of {}", project.name);
    save(&store, &supervisor)
}

pub fn handle_logs(args: &LogsArgs, config: &DockhandConfig) -> i32 {
    exit_code(run_logs(args, config))
}

fn run_logs(args: &LogsArgs, config: &DockhandConfig) -> Result<()> {
    let (_, supervisor) = open_supervisor(config, None)?;
    let project = supervisor.find(&args.project)?;

    let Some(path) = runlog::latest_log_file(&config.logs_root(), &project.name) else {
        bail!(
            "No logs found for {} yet; logs are created when the project runs",
            project.name
        );
    };

    if args.path_only {
        println!("{}", path.display());
    } else {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        print!("{}", content);
    }
    Ok(())
}

pub fn handle_config(config: &DockhandConfig) -> i32 {
    exit_code(
        OutputFormatter::new(OutputFormat::Human)
            .format_config(config)
            .map(|text| print!("{}", text)),
    )
}

pub async fn handle_run(args: &RunArgs, config: &DockhandConfig) -> i32 {
    exit_code(run_run(args, config).await)
}

fn report(update: &ProjectUpdate, supervisor: &Supervisor) {
    let Some(project) = supervisor.get(&update.project_id) else {
        return;
    };
    match (&update.error, update.status) {
        (Some(err), _) => println!("\u{2717} {}: {} failed: {}", project.name, update.operation, err),
        (None, RunStatus::Running) => {
            println!("\u{2713} {} running at {}", project.name, project.access_url())
        }
        (None, status) => println!("  {}: {}", project.name, status),
    }
}

async fn run_run(args: &RunArgs, config: &DockhandConfig) -> Result<()> {
    let engine = DockerEngine::try_connect()
        .await
        .ok_or(OrchestratorError::EngineUnavailable)?;
    let (_, mut supervisor) = open_supervisor(config, Some(engine))?;

    let ids: Vec<String> = if args.projects.is_empty() {
        supervisor.projects().iter().map(|p| p.id.clone()).collect()
    } else {
        args.projects
            .iter()
            .map(|key| supervisor.find(key).map(|p| p.id.clone()))
            .collect::<Result<_, _>>()?
    };
    if ids.is_empty() {
        bail!("No projects registered. Add one with: dockhand add <PATH>");
    }

    let operation = if args.rebuild {
        Operation::Rebuild
    } else {
        Operation::Start
    };
    for id in &ids {
        supervisor.dispatch(id, operation)?;
    }
    info!("Starting {} project(s)", ids.len());

    let mut failures = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if supervisor.in_flight() == 0 {
            let running = supervisor
                .projects()
                .iter()
                .any(|p| p.status == RunStatus::Running);
            if !running {
                break;
            }
            println!("Press Ctrl-C to stop all projects");
            if let Err(e) = (&mut ctrl_c).await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            break;
        }

        let update = tokio::select! {
            update = supervisor.next_update() => update,
            _ = &mut ctrl_c => break,
        };
        if let Some(update) = update {
            if update.error.is_some() {
                failures += 1;
            }
            report(&update, &supervisor);
        }
    }

    println!("Stopping all projects...");
    supervisor.shutdown().await;

    if failures > 0 {
        bail!("{} of {} project(s) failed to start", failures, ids.len());
    }
    Ok(())
}

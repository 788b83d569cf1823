use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Detects, containerizes, and runs local web projects
#[derive(Parser, Debug)]
#[command(
    name = "dockhand",
    about = "Detect, containerize, and run local web projects with Docker",
    version,
    author,
    long_about = "dockhand recognizes static sites, Node services, frontend framework apps and \
                  full-stack repositories, generates a Dockerfile or compose file for them, and \
                  runs them as containers with a managed host port and a log file per run."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Detect the project type and default port of a directory",
        long_about = "Examples:\n  \
                      dockhand detect\n  \
                      dockhand detect ./my-site --format json"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Print or write the generated Dockerfile / compose file",
        long_about = "Examples:\n  \
                      dockhand generate ./api\n  \
                      dockhand generate ./shop --port 4000 --write"
    )]
    Generate(GenerateArgs),

    #[command(about = "Register a project directory")]
    Add(AddArgs),

    #[command(about = "List registered projects")]
    List(ListArgs),

    #[command(about = "Stop managing a project (files are kept)")]
    Remove(ProjectArg),

    #[command(about = "Change the host port of a project")]
    SetPort(SetPortArgs),

    #[command(
        about = "Edit the name, environment, resources, or mounts of a project",
        long_about = "Examples:\n  \
                      dockhand edit api --name backend\n  \
                      dockhand edit api -e DEBUG=1 --unset-env NODE_ENV --memory 1024\n  \
                      dockhand edit api --volume /srv/data:/app/data --remove-volume /srv/old"
    )]
    Edit(EditArgs),

    #[command(
        about = "Start projects and keep them running until Ctrl-C",
        long_about = "Starts the given projects (all registered projects when none are named) \
                      concurrently, reports their status, and stops them all on Ctrl-C.\n\n\
                      Examples:\n  \
                      dockhand run\n  \
                      dockhand run shop api --rebuild"
    )]
    Run(RunArgs),

    #[command(about = "Show the latest run log of a project")]
    Logs(LogsArgs),

    #[command(about = "Print the effective configuration")]
    Config,
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(
        value_name = "PATH",
        help = "Project directory (defaults to current directory)"
    )]
    pub path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(
        value_name = "PATH",
        help = "Project directory (defaults to current directory)"
    )]
    pub path: Option<PathBuf>,

    #[arg(short, long, help = "Port to generate for (defaults to the detected port)")]
    pub port: Option<u16>,

    #[arg(short, long, help = "Write the files into the project instead of printing")]
    pub write: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct AddArgs {
    #[arg(value_name = "PATH", help = "Project directory")]
    pub path: PathBuf,

    #[arg(short, long, help = "Display name (defaults to the directory name)")]
    pub name: Option<String>,

    #[arg(short, long, help = "Preferred host port (defaults to the detected port)")]
    pub port: Option<u16>,

    #[arg(
        short = 'e',
        long = "env",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Environment variable for the container (repeatable)"
    )]
    pub env: Vec<(String, String)>,

    #[arg(long, value_name = "MB", help = "Memory limit in MB")]
    pub memory: Option<u64>,

    #[arg(long, value_name = "CORES", help = "CPU limit in cores")]
    pub cpus: Option<f64>,

    #[arg(
        long = "volume",
        value_name = "HOST:CONTAINER",
        value_parser = parse_volume,
        help = "Bind mount (repeatable)"
    )]
    pub volumes: Vec<(String, String)>,
}

#[derive(Parser, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "PROJECT", help = "Project name, id, or id prefix")]
    pub project: String,

    #[arg(short, long, help = "New display name")]
    pub name: Option<String>,

    #[arg(
        short = 'e',
        long = "env",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Set an environment variable (repeatable)"
    )]
    pub env: Vec<(String, String)>,

    #[arg(long, value_name = "KEY", help = "Remove an environment variable (repeatable)")]
    pub unset_env: Vec<String>,

    #[arg(long, value_name = "MB", help = "Memory limit in MB")]
    pub memory: Option<u64>,

    #[arg(long, value_name = "CORES", help = "CPU limit in cores")]
    pub cpus: Option<f64>,

    #[arg(
        long = "volume",
        value_name = "HOST:CONTAINER",
        value_parser = parse_volume,
        help = "Add or replace a bind mount (repeatable)"
    )]
    pub volumes: Vec<(String, String)>,

    #[arg(long, value_name = "HOST", help = "Remove the bind mount of a host path (repeatable)")]
    pub remove_volume: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ProjectArg {
    #[arg(value_name = "PROJECT", help = "Project name, id, or id prefix")]
    pub project: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SetPortArgs {
    #[arg(value_name = "PROJECT", help = "Project name, id, or id prefix")]
    pub project: String,

    #[arg(value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_name = "PROJECT", help = "Projects to start (defaults to all)")]
    pub projects: Vec<String>,

    #[arg(long, help = "Delete and rebuild images before starting")]
    pub rebuild: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct LogsArgs {
    #[arg(value_name = "PROJECT", help = "Project name, id, or id prefix")]
    pub project: String,

    #[arg(long, help = "Only print the log file path")]
    pub path_only: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Expected KEY=VALUE, got '{}'", s)),
    }
}

fn parse_volume(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((host, container)) if !host.is_empty() && container.starts_with('/') => {
            Ok((host.to_string(), container.to_string()))
        }
        _ => Err(format!(
            "Expected HOST:CONTAINER with an absolute container path, got '{}'",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_detect_args() {
        let args = CliArgs::parse_from(["dockhand", "detect"]);
        match args.command {
            Commands::Detect(detect_args) => {
                assert_eq!(detect_args.format, OutputFormatArg::Human);
                assert!(detect_args.path.is_none());
            }
            _ => panic!("Expected Detect command"),
        }
    }

    #[test]
    fn test_add_with_options() {
        let args = CliArgs::parse_from([
            "dockhand",
            "add",
            "/srv/api",
            "--name",
            "api",
            "-e",
            "NODE_ENV=production",
            "-e",
            "EMPTY=",
            "--memory",
            "256",
            "--cpus",
            "0.5",
            "--volume",
            "/srv/data:/data",
        ]);
        match args.command {
            Commands::Add(add) => {
                assert_eq!(add.path, PathBuf::from("/srv/api"));
                assert_eq!(add.name.as_deref(), Some("api"));
                assert_eq!(
                    add.env,
                    vec![
                        ("NODE_ENV".to_string(), "production".to_string()),
                        ("EMPTY".to_string(), String::new()),
                    ]
                );
                assert_eq!(add.memory, Some(256));
                assert_eq!(add.cpus, Some(0.5));
                assert_eq!(
                    add.volumes,
                    vec![("/srv/data".to_string(), "/data".to_string())]
                );
            }
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_invalid_env_is_rejected() {
        assert!(CliArgs::try_parse_from(["dockhand", "add", ".", "-e", "NOVALUE"]).is_err());
        assert!(CliArgs::try_parse_from(["dockhand", "add", ".", "--volume", "data"]).is_err());
    }

    #[test]
    fn test_run_defaults_to_all() {
        let args = CliArgs::parse_from(["dockhand", "run"]);
        match args.command {
            Commands::Run(run) => {
                assert!(run.projects.is_empty());
                assert!(!run.rebuild);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_set_port_rejects_zero() {
        assert!(CliArgs::try_parse_from(["dockhand", "set-port", "api", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["dockhand", "set-port", "api", "8080"]).is_ok());
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["dockhand", "list", "-v"]);
        assert!(args.verbose);
        assert!(CliArgs::try_parse_from(["dockhand", "list", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_edit_args() {
        let args = CliArgs::parse_from([
            "dockhand",
            "edit",
            "api",
            "-e",
            "DEBUG=1",
            "--unset-env",
            "NODE_ENV",
            "--remove-volume",
            "/srv/old",
        ]);
        match args.command {
            Commands::Edit(edit) => {
                assert_eq!(edit.project, "api");
                assert!(edit.name.is_none());
                assert_eq!(edit.env, vec![("DEBUG".to_string(), "1".to_string())]);
                assert_eq!(edit.unset_env, vec!["NODE_ENV"]);
                assert_eq!(edit.remove_volume, vec!["/srv/old"]);
                assert!(edit.memory.is_none() && edit.cpus.is_none());
            }
            _ => panic!("Expected Edit command"),
        }
    }
}

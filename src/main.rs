use dockhand::cli::commands::{CliArgs, Commands};
use dockhand::cli::handlers::{
    handle_add, handle_config, handle_detect, handle_edit, handle_generate, handle_list,
    handle_logs, handle_remove, handle_run, handle_set_port,
};
use dockhand::util::logging;
use dockhand::{DockhandConfig, VERSION};

use clap::Parser;
use tracing::{debug, error};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("dockhand v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Detect(detect_args) => handle_detect(detect_args),
        Commands::Generate(generate_args) => handle_generate(generate_args),
        command => match load_config() {
            Some(config) => run_managed(command, &config).await,
            None => 1,
        },
    };

    std::process::exit(exit_code);
}

async fn run_managed(command: &Commands, config: &DockhandConfig) -> i32 {
    match command {
        Commands::Add(add_args) => handle_add(add_args, config),
        Commands::List(list_args) => handle_list(list_args, config),
        Commands::Remove(project_arg) => handle_remove(project_arg, config).await,
        Commands::SetPort(set_port_args) => handle_set_port(set_port_args, config),
        Commands::Edit(edit_args) => handle_edit(edit_args, config),
        Commands::Run(run_args) => handle_run(run_args, config).await,
        Commands::Logs(logs_args) => handle_logs(logs_args, config),
        Commands::Config => handle_config(config),
        Commands::Detect(detect_args) => handle_detect(detect_args),
        Commands::Generate(generate_args) => handle_generate(generate_args),
    }
}

fn load_config() -> Option<DockhandConfig> {
    let config = DockhandConfig::default();
    match config.validate() {
        Ok(()) => Some(config),
        Err(e) => {
            error!("{}", e);
            eprintln!("\nHelp: Check the DOCKHAND_* environment variables");
            None
        }
    }
}

fn init_logging_from_args(args: &CliArgs) {
    if let Some(level) = &args.log_level {
        logging::with_level(level);
    } else if args.verbose {
        logging::with_level("debug");
    } else if args.quiet {
        logging::with_level("error");
    } else {
        logging::init_from_env();
    }
}

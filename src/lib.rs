//! dockhand - detect, containerize, and run local web projects
//!
//! Point dockhand at a directory and it works out what kind of web project
//! lives there, writes a Dockerfile (or a compose file for backend/frontend
//! repositories), builds the image, and runs it on a free host port. Every run
//! gets its own log file.
//!
//! # Core Concepts
//!
//! - **Variant**: the detected archetype of a project directory (static site,
//!   Node service, frontend framework app, full-stack repository)
//! - **Artifacts**: the Dockerfile or compose file generated for a variant
//! - **Engine**: the container engine API behind [`ContainerEngine`]; the
//!   orchestrator degrades gracefully when it is unreachable
//! - **Supervisor**: the control surface that runs start/stop/rebuild on
//!   background tasks and applies their results
//!
//! # Example Usage
//!
//! ```no_run
//! use dockhand::{detection, ProjectVariant};
//! use std::path::Path;
//!
//! let variant = detection::detect(Path::new("./my-site"));
//! if variant != ProjectVariant::Unknown {
//!     println!("Detected {} on port {}", variant, detection::default_port(Path::new("./my-site"), variant));
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`detection`]: project type and default port inference
//! - [`artifacts`]: Dockerfile and compose generation
//! - [`engine`]: container engine and compose tool adapters
//! - [`orchestrator`]: start, stop, and rebuild lifecycles
//! - [`supervisor`]: concurrent operations over the project list
//! - [`ports`]: host port allocation
//! - [`runlog`]: per-run log files
//! - [`store`]: persisted project list

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod detection;
pub mod engine;
pub mod orchestrator;
pub mod ports;
pub mod project;
pub mod runlog;
pub mod store;
pub mod supervisor;
pub mod util;

// Re-export key types for convenient access
pub use config::{ConfigError, DockhandConfig};
pub use engine::{ContainerEngine, EngineError};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use ports::{PortAllocator, PortError};
pub use project::{Project, ProjectVariant, ResourceOptions, RunHandle, RunStatus};
pub use runlog::RunLogger;
pub use store::{ProjectStore, StoreError};
pub use supervisor::{Operation, ProjectUpdate, RegistrationError, Supervisor, SupervisorError};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_dockhand() {
        assert_eq!(NAME, "dockhand");
    }
}

//! External compose tool driver for multi-service stacks

use super::{EngineError, LineSink};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_COMPOSE_COMMAND: &str = "docker-compose";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    /// `up -d`, optionally with `--build`
    Up { build: bool },
    Down,
}

impl ComposeAction {
    fn args(&self) -> Vec<&'static str> {
        match self {
            ComposeAction::Up { build: false } => vec!["up", "-d"],
            ComposeAction::Up { build: true } => vec!["up", "-d", "--build"],
            ComposeAction::Down => vec!["down"],
        }
    }
}

#[async_trait]
pub trait ComposeRunner: Send + Sync {
    /// Runs `action` against `compose_file` and waits for the tool to exit
    ///
    /// Returns the exit code; `Err` only when the tool could not be run at all.
    async fn run(
        &self,
        project_dir: &Path,
        compose_file: &Path,
        action: ComposeAction,
        sink: LineSink<'_>,
    ) -> Result<i32, EngineError>;
}

/// Runs the compose tool as a child process
#[derive(Debug, Clone)]
pub struct ProcessCompose {
    program: String,
    base_args: Vec<String>,
}

impl Default for ProcessCompose {
    fn default() -> Self {
        Self::new(DEFAULT_COMPOSE_COMMAND)
    }
}

impl ProcessCompose {
    /// `command` may carry leading arguments, as in `docker compose`
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .unwrap_or_else(|| DEFAULT_COMPOSE_COMMAND.to_string());
        Self {
            program,
            base_args: parts.collect(),
        }
    }

    pub fn command_line(&self, compose_file: &Path, action: ComposeAction) -> Vec<String> {
        let mut line = vec![self.program.clone()];
        line.extend(self.base_args.iter().cloned());
        line.push("-f".to_string());
        line.push(compose_file.display().to_string());
        line.extend(action.args().into_iter().map(str::to_string));
        line
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, sink: LineSink<'_>) {
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end();
        if !line.is_empty() {
            sink(line);
        }
    }
}

#[async_trait]
impl ComposeRunner for ProcessCompose {
    async fn run(
        &self,
        project_dir: &Path,
        compose_file: &Path,
        action: ComposeAction,
        sink: LineSink<'_>,
    ) -> Result<i32, EngineError> {
        let command_line = self.command_line(compose_file, action);
        debug!("Running {}", command_line.join(" "));

        let mut child = Command::new(&command_line[0])
            .args(&command_line[1..])
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("{}: {}", self.program, e)))?;

        tokio::join!(
            forward_lines(child.stdout.take(), sink),
            forward_lines(child.stderr.take(), sink),
        );

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::api("Compose", e))?;

        // Killed by a signal: report like a shell would
        Ok(status.code().unwrap_or(-1))
    }
}

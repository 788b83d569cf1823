//! Per-run project log files
//!
//! Each start or rebuild gets its own file under
//! `<logs root>/<sanitized project name>/run_<timestamp>.log`. Every line is
//! flushed as soon as it is written so a build can be followed with `tail -f`.

use crate::project::Project;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

const RULE_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const LOG_EXTENSION: &str = "log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
    Build,
    Container,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
            LogLevel::Build => "BUILD",
            LogLevel::Container => "CONTAINER",
        }
    }
}

/// Log sink for a single run
///
/// Construction never fails: when the file cannot be created the logger is
/// disabled and every write is dropped.
pub struct RunLogger {
    path: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl RunLogger {
    pub fn new(logs_root: &Path, project: &Project) -> Self {
        match open_log_file(logs_root, &project.name) {
            Ok((path, file)) => {
                let logger = Self {
                    writer: Mutex::new(Some(BufWriter::new(file))),
                    path: Some(path),
                };
                logger.write_header(project);
                logger
            }
            Err(e) => {
                warn!(
                    "Failed to create run log for {} under {}: {}",
                    project.name,
                    logs_root.display(),
                    e
                );
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    pub fn build(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Build, message.as_ref());
    }

    pub fn container(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Container, message.as_ref());
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let line = format!("[{}] [{}] {}", now(), level.as_str(), message);
        self.write_block(&line);
    }

    /// Writes the footer and releases the file; later writes are dropped
    pub fn close(&self) {
        let rule = "=".repeat(RULE_WIDTH);
        self.write_block(&format!("\n{rule}\nLog ended: {}\n{rule}", now()));

        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            if let Some(path) = &self.path {
                info!("Closed project log file: {}", path.display());
            }
        }
    }

    fn write_header(&self, project: &Project) {
        let rule = "=".repeat(RULE_WIDTH);
        let header = format!(
            "{rule}\n\
            dockhand - Project Log\n\
            Project: {}\n\
            Type: {}\n\
            Path: {}\n\
            Port: {}\n\
            Started: {}\n\
            {rule}\n",
            project.name,
            project.variant(),
            project.path().display(),
            project.port,
            now(),
        );
        self.write_block(&header);
    }

    fn write_block(&self, text: &str) {
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let Some(writer) = guard.as_mut() else {
            return;
        };

        let result = writeln!(writer, "{}", text).and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!("Failed to write to project log: {}", e);
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        let open = self
            .writer
            .get_mut()
            .map(|w| w.is_some())
            .unwrap_or(false);
        if open {
            self.close();
        }
    }
}

fn now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Replaces everything outside `[A-Za-z0-9-_]` with `_`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory holding all run logs of the named project
pub fn project_log_dir(logs_root: &Path, project_name: &str) -> PathBuf {
    logs_root.join(sanitize_name(project_name))
}

fn open_log_file(logs_root: &Path, project_name: &str) -> io::Result<(PathBuf, File)> {
    let dir = project_log_dir(logs_root, project_name);
    if !dir.is_dir() {
        fs::create_dir_all(&dir)?;
        debug!("Created log directory: {}", dir.display());
    }

    let stem = format!("run_{}", Local::now().format(FILE_TIMESTAMP_FORMAT));
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}.{}", stem, LOG_EXTENSION)
        } else {
            format!("{}_{}.{}", stem, attempt, LOG_EXTENSION)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Most recently written log file of the named project, if any
pub fn latest_log_file(logs_root: &Path, project_name: &str) -> Option<PathBuf> {
    let dir = project_log_dir(logs_root, project_name);
    let entries = fs::read_dir(&dir).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == LOG_EXTENSION)
        })
        .filter_map(|path| {
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max()
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectVariant;
    use tempfile::TempDir;

    fn project(name: &str) -> Project {
        Project::new(name, "/srv/site", ProjectVariant::Static, 8080)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My App v2.0"), "My_App_v2_0");
        assert_eq!(sanitize_name("ok-name_1"), "ok-name_1");
    }

    #[test]
    fn test_header_lines_and_footer() {
        let root = TempDir::new().unwrap();
        let logger = RunLogger::new(root.path(), &project("My Site"));
        let path = logger.path().unwrap().to_path_buf();

        logger.info("Starting project");
        logger.build("Step 1/4 : FROM nginx:alpine");
        logger.close();
        logger.error("dropped after close");

        let content = fs::read_to_string(&path).unwrap();
        assert!(path.starts_with(root.path().join("My_Site")));
        assert!(content.starts_with(&"=".repeat(80)));
        assert!(content.contains("Project: My Site"));
        assert!(content.contains("Type: Static"));
        assert!(content.contains("Port: 8080"));
        assert!(content.contains("] [INFO] Starting project"));
        assert!(content.contains("] [BUILD] Step 1/4 : FROM nginx:alpine"));
        assert!(content.contains("Log ended: "));
        assert!(!content.contains("dropped after close"));
    }

    #[test]
    fn test_same_second_runs_get_distinct_files() {
        let root = TempDir::new().unwrap();
        let first = RunLogger::new(root.path(), &project("api"));
        let second = RunLogger::new(root.path(), &project("api"));

        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_latest_log_file() {
        let root = TempDir::new().unwrap();
        assert!(latest_log_file(root.path(), "api").is_none());

        let logger = RunLogger::new(root.path(), &project("api"));
        logger.close();

        assert_eq!(
            latest_log_file(root.path(), "api").as_deref(),
            logger.path()
        );
    }

    #[test]
    fn test_unwritable_root_disables_logger() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let logger = RunLogger::new(&blocker, &project("api"));
        assert!(logger.path().is_none());
        logger.info("ignored");
        logger.close();
    }
}

pub mod fakes;

pub use fakes::{FakeCompose, FakeEngine};

use std::fs;
use std::path::Path;

/// Writes `files` (relative path, content) under `root`, creating parent dirs
#[allow(dead_code)]
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

#[allow(dead_code)]
pub fn get_dockhand_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.join("dockhand")
}

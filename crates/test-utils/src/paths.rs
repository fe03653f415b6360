//! Temporary directory layouts for tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

/// The directories one ingest service instance needs, under one temp root.
///
/// Everything is removed when the value is dropped.
pub struct TestDirs {
    _root: TempDir,
    pub state_dir: PathBuf,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl TestDirs {
    /// Create the layout. `state/` is left absent so first-run creation can be
    /// exercised; `output/` and `work/` exist.
    pub fn new() -> Self {
        let root = tempfile::Builder::new()
            .prefix("ingest_test_")
            .tempdir()
            .expect("Failed to create temporary test directory");
        let state_dir = root.path().join("state");
        let output_dir = root.path().join("output");
        let work_dir = root.path().join("work");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");
        std::fs::create_dir_all(&work_dir).expect("Failed to create work dir");
        Self {
            _root: root,
            state_dir,
            output_dir,
            work_dir,
        }
    }
}

impl Default for TestDirs {
    fn default() -> Self {
        Self::new()
    }
}

/// All regular files below `dir`, relative to it, sorted.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect()
}

/// Number of entries directly inside `dir`; zero if it does not exist.
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
}

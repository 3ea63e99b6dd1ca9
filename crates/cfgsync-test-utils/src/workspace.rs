//! [`TestWorkspace`] builder for cfgsync test scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary workspace directory with helpers for setup and assertions.
///
/// # Example
///
/// ```rust,no_run
/// use cfgsync_test_utils::workspace::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// ws.init_cfgsync("prod", "https://prod.example.com/api/v1");
/// ws.assert_file_exists(".cfgsync/config.toml");
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` inside the workspace.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `.cfgsync/config.toml` declaring one tenant whose token is read
    /// from `CFGSYNC_TEST_TOKEN`.
    pub fn init_cfgsync(&self, tenant: &str, base_url: &str) {
        let config = format!(
            "[workspace]\ntenant = \"{tenant}\"\n\n[tenants.{tenant}]\nbase_url = \"{base_url}\"\ntoken_env = \"CFGSYNC_TEST_TOKEN\"\n"
        );
        self.write_file(".cfgsync/config.toml", &config);
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) {
        let full_path = self.path(relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
    }

    /// Read `relative` as text.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_file(&self, relative: &str) -> String {
        let full_path = self.path(relative);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Could not read file {}: {e}", full_path.display()))
    }

    /// Names of the files directly inside `relative_dir`, sorted.
    pub fn list_dir(&self, relative_dir: &str) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.path(relative_dir)) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Assert that `path` (relative to the workspace root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.path(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the workspace root) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.path(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }
}

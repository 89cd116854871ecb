//! `home.toml` manifest parsing and environment variable handling, following
//! the same `toml`+`serde` manifest shape as `project::manifest::Manifest`
//! but renamed to the project's own manifest file and entry-point
//! extension.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: Package,
    #[serde(default)]
    pub dependencies: HashMap<String, DependencySpec>,
    #[serde(default)]
    pub scripts: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default = "default_entry")]
    pub entry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Simple(String),
    Detailed { version: Option<String>, path: Option<String> },
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_entry() -> String {
    "src/main.home".to_string()
}

#[derive(Debug)]
pub enum ManifestError {
    Io(PathBuf, String),
    Parse(PathBuf, String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io(path, msg) => write!(f, "could not read '{}': {msg}", path.display()),
            ManifestError::Parse(path, msg) => write!(f, "could not parse '{}': {msg}", path.display()),
        }
    }
}

impl std::error::Error for ManifestError {}

impl Manifest {
    /// Loads `home.toml` from `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self, ManifestError> {
        let path = project_dir.join("home.toml");
        let text = fs::read_to_string(&path).map_err(|e| ManifestError::Io(path.clone(), e.to_string()))?;
        toml::from_str(&text).map_err(|e| ManifestError::Parse(path, e.to_string()))
    }

    pub fn entry_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.package.entry)
    }

    /// Serializes back to `home.toml`, used by `home pkg add` after it
    /// edits `[dependencies]` in place.
    pub fn save(&self, project_dir: &Path) -> Result<(), ManifestError> {
        let path = project_dir.join("home.toml");
        let text = toml::to_string_pretty(self).map_err(|e| ManifestError::Parse(path.clone(), e.to_string()))?;
        fs::write(&path, text).map_err(|e| ManifestError::Io(path, e.to_string()))
    }
}

/// Walks up from `start` looking for `home.toml`, the same directory-climbing
/// search as `project::build::find_project_root`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_file() { start.parent()?.to_path_buf() } else { start.to_path_buf() };
    loop {
        if current.join("home.toml").exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Environment knobs read once at startup rather than
/// scattered across every command handler.
pub struct EnvConfig {
    /// `HOME_CACHE_DIR`: overrides the artifact cache location; defaults
    /// to a per-user cache directory.
    pub cache_dir: PathBuf,
    /// `HOME_TARGET`: overrides the auto-detected target object format.
    pub target: Option<String>,
    /// `NO_COLOR`: disabled diagnostic color output (read directly by
    /// `home_diag::style::Style::enabled`; kept here too so `--color`
    /// can override it explicitly).
    pub no_color: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let cache_dir = std::env::var_os("HOME_CACHE_DIR").map(PathBuf::from).unwrap_or_else(default_cache_dir);
        let target = std::env::var("HOME_TARGET").ok();
        let no_color = std::env::var_os("NO_COLOR").is_some();
        EnvConfig { cache_dir, target, no_color }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("home")
}

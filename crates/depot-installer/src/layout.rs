use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const PREFIX_ENV_VAR: &str = "DEPOT_PREFIX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployLayout {
    prefix: PathBuf,
}

impl DeployLayout {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Default target root that packages are extracted under.
    pub fn packages_dir(&self) -> PathBuf {
        self.prefix.join("packages")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.prefix.join("state")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.prefix.join("cache")
    }

    pub fn package_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("packages")
    }

    pub fn installed_registry_path(&self) -> PathBuf {
        self.state_dir().join("installed.toml")
    }

    pub fn repositories_path(&self) -> PathBuf {
        self.state_dir().join("repositories.toml")
    }

    pub fn config_path(&self) -> PathBuf {
        self.prefix.join("config.toml")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.packages_dir(),
            self.state_dir(),
            self.cache_dir(),
            self.package_cache_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Resolves a relative `path` against the current directory. Blank paths are
/// returned unchanged so callers can still reject them.
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.to_string_lossy().trim().is_empty() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

pub fn default_user_prefix() -> Result<PathBuf> {
    if let Ok(prefix) = std::env::var(PREFIX_ENV_VAR) {
        if !prefix.trim().is_empty() {
            return Ok(PathBuf::from(prefix));
        }
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user prefix")?;
        return Ok(PathBuf::from(app_data).join("Depot"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user prefix")?;
    Ok(PathBuf::from(home).join(".depot"))
}

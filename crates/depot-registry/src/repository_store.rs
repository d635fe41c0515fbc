use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A configured package repository endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub url: String,
    #[serde(default = "repository_enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: u32,
}

impl RepositoryRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            priority,
        }
    }
}

/// Whole-document store of configured repositories (`repositories.toml`).
#[derive(Debug, Clone)]
pub struct RepositoryStore {
    state_root: PathBuf,
}

impl RepositoryStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.state_root.join("repositories.toml")
    }

    pub fn add(&self, repository: RepositoryRecord) -> Result<()> {
        validate_repository_name(&repository.name)?;
        validate_repository_url(&repository.url)?;

        let mut state = self.load_state()?;
        if state
            .repositories
            .iter()
            .any(|existing| existing.name == repository.name)
        {
            anyhow::bail!("repository '{}' already exists", repository.name);
        }

        state.repositories.push(repository);
        self.save_state(&state)
    }

    pub fn list(&self) -> Result<Vec<RepositoryRecord>> {
        Ok(self.load_state()?.repositories)
    }

    pub fn enabled(&self) -> Result<Vec<RepositoryRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|repository| repository.enabled)
            .collect())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut state = self.load_state()?;
        let before = state.repositories.len();
        state.repositories.retain(|repository| repository.name != name);
        if state.repositories.len() == before {
            anyhow::bail!("repository '{}' not found", name);
        }
        self.save_state(&state)
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut state = self.load_state()?;
        let Some(repository) = state
            .repositories
            .iter_mut()
            .find(|repository| repository.name == name)
        else {
            anyhow::bail!("repository '{}' not found", name);
        };
        repository.enabled = enabled;
        self.save_state(&state)
    }

    fn load_state(&self) -> Result<RepositoryStateFile> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(RepositoryStateFile::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed reading repository state: {}", path.display()))?;
        let mut state: RepositoryStateFile = toml::from_str(&content)
            .with_context(|| format!("failed parsing repository state: {}", path.display()))?;
        sort_repositories(&mut state.repositories);
        Ok(state)
    }

    fn save_state(&self, state: &RepositoryStateFile) -> Result<()> {
        fs::create_dir_all(&self.state_root).with_context(|| {
            format!(
                "failed creating repository state root: {}",
                self.state_root.display()
            )
        })?;

        let path = self.file_path();
        let mut state = state.clone();
        state.version = state_file_version();
        sort_repositories(&mut state.repositories);
        let content = toml::to_string(&state)
            .with_context(|| format!("failed serializing repository state: {}", path.display()))?;
        fs::write(&path, content)
            .with_context(|| format!("failed writing repository state: {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RepositoryStateFile {
    #[serde(default = "state_file_version")]
    version: u32,
    #[serde(default)]
    repositories: Vec<RepositoryRecord>,
}

impl Default for RepositoryStateFile {
    fn default() -> Self {
        Self {
            version: state_file_version(),
            repositories: Vec::new(),
        }
    }
}

fn state_file_version() -> u32 {
    1
}

fn repository_enabled_default() -> bool {
    true
}

pub(crate) fn sort_repositories(repositories: &mut [RepositoryRecord]) {
    repositories.sort_by(|left, right| {
        left.priority
            .cmp(&right.priority)
            .then_with(|| left.name.cmp(&right.name))
    });
}

pub(crate) fn validate_repository_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        anyhow::bail!("invalid repository name: must be 1-64 characters");
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        anyhow::bail!("invalid repository name: '{name}'");
    };

    let first_is_valid = first.is_ascii_lowercase() || first.is_ascii_digit();
    let rest_is_valid =
        chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !first_is_valid || !rest_is_valid {
        anyhow::bail!("invalid repository name: '{name}'");
    }

    Ok(())
}

fn validate_repository_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        anyhow::bail!("repository url must not be empty");
    }
    crate::feed::FeedLocation::parse(url).map(|_| ())
}

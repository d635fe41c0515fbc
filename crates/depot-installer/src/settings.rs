use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::DeployLayout;
use crate::script::ScriptHost;

/// Contents of `config.toml`; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_root: Option<PathBuf>,
    pub script_host: ScriptHost,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading settings: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed parsing settings: {}", path.display()))
    }

    pub fn load_for(layout: &DeployLayout) -> Result<Self> {
        Self::load(&layout.config_path())
    }

    /// Configured target root, else `packages/` under the prefix.
    pub fn resolve_target_root(&self, layout: &DeployLayout) -> PathBuf {
        self.target_root
            .clone()
            .unwrap_or_else(|| layout.packages_dir())
    }
}

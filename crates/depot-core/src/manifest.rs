use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::reference::PackageReference;
use crate::version::PackageVersion;

pub const DEFAULT_ARCHIVE_NAME: &str = "package.zip";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    pub id: String,
    pub version: PackageVersion,
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub sha256: Option<String>,
    #[serde(default = "default_archive_name")]
    pub archive: String,
}

impl PackageManifest {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self = toml::from_str(input).context("failed to parse package manifest")?;
        validate_package_id(&manifest.id)?;
        validate_archive_name(&manifest.archive).with_context(|| {
            format!("invalid archive name for package '{}'", manifest.id)
        })?;
        if let Some(sha256) = &manifest.sha256 {
            if sha256.len() != 64 || !sha256.chars().all(|ch| ch.is_ascii_hexdigit()) {
                return Err(anyhow!(
                    "sha256 for package '{}' must be 64 hex characters",
                    manifest.id
                ));
            }
        }
        Ok(manifest)
    }

    pub fn reference(&self) -> anyhow::Result<PackageReference> {
        PackageReference::new(self.id.clone(), self.version.clone())
            .map_err(|err| anyhow!("invalid package manifest: {err}"))
    }
}

pub fn validate_package_id(id: &str) -> anyhow::Result<()> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("package id must not be empty"));
    }
    if trimmed.starts_with('.') || trimmed.ends_with('.') {
        return Err(anyhow!("package id must not start or end with '.': {id}"));
    }
    if trimmed
        .chars()
        .any(|ch| !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '_'))
    {
        return Err(anyhow!("package id contains invalid character(s): {id}"));
    }
    Ok(())
}

fn validate_archive_name(name: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("archive name must not be empty"));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(anyhow!("archive name must be a plain file name: {name}"));
    }
    Ok(())
}

fn default_archive_name() -> String {
    DEFAULT_ARCHIVE_NAME.to_string()
}

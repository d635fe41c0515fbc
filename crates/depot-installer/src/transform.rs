use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use depot_core::ServiceResult;
use serde::Deserialize;
use tracing::debug;

use crate::fs::remove_file_if_exists;

pub const SYSTEM_SETTINGS_FILE_NAME: &str = "system-settings.toml";
pub const TEMPLATE_SUFFIX: &str = ".template";

/// Rewrites files of an extracted package according to named profiles.
pub trait TransformService {
    fn transform(&self, folder: &Path, profiles: &[String]) -> ServiceResult;
}

/// Renders `*.template` files from `system-settings.toml` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSettingsTransform;

#[derive(Debug, Default, Deserialize)]
struct SystemSettingsDocument {
    #[serde(default)]
    defaults: BTreeMap<String, String>,
    #[serde(default)]
    profiles: BTreeMap<String, BTreeMap<String, String>>,
}

impl TransformService for SystemSettingsTransform {
    fn transform(&self, folder: &Path, profiles: &[String]) -> ServiceResult {
        match apply_system_settings(folder, profiles) {
            Ok(0) => ServiceResult::success(),
            Ok(rendered) => {
                ServiceResult::success_with(format!("rendered {rendered} template file(s)"))
            }
            Err(err) => ServiceResult::from_error("system settings transform failed", &err),
        }
    }
}

fn apply_system_settings(folder: &Path, profiles: &[String]) -> Result<usize> {
    let settings_path = folder.join(SYSTEM_SETTINGS_FILE_NAME);
    if !settings_path.is_file() {
        debug!(folder = %folder.display(), "no system settings file; skipping");
        return Ok(0);
    }

    let content = fs::read_to_string(&settings_path)
        .with_context(|| format!("failed reading {}", settings_path.display()))?;
    let document: SystemSettingsDocument = toml::from_str(&content)
        .with_context(|| format!("failed parsing {}", settings_path.display()))?;

    let values = merge_settings(&document, profiles)?;

    let mut rendered = 0;
    for template in collect_files(folder)? {
        let Some(target) = template_target(&template) else {
            continue;
        };
        let source = fs::read_to_string(&template)
            .with_context(|| format!("failed reading template {}", template.display()))?;
        let output = substitute_tokens(&source, &values).map_err(|missing| {
            anyhow!(
                "template {} references undefined setting(s): {}",
                template.display(),
                missing.join(", ")
            )
        })?;
        fs::write(&target, output)
            .with_context(|| format!("failed writing {}", target.display()))?;
        remove_file_if_exists(&template)
            .with_context(|| format!("failed removing template {}", template.display()))?;
        debug!(template = %template.display(), target = %target.display(), "rendered template");
        rendered += 1;
    }
    Ok(rendered)
}

fn merge_settings(
    document: &SystemSettingsDocument,
    profiles: &[String],
) -> Result<BTreeMap<String, String>> {
    let mut values = document.defaults.clone();
    for profile in profiles {
        let overrides = document
            .profiles
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(profile))
            .map(|(_, overrides)| overrides)
            .ok_or_else(|| anyhow!("system settings profile '{}' is not defined", profile))?;
        values.extend(
            overrides
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
    }
    Ok(values)
}

fn template_target(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stripped = name.strip_suffix(TEMPLATE_SUFFIX)?;
    if stripped.is_empty() {
        return None;
    }
    Some(path.with_file_name(stripped))
}

/// Replaces `${key}` tokens; `Err` lists the keys with no value.
pub fn substitute_tokens(
    input: &str,
    values: &BTreeMap<String, String>,
) -> std::result::Result<String, Vec<String>> {
    let mut output = String::with_capacity(input.len());
    let mut missing = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let key = after[..end].trim();
        match values.get(key) {
            Some(value) => output.push_str(value),
            None => {
                if !missing.iter().any(|existing| existing == key) {
                    missing.push(key.to_string());
                }
            }
        }
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    if missing.is_empty() {
        Ok(output)
    } else {
        Err(missing)
    }
}

/// Promotes `<stem>.<profile>.<ext>` files over `<stem>.<ext>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigFileTransform;

impl TransformService for ConfigFileTransform {
    fn transform(&self, folder: &Path, profiles: &[String]) -> ServiceResult {
        let mut promoted = 0;
        for profile in profiles {
            match apply_config_profile(folder, profile) {
                Ok(count) => promoted += count,
                Err(err) => {
                    return ServiceResult::from_error(
                        &format!("config file transform for profile '{profile}' failed"),
                        &err,
                    )
                }
            }
        }

        if promoted == 0 {
            ServiceResult::success()
        } else {
            ServiceResult::success_with(format!("applied {promoted} profile file(s)"))
        }
    }
}

fn apply_config_profile(folder: &Path, profile: &str) -> Result<usize> {
    let mut promoted = 0;
    for variant in collect_files(folder)? {
        let Some(target) = profile_target(&variant, profile) else {
            continue;
        };
        fs::copy(&variant, &target).with_context(|| {
            format!(
                "failed to copy {} to {}",
                variant.display(),
                target.display()
            )
        })?;
        fs::remove_file(&variant)
            .with_context(|| format!("failed to remove {}", variant.display()))?;
        debug!(
            profile,
            variant = %variant.display(),
            target = %target.display(),
            "applied profile file"
        );
        promoted += 1;
    }
    Ok(promoted)
}

fn profile_target(path: &Path, profile: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let (rest, ext) = name.rsplit_once('.')?;
    let (stem, variant) = rest.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !variant.eq_ignore_ascii_case(profile) {
        return None;
    }
    Some(path.with_file_name(format!("{stem}.{ext}")))
}

fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in
            fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

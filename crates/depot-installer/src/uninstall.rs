use std::path::{Path, PathBuf};

use depot_core::{ensure_not_blank, ArgumentError, PackageVersion, ServiceResult};
use tracing::{info, warn};

use crate::fs::FileSystem;
use crate::installed::{InstalledPackageRecord, InstalledPackageRegistry};
use crate::layout::absolute_path;
use crate::script::{ScriptExecutor, UNINSTALL_SCRIPT_NAME};

pub struct Uninstaller<'a> {
    registry: &'a dyn InstalledPackageRegistry,
    fs: &'a dyn FileSystem,
    scripts: &'a dyn ScriptExecutor,
    target_root: PathBuf,
}

impl<'a> Uninstaller<'a> {
    pub fn new(
        registry: &'a dyn InstalledPackageRegistry,
        fs: &'a dyn FileSystem,
        scripts: &'a dyn ScriptExecutor,
        target_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            fs,
            scripts,
            target_root: absolute_path(&target_root.into()),
        }
    }

    /// Runs the installed package's uninstall script, then forgets and deletes it.
    ///
    /// With `version` set, only that exact installed version is uninstalled.
    pub fn uninstall(
        &self,
        id: &str,
        version: Option<&PackageVersion>,
    ) -> Result<ServiceResult, ArgumentError> {
        ensure_not_blank(id, "package id")?;
        let id = id.trim();

        let record = match self.registry.find(id) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(ServiceResult::failure(format!("{id} is not installed"))),
            Err(err) => {
                return Ok(ServiceResult::from_error(
                    "failed to read installed registry",
                    &err,
                ))
            }
        };

        if let Some(requested) = version {
            let matches = record
                .parsed_version()
                .map(|installed| &installed == requested)
                .unwrap_or(false);
            if !matches {
                return Ok(ServiceResult::failure(format!(
                    "{id} {requested} is not installed (installed: {})",
                    record.version
                )));
            }
        }

        let folder = self.installed_folder(&record);
        let script = folder.join(UNINSTALL_SCRIPT_NAME);
        if !self.fs.file_exists(&script) {
            return Ok(ServiceResult::failure(format!(
                "uninstall script not found: {}",
                script.display()
            )));
        }

        info!(id = %record.id, version = %record.version, "running uninstall script");
        let outcome = self.scripts.execute_script(&script, &[]);
        if outcome.is_failure() {
            return Ok(outcome);
        }

        match self.registry.remove(&record.id) {
            Ok(true) => {}
            Ok(false) => {
                return Ok(ServiceResult::failure(format!(
                    "{} was not removed from the installed registry",
                    record.id
                )))
            }
            Err(err) => {
                return Ok(ServiceResult::from_error(
                    "failed to update installed registry",
                    &err,
                ))
            }
        }

        delete_installed_folder(self.fs, &folder);

        Ok(ServiceResult::success_with(format!(
            "uninstalled {} {}",
            record.id, record.version
        ))
        .with_artifact(folder))
    }

    fn installed_folder(&self, record: &InstalledPackageRecord) -> PathBuf {
        if let Some(folder) = &record.folder {
            return folder.clone();
        }
        let version = record
            .parsed_version()
            .map(|version| version.to_string())
            .unwrap_or_else(|_| record.version.clone());
        self.target_root.join(format!("{}.{version}", record.id))
    }
}

fn delete_installed_folder(fs: &dyn FileSystem, folder: &Path) {
    if !fs.delete_directory(folder) {
        warn!(folder = %folder.display(), "installed folder could not be deleted");
    }
}

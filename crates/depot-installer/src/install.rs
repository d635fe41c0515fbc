use std::path::{Path, PathBuf};

use depot_core::{ensure_not_blank, ArgumentError, DeploymentType, ServiceResult};
use depot_registry::{PackageHandle, RepositoryBrowser};
use tracing::{debug, info, warn};

use crate::decision::InstallDecision;
use crate::extract::PackageExtractor;
use crate::fs::FileSystem;
use crate::installed::{current_unix_timestamp, InstalledPackageRecord, InstalledPackageRegistry};
use crate::layout::absolute_path;
use crate::script::{ScriptExecutor, INSTALL_SCRIPT_NAME};
use crate::transform::TransformService;
use crate::uninstall::Uninstaller;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub id: String,
    pub deployment_type: DeploymentType,
    pub force: bool,
    pub system_setting_profiles: Option<Vec<String>>,
    pub build_config_profiles: Option<Vec<String>>,
}

impl InstallRequest {
    /// Request with empty profile lists and no force.
    pub fn new(id: impl Into<String>, deployment_type: DeploymentType) -> Self {
        Self {
            id: id.into(),
            deployment_type,
            force: false,
            system_setting_profiles: Some(Vec::new()),
            build_config_profiles: Some(Vec::new()),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_system_setting_profiles(mut self, profiles: Vec<String>) -> Self {
        self.system_setting_profiles = Some(profiles);
        self
    }

    pub fn with_build_config_profiles(mut self, profiles: Vec<String>) -> Self {
        self.build_config_profiles = Some(profiles);
        self
    }
}

/// Collaborators the pipeline sequences.
#[derive(Clone, Copy)]
pub struct InstallerServices<'a> {
    pub browser: &'a dyn RepositoryBrowser,
    pub registry: &'a dyn InstalledPackageRegistry,
    pub fs: &'a dyn FileSystem,
    pub scripts: &'a dyn ScriptExecutor,
    pub system_settings: &'a dyn TransformService,
    pub config_files: &'a dyn TransformService,
}

pub struct Installer<'a> {
    services: InstallerServices<'a>,
    target_root: PathBuf,
}

impl<'a> Installer<'a> {
    pub fn new(services: InstallerServices<'a>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            services,
            target_root: absolute_path(&target_root.into()),
        }
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn uninstaller(&self) -> Uninstaller<'a> {
        Uninstaller::new(
            self.services.registry,
            self.services.fs,
            self.services.scripts,
            self.target_root.clone(),
        )
    }

    /// Runs the install pipeline for one package.
    ///
    /// Every stage gates the next. The single exception is a failed uninstall of
    /// the prior version, which a forced install tolerates.
    pub fn install(&self, request: &InstallRequest) -> Result<ServiceResult, ArgumentError> {
        ensure_not_blank(&request.id, "package id")?;
        if !request.deployment_type.is_recognized() {
            return Err(ArgumentError::DeploymentTypeNotRecognized);
        }
        let system_setting_profiles =
            request
                .system_setting_profiles
                .as_deref()
                .ok_or(ArgumentError::MissingProfiles {
                    name: "system setting profiles",
                })?;
        let build_config_profiles =
            request
                .build_config_profiles
                .as_deref()
                .ok_or(ArgumentError::MissingProfiles {
                    name: "build config profiles",
                })?;
        ensure_not_blank(&self.target_root.to_string_lossy(), "target root")?;

        let id = request.id.trim();
        let force = request.force;
        let deployment_type = request.deployment_type;

        if self.services.browser.repositories().is_empty() {
            return Ok(ServiceResult::failure("no package repositories are configured"));
        }

        info!(id, "resolving package");
        let package = match self.services.browser.find_package(id) {
            Ok(Some(package)) => package,
            Ok(None) => {
                return Ok(ServiceResult::failure(format!(
                    "package {id} was not found in any configured repository"
                )))
            }
            Err(err) => {
                return Ok(ServiceResult::from_error(
                    &format!("failed to look up package {id}"),
                    &err,
                ))
            }
        };
        let reference = package.reference().clone();
        let candidate = reference.version();
        info!(
            package = %reference,
            source = package.source().unwrap_or("-"),
            "resolved package"
        );

        let decision = InstallDecision::new(self.services.registry);
        let install_required = decision.is_install_required(id, candidate, force);
        if install_required.is_failure() {
            info!(
                package = %reference,
                reason = install_required.message(),
                "install not required"
            );
            return Ok(install_required);
        }

        let uninstall_required =
            decision.is_uninstall_required(id, candidate, deployment_type, force);
        if uninstall_required.is_success() {
            info!(id, "uninstalling prior version");
            let uninstalled = self.uninstaller().uninstall(id, None)?;
            if uninstalled.is_failure() {
                if !force {
                    return Ok(uninstalled);
                }
                warn!(
                    id,
                    reason = uninstalled.message(),
                    "uninstall of prior version failed; continuing because install is forced"
                );
            }
        } else {
            debug!(id, reason = uninstall_required.message(), "uninstall skipped");
        }

        info!(
            package = %reference,
            target_root = %self.target_root.display(),
            "extracting package"
        );
        let extractor = PackageExtractor::new(self.services.fs);
        let Some(extracted) = extractor.extract(package.as_ref(), &self.target_root)? else {
            return Ok(ServiceResult::failure(format!(
                "failed to extract {reference} into {}",
                self.target_root.display()
            )));
        };
        let folder = extracted.folder;

        info!(
            folder = %folder.display(),
            profiles = ?system_setting_profiles,
            "applying system settings"
        );
        let transformed = self
            .services
            .system_settings
            .transform(&folder, system_setting_profiles);
        if transformed.is_failure() {
            return Ok(transformed);
        }

        // Both transforms receive the system setting profiles.
        debug!(profiles = ?build_config_profiles, "build config profiles are not forwarded");
        info!(
            folder = %folder.display(),
            profiles = ?system_setting_profiles,
            "applying config file profiles"
        );
        let transformed = self
            .services
            .config_files
            .transform(&folder, system_setting_profiles);
        if transformed.is_failure() {
            return Ok(transformed);
        }

        let script = folder.join(INSTALL_SCRIPT_NAME);
        if !self.services.fs.file_exists(&script) {
            return Ok(ServiceResult::failure(format!(
                "install script not found: {}",
                script.display()
            )));
        }
        info!(script = %script.display(), %deployment_type, "running install script");
        let args = vec![
            "-DeploymentType".to_string(),
            deployment_type.script_token().to_string(),
        ];
        let executed = self.services.scripts.execute_script(&script, &args);
        if executed.is_failure() {
            return Ok(executed);
        }

        let record = installed_record(package.as_ref(), &folder, deployment_type);
        match self.services.registry.add_or_update(record) {
            Ok(added) => {
                debug!(package = %reference, added, "installed registry updated");
            }
            Err(err) => {
                return Ok(ServiceResult::from_error(
                    "failed to update installed registry",
                    &err,
                ))
            }
        }

        info!(package = %reference, folder = %folder.display(), "installed");
        Ok(ServiceResult::success_with(format!("installed {reference}")).with_artifact(folder))
    }
}

fn installed_record(
    package: &dyn PackageHandle,
    folder: &Path,
    deployment_type: DeploymentType,
) -> InstalledPackageRecord {
    let reference = package.reference();
    let installed_at_unix = match current_unix_timestamp() {
        Ok(timestamp) => Some(timestamp),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "install time is unavailable");
            None
        }
    };

    InstalledPackageRecord {
        folder: Some(folder.to_path_buf()),
        deployment_type: Some(deployment_type),
        installed_at_unix,
        repository: package.source().map(str::to_string),
        ..InstalledPackageRecord::new(reference.id(), reference.version())
    }
}

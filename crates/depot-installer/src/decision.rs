use depot_core::{DeploymentType, PackageVersion, ServiceResult};
use tracing::{debug, warn};

use crate::installed::InstalledPackageRegistry;

/// Gates the install pipeline on the current registry state.
pub struct InstallDecision<'a> {
    registry: &'a dyn InstalledPackageRegistry,
}

impl<'a> InstallDecision<'a> {
    pub fn new(registry: &'a dyn InstalledPackageRegistry) -> Self {
        Self { registry }
    }

    pub fn is_install_required(
        &self,
        id: &str,
        candidate: &PackageVersion,
        force: bool,
    ) -> ServiceResult {
        if force {
            return ServiceResult::success_with(format!("install of {id} {candidate} is forced"));
        }

        let record = match self.registry.find(id) {
            Ok(record) => record,
            Err(err) => {
                return ServiceResult::from_error("failed to read installed registry", &err)
            }
        };
        let Some(record) = record else {
            return ServiceResult::success_with(format!("{id} is not installed"));
        };

        let installed = match record.parsed_version() {
            Ok(version) => Some(version),
            Err(err) => {
                warn!(
                    id,
                    version = %record.version,
                    error = %format!("{err:#}"),
                    "installed version is unreadable"
                );
                None
            }
        };
        if installed.as_ref() == Some(candidate) {
            return ServiceResult::failure(format!(
                "{} {} is already installed",
                record.id, record.version
            ));
        }

        debug!(id, installed = %record.version, %candidate, "installed version differs");
        ServiceResult::success_with(format!(
            "{} {} is installed; {candidate} differs",
            record.id, record.version
        ))
    }

    pub fn is_uninstall_required(
        &self,
        id: &str,
        candidate: &PackageVersion,
        deployment_type: DeploymentType,
        force: bool,
    ) -> ServiceResult {
        let record = match self.registry.find(id) {
            Ok(record) => record,
            Err(err) => {
                return ServiceResult::from_error("failed to read installed registry", &err)
            }
        };
        let Some(record) = record else {
            return ServiceResult::failure(format!("{id} is not installed; nothing to uninstall"));
        };

        if force || !deployment_type.is_side_by_side() {
            debug!(
                id,
                installed = %record.version,
                %candidate,
                %deployment_type,
                force,
                "prior version must be uninstalled"
            );
            return ServiceResult::success_with(format!(
                "{} {} must be uninstalled before installing {candidate}",
                record.id, record.version
            ));
        }

        ServiceResult::failure(format!(
            "{} {} stays in place for side-by-side deployment of {candidate}",
            record.id, record.version
        ))
    }
}

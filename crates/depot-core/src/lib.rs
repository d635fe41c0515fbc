mod deployment;
mod error;
mod manifest;
mod reference;
mod result;
mod version;

pub use deployment::DeploymentType;
pub use error::{ensure_not_blank, ArgumentError};
pub use manifest::{validate_package_id, PackageManifest, DEFAULT_ARCHIVE_NAME};
pub use reference::{ids_match, PackageReference};
pub use result::{ServiceResult, ServiceStatus};
pub use version::PackageVersion;

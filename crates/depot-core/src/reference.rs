use std::fmt;

use crate::error::{ensure_not_blank, ArgumentError};
use crate::version::PackageVersion;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageReference {
    id: String,
    version: PackageVersion,
}

impl PackageReference {
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Result<Self, ArgumentError> {
        let id = id.into();
        ensure_not_blank(&id, "package id")?;
        Ok(Self {
            id: id.trim().to_string(),
            version,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    pub fn matches_id(&self, id: &str) -> bool {
        ids_match(&self.id, id)
    }

    /// Name of the folder a package is extracted into: `{id}.{version}`.
    pub fn folder_name(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

pub fn ids_match(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

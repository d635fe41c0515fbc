use anyhow::{anyhow, Context, Result};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use depot_core::{ArgumentError, PackageVersion};
use depot_registry::PackageHandle;
use tracing::{debug, warn};

use crate::fs::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPackageInfo {
    pub id: String,
    pub version: PackageVersion,
    pub folder: PathBuf,
    pub is_installed: bool,
    pub files: Vec<String>,
}

/// Materializes a package under `target_root/{id}.{version}`.
///
/// Extraction is all-or-nothing from the caller's point of view: any failure
/// yields `Ok(None)` and whatever was already written is left for the next
/// attempt to delete.
pub struct PackageExtractor<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> PackageExtractor<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    pub fn extract(
        &self,
        package: &dyn PackageHandle,
        target_root: &Path,
    ) -> Result<Option<ExtractedPackageInfo>, ArgumentError> {
        if target_root.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ArgumentError::Blank {
                name: "target root",
            });
        }

        let reference = package.reference();
        let folder = target_root.join(reference.folder_name());

        if self.fs.directory_exists(&folder) && !self.fs.delete_directory(&folder) {
            warn!(folder = %folder.display(), "failed to delete existing package folder");
            return Ok(None);
        }

        match self.write_files(package, &folder) {
            Ok(files) => {
                debug!(
                    package = %reference,
                    files = files.len(),
                    folder = %folder.display(),
                    "extracted package"
                );
                Ok(Some(ExtractedPackageInfo {
                    id: reference.id().to_string(),
                    version: reference.version().clone(),
                    folder,
                    is_installed: false,
                    files,
                }))
            }
            Err(err) => {
                warn!(package = %reference, error = %format!("{err:#}"), "extraction failed");
                Ok(None)
            }
        }
    }

    fn write_files(&self, package: &dyn PackageHandle, folder: &Path) -> Result<Vec<String>> {
        self.fs.create_directory(folder)?;

        let mut files = Vec::new();
        for entry in package.file_paths()? {
            let relative = validated_relative_package_path(&entry)?;
            let destination = folder.join(relative);

            let mut reader = package.open_file(&entry)?;
            let mut writer = self.fs.write_stream(&destination)?;
            io::copy(&mut reader, &mut writer)
                .with_context(|| format!("failed to write {}", destination.display()))?;
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", destination.display()))?;
            files.push(entry);
        }
        Ok(files)
    }
}

fn validated_relative_package_path(path: &str) -> Result<&Path> {
    let relative = Path::new(path);
    if relative.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return Err(anyhow!("package file path must be relative: {}", path));
    }
    if relative.as_os_str().is_empty() {
        return Err(anyhow!("package file path must not be empty"));
    }
    if relative.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::Prefix(_) | Component::RootDir
        )
    }) {
        return Err(anyhow!("package file path must not include '..': {}", path));
    }
    Ok(relative)
}

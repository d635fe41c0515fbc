use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use depot_core::{PackageManifest, PackageReference};

use crate::checksum::verify_sha256_file;

/// A fetched package whose files can be enumerated and read.
pub trait PackageHandle {
    fn reference(&self) -> &PackageReference;

    /// Relative paths of every file entry, directories excluded.
    fn file_paths(&self) -> Result<Vec<String>>;

    fn open_file(&self, path: &str) -> Result<Box<dyn Read>>;

    /// Name of the repository the package was resolved from.
    fn source(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ZipPackage {
    reference: PackageReference,
    archive_path: PathBuf,
    source: Option<String>,
}

impl ZipPackage {
    pub fn open(
        manifest: PackageManifest,
        archive_path: impl Into<PathBuf>,
        source: Option<String>,
    ) -> Result<Self> {
        let archive_path = archive_path.into();
        if !archive_path.is_file() {
            return Err(anyhow!(
                "package archive not found for '{}': {}",
                manifest.id,
                archive_path.display()
            ));
        }

        if let Some(expected) = &manifest.sha256 {
            let checksum_ok = verify_sha256_file(&archive_path, expected)?;
            if !checksum_ok {
                return Err(anyhow!(
                    "sha256 mismatch for {} (expected {})",
                    archive_path.display(),
                    expected
                ));
            }
        }

        let reference = manifest.reference()?;
        Ok(Self {
            reference,
            archive_path,
            source,
        })
    }

    fn archive(&self) -> Result<zip::ZipArchive<File>> {
        let file = File::open(&self.archive_path).with_context(|| {
            format!(
                "failed to open package archive: {}",
                self.archive_path.display()
            )
        })?;
        zip::ZipArchive::new(file).with_context(|| {
            format!(
                "failed to read package archive: {}",
                self.archive_path.display()
            )
        })
    }
}

impl PackageHandle for ZipPackage {
    fn reference(&self) -> &PackageReference {
        &self.reference
    }

    fn file_paths(&self) -> Result<Vec<String>> {
        let mut archive = self.archive()?;
        let mut paths = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index).with_context(|| {
                format!(
                    "failed to read entry #{index} of {}",
                    self.archive_path.display()
                )
            })?;
            if entry.is_dir() {
                continue;
            }
            paths.push(entry.name().to_string());
        }
        Ok(paths)
    }

    fn open_file(&self, path: &str) -> Result<Box<dyn Read>> {
        let mut archive = self.archive()?;
        let mut entry = archive.by_name(path).with_context(|| {
            format!(
                "package entry '{path}' not found in {}",
                self.archive_path.display()
            )
        })?;
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("failed to read package entry '{path}'"))?;
        Ok(Box::new(Cursor::new(contents)))
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

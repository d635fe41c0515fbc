use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tracing::warn;

/// Filesystem operations the pipeline performs, injectable for tests.
pub trait FileSystem {
    fn file_exists(&self, path: &Path) -> bool;

    fn directory_exists(&self, path: &Path) -> bool;

    /// Recursively deletes `path`; `false` when the deletion failed.
    fn delete_directory(&self, path: &Path) -> bool;

    fn create_directory(&self, path: &Path) -> Result<()>;

    fn read_stream(&self, path: &Path) -> Result<Box<dyn Read>>;

    /// Opens `path` for writing, creating parent directories as needed.
    fn write_stream(&self, path: &Path) -> Result<Box<dyn Write>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn delete_directory(&self, path: &Path) -> bool {
        match fs::remove_dir_all(path) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to delete directory");
                false
            }
        }
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
    }

    fn read_stream(&self, path: &Path) -> Result<Box<dyn Read>> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Box::new(file))
    }

    fn write_stream(&self, path: &Path) -> Result<Box<dyn Write>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

pub fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

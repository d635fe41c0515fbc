use anyhow::{Context, Result};
use depot_core::{DeploymentType, PackageVersion};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackageRecord {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_type: Option<DeploymentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at_unix: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl InstalledPackageRecord {
    pub fn new(id: impl Into<String>, version: &PackageVersion) -> Self {
        Self {
            id: id.into(),
            version: version.to_string(),
            folder: None,
            deployment_type: None,
            installed_at_unix: None,
            repository: None,
        }
    }

    pub fn parsed_version(&self) -> Result<PackageVersion> {
        PackageVersion::parse(&self.version).with_context(|| {
            format!(
                "installed record for '{}' has an invalid version '{}'",
                self.id, self.version
            )
        })
    }
}

/// Persisted set of installed packages, keyed by id (case-insensitive).
pub trait InstalledPackageRegistry {
    /// All records, ascending by id.
    fn installed_packages(&self) -> Result<Vec<InstalledPackageRecord>>;

    /// Inserts or overwrites the record for `record.id`; `true` when the id was new.
    fn add_or_update(&self, record: InstalledPackageRecord) -> Result<bool>;

    /// `true` when a record was removed.
    fn remove(&self, id: &str) -> Result<bool>;

    fn find(&self, id: &str) -> Result<Option<InstalledPackageRecord>> {
        let key = registry_key(id);
        Ok(self
            .installed_packages()?
            .into_iter()
            .find(|record| registry_key(&record.id) == key))
    }
}

fn registry_key(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

/// Keyed container shared by registry implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledPackageSet {
    records: BTreeMap<String, InstalledPackageRecord>,
}

impl InstalledPackageSet {
    pub fn from_records(records: impl IntoIterator<Item = InstalledPackageRecord>) -> Self {
        let mut set = Self::default();
        for record in records {
            set.upsert(record);
        }
        set
    }

    pub fn upsert(&mut self, record: InstalledPackageRecord) -> bool {
        self.records
            .insert(registry_key(&record.id), record)
            .is_none()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.records.remove(&registry_key(id)).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&InstalledPackageRecord> {
        self.records.get(&registry_key(id))
    }

    pub fn to_sorted_vec(&self) -> Vec<InstalledPackageRecord> {
        self.records.values().cloned().collect()
    }
}

/// Registry stored as a single TOML document.
///
/// Every mutation loads the whole document, applies the change and writes the
/// whole document back. Two processes mutating the same file concurrently can
/// lose updates; no locking is performed.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<InstalledPackageSet> {
        if !self.path.exists() {
            return Ok(InstalledPackageSet::default());
        }

        let content = fs::read_to_string(&self.path).with_context(|| {
            format!("failed reading installed registry: {}", self.path.display())
        })?;
        let document: RegistryDocument = toml::from_str(&content).with_context(|| {
            format!("failed parsing installed registry: {}", self.path.display())
        })?;
        Ok(InstalledPackageSet::from_records(document.packages))
    }

    pub fn save(&self, set: &InstalledPackageSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let document = RegistryDocument {
            version: registry_document_version(),
            packages: set.to_sorted_vec(),
        };
        let content = toml::to_string(&document).with_context(|| {
            format!(
                "failed serializing installed registry: {}",
                self.path.display()
            )
        })?;
        fs::write(&self.path, content).with_context(|| {
            format!("failed writing installed registry: {}", self.path.display())
        })
    }
}

impl InstalledPackageRegistry for FileRegistry {
    fn installed_packages(&self) -> Result<Vec<InstalledPackageRecord>> {
        Ok(self.load()?.to_sorted_vec())
    }

    fn add_or_update(&self, record: InstalledPackageRecord) -> Result<bool> {
        let mut set = self.load()?;
        let added = set.upsert(record);
        self.save(&set)?;
        Ok(added)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let mut set = self.load()?;
        if !set.remove(id) {
            return Ok(false);
        }
        self.save(&set)?;
        Ok(true)
    }

    fn find(&self, id: &str) -> Result<Option<InstalledPackageRecord>> {
        Ok(self.load()?.get(id).cloned())
    }
}

/// In-process registry with no persistence.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    set: RefCell<InstalledPackageSet>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = InstalledPackageRecord>) -> Self {
        Self {
            set: RefCell::new(InstalledPackageSet::from_records(records)),
        }
    }
}

impl InstalledPackageRegistry for MemoryRegistry {
    fn installed_packages(&self) -> Result<Vec<InstalledPackageRecord>> {
        Ok(self.set.borrow().to_sorted_vec())
    }

    fn add_or_update(&self, record: InstalledPackageRecord) -> Result<bool> {
        Ok(self.set.borrow_mut().upsert(record))
    }

    fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.set.borrow_mut().remove(id))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default = "registry_document_version")]
    version: u32,
    #[serde(default)]
    packages: Vec<InstalledPackageRecord>,
}

fn registry_document_version() -> u32 {
    1
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}

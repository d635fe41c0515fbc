use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use depot_core::{ids_match, PackageManifest, PackageVersion};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::checksum::verify_sha256_file;
use crate::package::ZipPackage;

pub const MANIFEST_FILE_NAME: &str = "package.toml";
pub const VERSIONS_FILE_NAME: &str = "versions.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    Directory(PathBuf),
    Http(String),
}

impl FeedLocation {
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        if let Some(path) = trimmed.strip_prefix("file://") {
            if path.is_empty() {
                return Err(anyhow!("file repository url has no path: {url}"));
            }
            return Ok(Self::Directory(PathBuf::from(path)));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Http(trimmed.trim_end_matches('/').to_string()));
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(anyhow!(
                "unsupported repository scheme '{scheme}'; supported: file, http, https"
            ));
        }
        Ok(Self::Directory(PathBuf::from(trimmed)))
    }
}

/// Local feed laid out as `<root>/<id>/<version>/package.toml` plus the archive.
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    root: PathBuf,
}

impl DirectoryFeed {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn package_manifests(&self, id: &str) -> Result<Vec<(PackageManifest, PathBuf)>> {
        let Some(package_dir) = self.package_dir(id)? else {
            return Ok(Vec::new());
        };

        let mut manifests = Vec::new();
        for entry in fs::read_dir(&package_dir).with_context(|| {
            format!("failed to read package directory: {}", package_dir.display())
        })? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let manifest_path = entry.path().join(MANIFEST_FILE_NAME);
            if !manifest_path.is_file() {
                continue;
            }
            let manifest = match read_manifest(&manifest_path) {
                Ok(manifest) => manifest,
                Err(err) => {
                    warn!(
                        manifest = %manifest_path.display(),
                        error = %format!("{err:#}"),
                        "skipping unreadable manifest"
                    );
                    continue;
                }
            };
            if !ids_match(&manifest.id, id) {
                warn!(
                    manifest = %manifest_path.display(),
                    declared = %manifest.id,
                    requested = id,
                    "skipping manifest whose id does not match its feed directory"
                );
                continue;
            }
            let archive_path = entry.path().join(&manifest.archive);
            manifests.push((manifest, archive_path));
        }

        manifests.sort_by(|a, b| b.0.version.cmp(&a.0.version));
        Ok(manifests)
    }

    pub fn latest_package(&self, id: &str, source: &str) -> Result<Option<ZipPackage>> {
        let Some((manifest, archive_path)) = self.package_manifests(id)?.into_iter().next() else {
            return Ok(None);
        };
        debug!(id, version = %manifest.version, source, "resolved package from directory feed");
        ZipPackage::open(manifest, archive_path, Some(source.to_string())).map(Some)
    }

    fn package_dir(&self, id: &str) -> Result<Option<PathBuf>> {
        if !self.root.is_dir() {
            return Err(anyhow!(
                "repository directory does not exist: {}",
                self.root.display()
            ));
        }

        let exact = self.root.join(id.to_ascii_lowercase());
        if exact.is_dir() {
            return Ok(Some(exact));
        }

        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to read repository: {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if ids_match(&entry.file_name().to_string_lossy(), id) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed reading manifest: {}", path.display()))?;
    PackageManifest::from_toml_str(&content)
        .with_context(|| format!("failed parsing manifest: {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct VersionsDocument {
    #[serde(default)]
    versions: Vec<PackageVersion>,
}

/// Remote feed: `<url>/<id>/versions.toml`, then `<url>/<id>/<version>/package.toml`
/// and the archive it names. Downloads land in `cache_root/<id>/<version>/`.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    base_url: String,
    cache_root: PathBuf,
}

impl HttpFeed {
    pub fn open(base_url: impl Into<String>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            cache_root: cache_root.into(),
        }
    }

    pub fn latest_package(&self, id: &str, source: &str) -> Result<Option<ZipPackage>> {
        let client = Client::builder()
            .user_agent(concat!("depot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let id_segment = id.trim().to_ascii_lowercase();
        let versions_url = format!("{}/{id_segment}/{VERSIONS_FILE_NAME}", self.base_url);
        let Some(raw) = fetch_text(&client, &versions_url)? else {
            return Ok(None);
        };
        let document: VersionsDocument = toml::from_str(&raw)
            .with_context(|| format!("failed parsing version list: {versions_url}"))?;
        let Some(version) = document.versions.into_iter().max() else {
            return Ok(None);
        };

        let package_url = format!("{}/{id_segment}/{version}", self.base_url);
        let manifest_url = format!("{package_url}/{MANIFEST_FILE_NAME}");
        let raw_manifest = fetch_text(&client, &manifest_url)?
            .ok_or_else(|| anyhow!("listed version has no manifest: {manifest_url}"))?;
        let manifest = PackageManifest::from_toml_str(&raw_manifest)
            .with_context(|| format!("failed parsing manifest: {manifest_url}"))?;
        if !ids_match(&manifest.id, id) {
            return Err(anyhow!(
                "manifest at {manifest_url} declares id '{}' instead of '{id}'",
                manifest.id
            ));
        }

        let cache_path = self
            .cache_root
            .join(&id_segment)
            .join(version.to_string())
            .join(&manifest.archive);
        let archive_url = format!("{package_url}/{}", manifest.archive);
        let status = download_archive(
            &client,
            &archive_url,
            &cache_path,
            manifest.sha256.as_deref(),
        )?;
        debug!(id, %version, source, status, "resolved package from http feed");

        ZipPackage::open(manifest, cache_path, Some(source.to_string())).map(Some)
    }
}

fn fetch_text(client: &Client, url: &str) -> Result<Option<String>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to request {url}"))?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(anyhow!("request to {url} failed: status={}", response.status()));
    }
    response
        .text()
        .map(Some)
        .with_context(|| format!("failed to read response body from {url}"))
}

fn download_archive(
    client: &Client,
    url: &str,
    cache_path: &Path,
    expected_sha256: Option<&str>,
) -> Result<&'static str> {
    if cache_path.exists() {
        let reusable = match expected_sha256 {
            Some(expected) => verify_sha256_file(cache_path, expected)?,
            None => true,
        };
        if reusable {
            return Ok("cache-hit");
        }
    }

    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache dir: {}", parent.display()))?;
    }

    let part_path = cache_path.with_file_name(format!(
        "{}.part",
        cache_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("package")
    ));

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to request {url}"))?;
    if !response.status().is_success() {
        return Err(anyhow!("download of {url} failed: status={}", response.status()));
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("failed to read download body from {url}"))?;
    if let Err(err) = fs::write(&part_path, &bytes) {
        let _ = fs::remove_file(&part_path);
        return Err(err).with_context(|| format!("failed to write {}", part_path.display()));
    }

    if cache_path.exists() {
        fs::remove_file(cache_path)
            .with_context(|| format!("failed to replace cache file: {}", cache_path.display()))?;
    }
    fs::rename(&part_path, cache_path).with_context(|| {
        format!(
            "failed to move downloaded package into cache: {}",
            cache_path.display()
        )
    })?;

    Ok("downloaded")
}

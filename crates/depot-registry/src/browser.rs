use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::feed::{DirectoryFeed, FeedLocation, HttpFeed};
use crate::package::{PackageHandle, ZipPackage};
use crate::repository_store::{sort_repositories, RepositoryRecord, RepositoryStore};

pub trait RepositoryBrowser {
    fn repositories(&self) -> &[RepositoryRecord];

    /// Latest version of `id` from the first repository that has it.
    fn find_package(&self, id: &str) -> Result<Option<Box<dyn PackageHandle>>>;
}

/// Browser over the enabled repositories of a [`RepositoryStore`].
#[derive(Debug, Clone)]
pub struct ConfiguredRepositories {
    repositories: Vec<RepositoryRecord>,
    cache_root: PathBuf,
}

impl ConfiguredRepositories {
    pub fn new(mut repositories: Vec<RepositoryRecord>, cache_root: impl Into<PathBuf>) -> Self {
        repositories.retain(|repository| repository.enabled);
        sort_repositories(&mut repositories);
        Self {
            repositories,
            cache_root: cache_root.into(),
        }
    }

    pub fn open(store: &RepositoryStore, cache_root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(store.enabled()?, cache_root))
    }

    fn search_repository(
        &self,
        repository: &RepositoryRecord,
        id: &str,
    ) -> Result<Option<ZipPackage>> {
        let location = FeedLocation::parse(&repository.url)
            .with_context(|| format!("invalid url for repository '{}'", repository.name))?;
        match location {
            FeedLocation::Directory(root) => {
                DirectoryFeed::open(root).latest_package(id, &repository.name)
            }
            FeedLocation::Http(url) => HttpFeed::open(url, self.cache_root.join(&repository.name))
                .latest_package(id, &repository.name),
        }
        .with_context(|| {
            format!(
                "failed loading package '{id}' from repository '{}'",
                repository.name
            )
        })
    }
}

impl RepositoryBrowser for ConfiguredRepositories {
    fn repositories(&self) -> &[RepositoryRecord] {
        &self.repositories
    }

    fn find_package(&self, id: &str) -> Result<Option<Box<dyn PackageHandle>>> {
        let mut last_error = None;
        let mut searched = 0usize;
        for repository in &self.repositories {
            debug!(id, repository = %repository.name, "searching repository");
            match self.search_repository(repository, id) {
                Ok(Some(package)) => return Ok(Some(Box::new(package))),
                Ok(None) => searched += 1,
                Err(err) => {
                    warn!(
                        id,
                        repository = %repository.name,
                        error = %format!("{err:#}"),
                        "skipping repository that could not be searched"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if searched == 0 => Err(err),
            _ => Ok(None),
        }
    }
}


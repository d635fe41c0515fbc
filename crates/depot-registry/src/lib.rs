mod browser;
mod checksum;
mod feed;
mod package;
mod repository_store;

pub use browser::{ConfiguredRepositories, RepositoryBrowser};
pub use checksum::{sha256_hex, sha256_hex_file, verify_sha256_file};
pub use feed::{DirectoryFeed, FeedLocation, HttpFeed, MANIFEST_FILE_NAME, VERSIONS_FILE_NAME};
pub use package::{PackageHandle, ZipPackage};
pub use repository_store::{RepositoryRecord, RepositoryStore};

#[cfg(test)]
mod tests;

use super::*;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use zip::write::SimpleFileOptions;

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("must create archive dir");
    }
    let file = fs::File::create(path).expect("must create archive");
    let mut writer = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .expect("must add directory");
            continue;
        }
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("must start entry");
        writer.write_all(contents).expect("must write entry");
    }
    writer.finish().expect("must finish archive");
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("package.zip");
    write_zip(&path, entries);
    fs::read(path).expect("must read archive")
}

fn publish(
    feed_root: &Path,
    dir_name: &str,
    id: &str,
    version: &str,
    sha256: Option<&str>,
) -> PathBuf {
    let package_dir = feed_root.join(dir_name).join(version);
    fs::create_dir_all(&package_dir).expect("must create package dir");
    let mut manifest = format!("id = \"{id}\"\nversion = \"{version}\"\n");
    if let Some(sha256) = sha256 {
        manifest.push_str(&format!("sha256 = \"{sha256}\"\n"));
    }
    fs::write(package_dir.join(MANIFEST_FILE_NAME), manifest).expect("must write manifest");
    let archive = package_dir.join("package.zip");
    write_zip(
        &archive,
        &[
            ("Install.ps1", b"exit 0".as_slice()),
            ("bin/", b"".as_slice()),
            ("bin/app.dll", version.as_bytes()),
        ],
    );
    archive
}

fn read_all(mut reader: Box<dyn Read>) -> Vec<u8> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).expect("must read");
    out
}

#[test]
fn repository_store_add_rejects_duplicate_name() {
    let root = tempfile::tempdir().expect("must create temp dir");
    let store = RepositoryStore::new(root.path());

    store
        .add(RepositoryRecord::new("local", "/srv/feed", 10))
        .expect("must add repository");
    let err = store
        .add(RepositoryRecord::new("local", "/srv/other", 5))
        .expect_err("must reject duplicate repository name");
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn repository_store_add_rejects_invalid_names() {
    let root = tempfile::tempdir().expect("must create temp dir");
    let store = RepositoryStore::new(root.path());

    let too_long = "a".repeat(65);
    for name in ["", "Bad", "bad name", "-bad", "_bad", too_long.as_str()] {
        let err = store
            .add(RepositoryRecord::new(name, "/srv/feed", 1))
            .expect_err("must reject invalid repository name");
        assert!(
            err.to_string().contains("invalid repository name"),
            "unexpected error for '{name}': {err}"
        );
    }
}

#[test]
fn repository_store_add_rejects_unsupported_scheme() {
    let root = tempfile::tempdir().expect("must create temp dir");
    let store = RepositoryStore::new(root.path());

    let err = store
        .add(RepositoryRecord::new("ftp", "ftp://example.test/feed", 1))
        .expect_err("ftp must be rejected");
    assert!(err.to_string().contains("unsupported repository scheme"));
}

#[test]
fn repository_store_lists_by_priority_then_name() {
    let root = tempfile::tempdir().expect("must create temp dir");
    let store = RepositoryStore::new(root.path());

    store
        .add(RepositoryRecord::new("zeta", "/srv/zeta", 1))
        .expect("must add zeta");
    store
        .add(RepositoryRecord::new("beta", "/srv/beta", 5))
        .expect("must add beta");
    store
        .add(RepositoryRecord::new("alpha", "/srv/alpha", 5))
        .expect("must add alpha");

    let names: Vec<String> = store
        .list()
        .expect("must list repositories")
        .into_iter()
        .map(|repository| repository.name)
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "beta"]);

    let raw = fs::read_to_string(store.file_path()).expect("must read state file");
    assert!(raw.contains("version = 1"));
}

#[test]
fn repository_store_remove_and_disable() {
    let root = tempfile::tempdir().expect("must create temp dir");
    let store = RepositoryStore::new(root.path());

    store
        .add(RepositoryRecord::new("one", "/srv/one", 1))
        .expect("must add one");
    store
        .add(RepositoryRecord::new("two", "/srv/two", 2))
        .expect("must add two");

    store.set_enabled("one", false).expect("must disable one");
    let enabled: Vec<String> = store
        .enabled()
        .expect("must list enabled")
        .into_iter()
        .map(|repository| repository.name)
        .collect();
    assert_eq!(enabled, vec!["two"]);

    store.remove("two").expect("must remove two");
    let err = store.remove("two").expect_err("second remove must fail");
    assert!(err.to_string().contains("not found"));
    assert_eq!(store.list().expect("must list").len(), 1);
}

#[test]
fn repository_store_missing_file_is_empty() {
    let root = tempfile::tempdir().expect("must create temp dir");
    let store = RepositoryStore::new(root.path().join("never-created"));
    assert!(store.list().expect("must list").is_empty());
}

#[test]
fn feed_location_parses_supported_forms() {
    assert_eq!(
        FeedLocation::parse("/srv/feed").expect("plain path"),
        FeedLocation::Directory(PathBuf::from("/srv/feed"))
    );
    assert_eq!(
        FeedLocation::parse("file:///srv/feed").expect("file url"),
        FeedLocation::Directory(PathBuf::from("/srv/feed"))
    );
    assert_eq!(
        FeedLocation::parse("https://example.test/feed/").expect("https url"),
        FeedLocation::Http("https://example.test/feed".to_string())
    );
    assert!(FeedLocation::parse("file://").is_err());
}

#[test]
fn directory_feed_returns_highest_version() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    publish(feed_root.path(), "package.a", "Package.A", "1.0.0", None);
    publish(feed_root.path(), "package.a", "Package.A", "1.10.0", None);
    publish(feed_root.path(), "package.a", "Package.A", "1.2.0.5", None);

    let feed = DirectoryFeed::open(feed_root.path());
    let package = feed
        .latest_package("package.a", "local")
        .expect("lookup must succeed")
        .expect("package must exist");

    assert_eq!(package.reference().id(), "Package.A");
    assert_eq!(package.reference().version().to_string(), "1.10.0");
    assert_eq!(package.source(), Some("local"));
}

#[test]
fn directory_feed_matches_directory_case_insensitively() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    publish(feed_root.path(), "Contoso.Web", "Contoso.Web", "2.0.0", None);

    let feed = DirectoryFeed::open(feed_root.path());
    let package = feed
        .latest_package("CONTOSO.WEB", "local")
        .expect("lookup must succeed");
    assert!(package.is_some());
}

#[test]
fn directory_feed_skips_manifest_with_mismatched_id() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    publish(feed_root.path(), "package.a", "Package.B", "9.0.0", None);
    publish(feed_root.path(), "package.a", "Package.A", "1.0.0", None);

    let feed = DirectoryFeed::open(feed_root.path());
    let manifests = feed
        .package_manifests("Package.A")
        .expect("lookup must succeed");
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].0.version.to_string(), "1.0.0");
}

#[test]
fn directory_feed_skips_unparsable_manifest() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    publish(feed_root.path(), "package.a", "Package.A", "1.0.0", None);
    let corrupt = feed_root.path().join("package.a").join("0.9.0");
    fs::create_dir_all(&corrupt).expect("must create version dir");
    fs::write(corrupt.join(MANIFEST_FILE_NAME), "id = ").expect("must write manifest");

    let feed = DirectoryFeed::open(feed_root.path());
    let package = feed
        .latest_package("Package.A", "local")
        .expect("lookup must succeed")
        .expect("valid version must be found");
    assert_eq!(package.reference().version().to_string(), "1.0.0");
}

#[test]
fn directory_feed_unknown_package_is_none() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    let feed = DirectoryFeed::open(feed_root.path());
    assert!(feed
        .latest_package("missing", "local")
        .expect("lookup must succeed")
        .is_none());
}

#[test]
fn directory_feed_missing_root_is_error() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    let feed = DirectoryFeed::open(feed_root.path().join("absent"));
    let err = feed
        .latest_package("anything", "local")
        .expect_err("missing root must fail");
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn zip_package_lists_files_and_reads_contents() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    publish(feed_root.path(), "demo", "demo", "3.1.0", None);

    let package = DirectoryFeed::open(feed_root.path())
        .latest_package("demo", "local")
        .expect("lookup must succeed")
        .expect("package must exist");

    let mut paths = package.file_paths().expect("must list files");
    paths.sort();
    assert_eq!(paths, vec!["Install.ps1", "bin/app.dll"]);

    let contents = read_all(package.open_file("bin/app.dll").expect("must open entry"));
    assert_eq!(contents, b"3.1.0".as_slice());

    let err = package
        .open_file("missing.txt")
        .err()
        .expect("missing entry must fail");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn zip_package_verifies_declared_sha256() {
    let feed_root = tempfile::tempdir().expect("must create temp dir");
    let archive = publish(feed_root.path(), "demo", "demo", "1.0.0", None);
    let digest = sha256_hex_file(&archive).expect("must hash archive");
    fs::write(
        archive.with_file_name(MANIFEST_FILE_NAME),
        format!("id = \"demo\"\nversion = \"1.0.0\"\nsha256 = \"{digest}\"\n"),
    )
    .expect("must rewrite manifest");

    let feed = DirectoryFeed::open(feed_root.path());
    assert!(feed
        .latest_package("demo", "local")
        .expect("matching digest must pass")
        .is_some());

    let wrong = "0".repeat(64);
    fs::write(
        archive.with_file_name(MANIFEST_FILE_NAME),
        format!("id = \"demo\"\nversion = \"1.0.0\"\nsha256 = \"{wrong}\"\n"),
    )
    .expect("must rewrite manifest");
    let err = feed
        .latest_package("demo", "local")
        .expect_err("mismatched digest must fail");
    assert!(err.to_string().contains("sha256 mismatch"));
}

#[test]
fn sha256_hex_matches_known_digest() {
    assert_eq!(
        sha256_hex(b"".as_slice()),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn configured_repositories_prefer_first_repository_with_package() {
    let first = tempfile::tempdir().expect("must create temp dir");
    let second = tempfile::tempdir().expect("must create temp dir");
    publish(first.path(), "demo", "demo", "1.0.0", None);
    publish(second.path(), "demo", "demo", "5.0.0", None);
    publish(second.path(), "other", "other", "1.0.0", None);

    let cache = tempfile::tempdir().expect("must create temp dir");
    let browser = ConfiguredRepositories::new(
        vec![
            RepositoryRecord::new("second", second.path().display().to_string(), 20),
            RepositoryRecord::new("first", first.path().display().to_string(), 10),
        ],
        cache.path(),
    );

    assert_eq!(browser.repositories()[0].name, "first");

    let demo = browser
        .find_package("demo")
        .expect("lookup must succeed")
        .expect("demo must exist");
    assert_eq!(demo.reference().version().to_string(), "1.0.0");
    assert_eq!(demo.source(), Some("first"));

    let other = browser
        .find_package("other")
        .expect("lookup must succeed")
        .expect("other must exist");
    assert_eq!(other.source(), Some("second"));

    assert!(browser
        .find_package("absent")
        .expect("lookup must succeed")
        .is_none());
}

#[test]
fn configured_repositories_skip_disabled_entries() {
    let feed = tempfile::tempdir().expect("must create temp dir");
    publish(feed.path(), "demo", "demo", "1.0.0", None);

    let mut disabled = RepositoryRecord::new("local", feed.path().display().to_string(), 1);
    disabled.enabled = false;
    let cache = tempfile::tempdir().expect("must create temp dir");
    let browser = ConfiguredRepositories::new(vec![disabled], cache.path());

    assert!(browser.repositories().is_empty());
    assert!(browser
        .find_package("demo")
        .expect("lookup must succeed")
        .is_none());
}

#[test]
fn configured_repositories_continue_past_failing_repository() {
    let missing = tempfile::tempdir().expect("must create temp dir");
    let good = tempfile::tempdir().expect("must create temp dir");
    publish(good.path(), "package.a", "Package.A", "1.0.0", None);

    let cache = tempfile::tempdir().expect("must create temp dir");
    let browser = ConfiguredRepositories::new(
        vec![
            RepositoryRecord::new("aaa", missing.path().join("absent").display().to_string(), 0),
            RepositoryRecord::new("bbb", good.path().display().to_string(), 0),
        ],
        cache.path(),
    );

    let package = browser
        .find_package("Package.A")
        .expect("lookup must succeed")
        .expect("package must be found in second repository");
    assert_eq!(package.source(), Some("bbb"));

    assert!(browser
        .find_package("Package.B")
        .expect("lookup must succeed when one repository was searched")
        .is_none());
}

#[test]
fn configured_repositories_fail_when_every_repository_fails() {
    let missing = tempfile::tempdir().expect("must create temp dir");
    let cache = tempfile::tempdir().expect("must create temp dir");
    let browser = ConfiguredRepositories::new(
        vec![RepositoryRecord::new(
            "aaa",
            missing.path().join("absent").display().to_string(),
            0,
        )],
        cache.path(),
    );

    let err = browser
        .find_package("Package.A")
        .err()
        .expect("every repository failing must be an error");
    assert!(format!("{err:#}").contains("repository 'aaa'"));
}

fn start_http_feed(
    routes: HashMap<String, Vec<u8>>,
    requests: usize,
) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("must bind listener");
    let address = listener.local_addr().expect("must read local addr");
    let handle = thread::spawn(move || {
        for _ in 0..requests {
            let (stream, _) = listener.accept().expect("must accept connection");
            let mut reader = BufReader::new(stream.try_clone().expect("must clone stream"));
            let mut request_line = String::new();
            reader
                .read_line(&mut request_line)
                .expect("must read request line");
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).expect("must read header");
                if header == "\r\n" || header.is_empty() {
                    break;
                }
            }

            let path = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or("/")
                .to_string();
            let mut stream = stream;
            match routes.get(&path) {
                Some(body) => {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    stream.write_all(head.as_bytes()).expect("must write head");
                    stream.write_all(body).expect("must write body");
                }
                None => {
                    stream
                        .write_all(
                            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        )
                        .expect("must write 404");
                }
            }
            stream.flush().expect("must flush");
        }
    });
    (format!("http://{address}/feed"), handle)
}

#[test]
fn http_feed_downloads_latest_version_into_cache() {
    let archive = zip_bytes(&[
        ("Install.ps1", b"exit 0".as_slice()),
        ("app.txt", b"remote".as_slice()),
    ]);
    let digest = sha256_hex(&archive);
    let mut routes = HashMap::new();
    routes.insert(
        "/feed/demo/versions.toml".to_string(),
        b"versions = [\"1.0.0\", \"1.1.0\"]\n".to_vec(),
    );
    routes.insert(
        "/feed/demo/1.1.0/package.toml".to_string(),
        format!("id = \"Demo\"\nversion = \"1.1.0\"\nsha256 = \"{digest}\"\n").into_bytes(),
    );
    routes.insert("/feed/demo/1.1.0/package.zip".to_string(), archive);

    let (url, server) = start_http_feed(routes, 3);
    let cache = tempfile::tempdir().expect("must create temp dir");
    let feed = HttpFeed::open(url, cache.path());

    let package = feed
        .latest_package("Demo", "remote")
        .expect("remote lookup must succeed")
        .expect("package must exist");
    server.join().expect("server thread must join");

    assert_eq!(package.reference().version().to_string(), "1.1.0");
    assert!(cache
        .path()
        .join("demo")
        .join("1.1.0")
        .join("package.zip")
        .is_file());
    let contents = read_all(package.open_file("app.txt").expect("must open entry"));
    assert_eq!(contents, b"remote".as_slice());
}

#[test]
fn http_feed_unknown_package_is_none() {
    let (url, server) = start_http_feed(HashMap::new(), 1);
    let cache = tempfile::tempdir().expect("must create temp dir");
    let feed = HttpFeed::open(url, cache.path());

    let package = feed
        .latest_package("missing", "remote")
        .expect("404 must map to none");
    server.join().expect("server thread must join");
    assert!(package.is_none());
}

//! On-disk cache of remote rule lists.
//!
//! Each source is stored as `<sha1(locator)>_hosts` in the cache directory.
//! New content is written to a temporary file in the same directory and
//! renamed into place, so a concurrent reader sees either the previous file
//! or the complete new one. Entries older than the TTL are renamed to
//! `<name>.expired` and kept for inspection; nothing is deleted.

use crate::domain::model::CacheEntry;
use crate::domain::ports::SourceFetcher;
use crate::utils::error::FetchError;
use sha1::{Digest, Sha1};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use url::Url;

const ENTRY_SUFFIX: &str = "_hosts";
const EXPIRED_SUFFIX: &str = ".expired";

/// Two days, matching how often the large public lists are republished.
pub const DEFAULT_CACHE_EXPIRE: Duration = Duration::from_secs(3600 * 24 * 2);

/// An entry written at `modified` is fresh while `now - modified < ttl`.
pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age < ttl,
        // Timestamp in the future (clock skew): not stale yet.
        Err(_) => true,
    }
}

pub fn cache_key(locator: &str) -> String {
    hex::encode(Sha1::digest(locator.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct SourceCache {
    directory: PathBuf,
    ttl: Duration,
}

impl SourceCache {
    pub fn new(directory: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            directory: directory.into(),
            ttl,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn entry_path(&self, locator: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}", cache_key(locator), ENTRY_SUFFIX))
    }

    pub fn lookup(&self, locator: &str) -> io::Result<Option<CacheEntry>> {
        self.lookup_at(locator, SystemTime::now())
    }

    /// Returns the cached copy if it is fresh at `now`; an expired copy is
    /// renamed out of the way and `None` is returned.
    pub fn lookup_at(&self, locator: &str, now: SystemTime) -> io::Result<Option<CacheEntry>> {
        let path = self.entry_path(locator);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let modified = metadata.modified()?;

        if is_fresh(modified, now, self.ttl) {
            let content = fs::read(&path)?;
            return Ok(Some(CacheEntry {
                key: cache_key(locator),
                content,
                fetched_at: modified,
            }));
        }

        let expired = expired_path(&path);
        tracing::info!("Cached copy of {} expired, moving it to {}", locator, expired.display());
        fs::rename(&path, &expired)?;
        Ok(None)
    }

    /// Writes `content` as the current entry for `locator`, replacing any previous one.
    pub fn store(&self, locator: &str, content: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let path = self.entry_path(locator);

        let mut tmp = NamedTempFile::new_in(&self.directory)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!("Cached {} bytes from {} in {}", content.len(), locator, path.display());
        Ok(path)
    }

    /// Cached content when fresh, otherwise a download through `fetcher`
    /// which then becomes the new cache entry. `force_refresh` skips the lookup
    /// but still stores the download.
    pub async fn fetch(
        &self,
        url: &Url,
        force_refresh: bool,
        fetcher: &dyn SourceFetcher,
    ) -> Result<Vec<u8>, FetchError> {
        let locator = url.as_str();

        if !force_refresh {
            match self.lookup(locator) {
                Ok(Some(entry)) => {
                    let age = SystemTime::now()
                        .duration_since(entry.fetched_at)
                        .unwrap_or_default();
                    tracing::info!(
                        "Using cached copy of {}: {} (fetched {}s ago)",
                        locator,
                        self.entry_path(locator).display(),
                        age.as_secs()
                    );
                    return Ok(entry.content);
                }
                Ok(None) => {}
                Err(source) => {
                    tracing::warn!(
                        "{}",
                        FetchError::Cache {
                            url: locator.to_string(),
                            source,
                        }
                    );
                }
            }
        }

        let content = fetcher.fetch(url).await?;

        if let Err(source) = self.store(locator, &content) {
            tracing::warn!(
                "{}",
                FetchError::Cache {
                    url: locator.to_string(),
                    source,
                }
            );
        }

        Ok(content)
    }
}

fn expired_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(EXPIRED_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::UNIX_EPOCH;
    use tempfile::TempDir;

    const LOCATOR: &str = "https://example.com/hosts.txt";

    struct CountingFetcher {
        body: &'static [u8],
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(body: &'static [u8]) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for CountingFetcher {
        async fn fetch(&self, _url: &Url) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.to_vec())
        }
    }

    fn set_mtime(path: &Path, mtime: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn test_cache_key_is_stable_sha1_hex() {
        let key = cache_key(LOCATOR);
        assert_eq!(key.len(), 40);
        assert_eq!(key, cache_key(LOCATOR));
        assert_ne!(key, cache_key("https://example.com/other.txt"));
    }

    #[test]
    fn test_entry_path_naming() {
        let cache = SourceCache::new("/var/cache/dnsgate", DEFAULT_CACHE_EXPIRE);
        let path = cache.entry_path(LOCATOR);
        assert_eq!(path.parent().unwrap(), Path::new("/var/cache/dnsgate"));
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("{}_hosts", cache_key(LOCATOR))
        );
    }

    #[test]
    fn test_is_fresh_boundary() {
        let written = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let ttl = Duration::from_secs(3600);
        assert!(is_fresh(written, written, ttl));
        assert!(is_fresh(written, written + ttl - Duration::from_secs(1), ttl));
        assert!(!is_fresh(written, written + ttl, ttl));
        assert!(!is_fresh(written, written + ttl + Duration::from_secs(1), ttl));
        assert!(is_fresh(written, written - Duration::from_secs(60), ttl));
    }

    #[test]
    fn test_lookup_missing_entry() {
        let dir = TempDir::new().unwrap();
        let cache = SourceCache::new(dir.path(), DEFAULT_CACHE_EXPIRE);
        assert!(cache.lookup(LOCATOR).unwrap().is_none());
    }

    #[test]
    fn test_store_then_lookup_fresh() {
        let dir = TempDir::new().unwrap();
        let cache = SourceCache::new(dir.path(), DEFAULT_CACHE_EXPIRE);

        let path = cache.store(LOCATOR, b"0.0.0.0 ads.example.com\n").unwrap();
        assert!(path.exists());

        let entry = cache.lookup(LOCATOR).unwrap().unwrap();
        assert_eq!(entry.content, b"0.0.0.0 ads.example.com\n");
        assert_eq!(entry.key, cache_key(LOCATOR));
        assert_eq!(entry.fetched_at, fs::metadata(&path).unwrap().modified().unwrap());
        assert_eq!(cache.directory(), dir.path());
        assert_eq!(cache.ttl(), DEFAULT_CACHE_EXPIRE);

        // Only the entry itself, no leftover temporary files.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_expiry_boundary_renames_entry() {
        let dir = TempDir::new().unwrap();
        let ttl = Duration::from_secs(3600);
        let cache = SourceCache::new(dir.path(), ttl);
        let path = cache.store(LOCATOR, b"cached").unwrap();

        let written = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&path, written);

        let just_before = written + ttl - Duration::from_secs(1);
        assert!(cache.lookup_at(LOCATOR, just_before).unwrap().is_some());
        assert!(path.exists());

        assert!(cache.lookup_at(LOCATOR, written + ttl).unwrap().is_none());
        assert!(!path.exists());
        let expired = expired_path(&path);
        assert_eq!(fs::read(&expired).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_fetch_uses_fresh_cache_without_network() {
        let dir = TempDir::new().unwrap();
        let cache = SourceCache::new(dir.path(), DEFAULT_CACHE_EXPIRE);
        let fetcher = CountingFetcher::new(b"0.0.0.0 fresh.example.com\n");
        let url = Url::parse(LOCATOR).unwrap();

        let first = cache.fetch(&url, false, &fetcher).await.unwrap();
        let second = cache.fetch(&url, false, &fetcher).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_lookup_but_stores() {
        let dir = TempDir::new().unwrap();
        let cache = SourceCache::new(dir.path(), DEFAULT_CACHE_EXPIRE);
        cache.store(LOCATOR, b"stale content").unwrap();

        let fetcher = CountingFetcher::new(b"new content");
        let url = Url::parse(LOCATOR).unwrap();
        let body = cache.fetch(&url, true, &fetcher).await.unwrap();

        assert_eq!(body, b"new content");
        assert_eq!(fetcher.calls(), 1);
        let entry = cache.lookup(LOCATOR).unwrap().unwrap();
        assert_eq!(entry.content, b"new content");
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let dir = TempDir::new().unwrap();
        let ttl = Duration::from_secs(60);
        let cache = SourceCache::new(dir.path(), ttl);
        let path = cache.store(LOCATOR, b"old").unwrap();
        set_mtime(&path, SystemTime::now() - Duration::from_secs(120));

        let fetcher = CountingFetcher::new(b"new");
        let url = Url::parse(LOCATOR).unwrap();
        let body = cache.fetch(&url, false, &fetcher).await.unwrap();

        assert_eq!(body, b"new");
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fs::read(expired_path(&path)).unwrap(), b"old");
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }
}

use crate::domain::model::{OrderedRules, OutputFormat, ReconciliationInput, SourceRef};
use crate::utils::error::{FetchError, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub trait Storage: Send + Sync {
    /// Missing files surface as `DnsgateError::SourceNotFound`.
    fn read_file(&self, path: &Path) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Replaces `path` atomically; readers see the old or the new content, never a mix.
    fn write_file(
        &self,
        path: &Path,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Copies an existing file aside before it is replaced. Returns the copy, if one was made.
    fn backup_file(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Option<std::path::PathBuf>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn mode(&self) -> OutputFormat;
    fn block_at_psl(&self) -> bool;
    fn dest_ip(&self) -> Option<IpAddr>;
    fn sources(&self) -> &[SourceRef];
    fn output_path(&self) -> &Path;
    fn allow_list_path(&self) -> &Path;
    fn block_list_path(&self) -> &Path;
    fn cache_directory(&self) -> &Path;
    fn cache_expire(&self) -> Duration;
    fn backup(&self) -> bool;
}

/// Transport for remote sources.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Maps a fully-qualified name to its registrable domain (public suffix + 1).
///
/// Returns `None` when the name has no registrable part, e.g. it is itself a public suffix.
pub trait PslOracle: Send + Sync {
    fn registrable_domain<'a>(&self, domain: &'a str) -> Option<&'a str>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ReconciliationInput>;
    async fn transform(&self, input: ReconciliationInput) -> Result<OrderedRules>;
    async fn load(&self, rules: OrderedRules) -> Result<String>;
}

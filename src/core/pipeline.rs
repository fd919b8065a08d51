use crate::core::cache::SourceCache;
use crate::core::extract::extract_domains;
use crate::core::fetch::HttpFetcher;
use crate::core::psl::PublicSuffixList;
use crate::core::reconcile::Reconciler;
use crate::core::render::{render, render_block_all, render_header, FileHeader};
use crate::core::sort::group_by_tld;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{
    Extraction, OrderedRules, OutputFormat, ReconciliationInput, RuleFormat, SourceRef,
};
use crate::domain::ports::SourceFetcher;
use crate::utils::error::{DnsgateError, Result};
use crate::utils::validation::validate_psl_mode;
use chrono::Utc;
use std::path::Path;

pub struct BlocklistPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    fetcher: Box<dyn SourceFetcher>,
    cache: SourceCache,
    oracle: PublicSuffixList,
    force_refresh: bool,
}

impl<S: Storage, C: ConfigProvider> BlocklistPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let cache = SourceCache::new(config.cache_directory(), config.cache_expire());
        Ok(Self {
            storage,
            config,
            fetcher: Box::new(HttpFetcher::new()?),
            cache,
            oracle: PublicSuffixList,
            force_refresh: false,
        })
    }

    pub fn with_fetcher(mut self, fetcher: impl SourceFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Ignore cached downloads (they are still refreshed).
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Reads a local rule list. A missing file is reported and treated as empty.
    async fn read_local_list(&self, path: &Path, what: &str) -> Result<Extraction> {
        match self.storage.read_file(path).await {
            Ok(content) => {
                let extraction = extract_domains(&content, RuleFormat::PlainRules);
                tracing::debug!("{} domains from {}", extraction.domains.len(), path.display());
                Ok(extraction)
            }
            Err(DnsgateError::SourceNotFound { path }) => {
                tracing::warn!(
                    "{} list {} is missing, continuing without it. Run \"dnsgate configure --help\" to fix.",
                    what,
                    path.display()
                );
                Ok(Extraction::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn read_source(&self, source: &SourceRef) -> Option<Extraction> {
        match source {
            SourceRef::Remote(url) => {
                match self
                    .cache
                    .fetch(url, self.force_refresh, self.fetcher.as_ref())
                    .await
                {
                    Ok(content) => Some(extract_domains(&content, RuleFormat::Hosts)),
                    Err(e) => {
                        tracing::warn!("Failed to get {}, skipping: {}", url, e);
                        None
                    }
                }
            }
            SourceRef::Local(path) => match self.storage.read_file(path).await {
                Ok(content) => Some(extract_domains(&content, RuleFormat::PlainRules)),
                Err(e) => {
                    tracing::warn!("Failed to read {}, skipping: {}", path.display(), e);
                    None
                }
            },
        }
    }

    fn header(&self) -> FileHeader<'_> {
        FileHeader {
            mode: self.config.mode(),
            block_at_psl: self.config.block_at_psl(),
            dest_ip: self.config.dest_ip(),
            sources: self.config.sources(),
            generated_at: Utc::now(),
        }
    }

    async fn write_output(&self, body: Vec<u8>) -> Result<String> {
        let output = self.config.output_path();

        if self.config.backup() {
            if let Some(copy) = self.storage.backup_file(output).await? {
                tracing::info!("Backed up {} to {}", output.display(), copy.display());
            }
        }

        let mut data = render_header(&self.header());
        data.extend_from_slice(&body);

        tracing::info!(
            "Writing output file: {} in {} format",
            output.display(),
            self.config.mode()
        );
        self.storage.write_file(output, &data).await?;
        Ok(output.display().to_string())
    }

    /// Writes a single rule that blocks every name. dnsmasq only.
    pub async fn load_block_all(&self) -> Result<String> {
        if self.config.mode() != OutputFormat::Dnsmasq {
            return Err(DnsgateError::config(
                "blockall is only available with mode = \"dnsmasq\"",
            ));
        }
        self.write_output(render_block_all(self.config.dest_ip())).await
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for BlocklistPipeline<S, C> {
    async fn extract(&self) -> Result<ReconciliationInput> {
        // Rejected before any file or network access.
        validate_psl_mode(self.config.mode(), self.config.block_at_psl())?;

        let mut input = ReconciliationInput {
            collapse_to_psl: self.config.block_at_psl(),
            ..ReconciliationInput::default()
        };

        let allow = self.read_local_list(self.config.allow_list_path(), "Allow").await?;
        tracing::info!("{} validated allow-listed domains.", allow.domains.len());
        input.rejected += allow.rejected;
        input.allow = allow.domains;

        if input.collapse_to_psl && input.allow.is_empty() {
            tracing::warn!(
                "block_at_psl is enabled and 0 domains were obtained from {}. If you get \"Domain Not Found\" errors, use \"dnsgate allow\".",
                self.config.allow_list_path().display()
            );
        }

        let sources = self.config.sources();
        tracing::info!("Reading {} blacklist source(s)", sources.len());
        tracing::debug!(
            "Cache directory {}, entries expire after {}s{}",
            self.cache.directory().display(),
            self.cache.ttl().as_secs(),
            if self.force_refresh { " (ignored for this run)" } else { "" }
        );
        for source in sources {
            if let Some(extraction) = self.read_source(source).await {
                tracing::debug!(
                    "{} domains ({} rejected) from {}",
                    extraction.domains.len(),
                    extraction.rejected,
                    source
                );
                input.rejected += extraction.rejected;
                input.remote.extend(extraction.domains);
            }
        }
        tracing::info!("{} domains from blacklist source(s).", input.remote.len());

        if input.remote.is_empty() {
            tracing::warn!(
                "0 domains were retrieved from the configured sources, only the local block list {} will be used.",
                self.config.block_list_path().display()
            );
        }

        let block = self.read_local_list(self.config.block_list_path(), "Block").await?;
        tracing::info!("{} validated locally blocked domains.", block.domains.len());
        input.rejected += block.rejected;
        input.block = block.domains;

        if input.rejected > 0 {
            tracing::warn!("Skipped {} entries that are not valid domains.", input.rejected);
        }

        Ok(input)
    }

    async fn transform(&self, input: ReconciliationInput) -> Result<OrderedRules> {
        let result = Reconciler::new(&self.oracle).reconcile(&input);

        if result.domains.is_empty() {
            return Err(DnsgateError::EmptyRuleSet);
        }

        let domains = group_by_tld(&result.domains);
        tracing::info!("Final blacklisted domain count: {}", domains.len());

        Ok(OrderedRules {
            domains,
            stages: result.stages,
        })
    }

    async fn load(&self, rules: OrderedRules) -> Result<String> {
        let body = render(&rules.domains, self.config.mode(), self.config.dest_ip());
        self.write_output(body).await
    }
}

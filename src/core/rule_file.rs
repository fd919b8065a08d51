//! Editing the local allow and block lists.

use crate::core::canonical::canonicalize;
use crate::core::extract::extract_domains;
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::{DomainKey, RuleFormat};
use crate::utils::error::{DnsgateError, Result};
use crate::utils::validation::Validate;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Allow,
    Block,
}

pub const ALLOW_LIST_HEADER: &str = "\
# dnsgate allow list
# One domain per line. Matching entries are removed from the downloaded lists.
# Domains in the block list are blocked even when they appear here.
";

pub const BLOCK_LIST_HEADER: &str = "\
# dnsgate block list
# One domain per line. Always blocked, regardless of the allow list.
";

/// Creates `path` containing only `header` if it does not exist yet.
pub async fn ensure_rule_file<S: Storage>(storage: &S, path: &Path, header: &str) -> Result<bool> {
    match storage.read_file(path).await {
        Ok(_) => Ok(false),
        Err(DnsgateError::SourceNotFound { .. }) => {
            storage.write_file(path, header.as_bytes()).await?;
            tracing::info!("Created {}", path.display());
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

/// Appends `domain` unless the list already contains it. Returns whether the file changed.
pub async fn add_domain<S: Storage>(storage: &S, path: &Path, domain: &DomainKey) -> Result<bool> {
    let mut content = match storage.read_file(path).await {
        Ok(content) => content,
        Err(DnsgateError::SourceNotFound { .. }) => Vec::new(),
        Err(e) => return Err(e),
    };

    if extract_domains(&content, RuleFormat::PlainRules)
        .domains
        .contains(domain)
    {
        tracing::info!("{} is already in {}", domain, path.display());
        return Ok(false);
    }

    if !content.is_empty() && !content.ends_with(b"\n") {
        content.push(b'\n');
    }
    content.extend_from_slice(domain.as_str().as_bytes());
    content.push(b'\n');

    storage.write_file(path, &content).await?;
    tracing::info!("Added {} to {}", domain, path.display());
    Ok(true)
}

/// Canonicalizes `domains` and appends them to the allow or block list named by
/// `config`. The configuration is validated before any file is touched. Invalid
/// entries are reported and skipped; it is an error only if none was valid.
/// Returns how many domains were added.
pub async fn add_domains<S, C>(
    storage: &S,
    config: &C,
    kind: ListKind,
    domains: &[String],
) -> Result<usize>
where
    S: Storage,
    C: ConfigProvider + Validate,
{
    config.validate()?;

    let list = match kind {
        ListKind::Allow => config.allow_list_path(),
        ListKind::Block => config.block_list_path(),
    };

    let mut last_invalid = None;
    let mut accepted = 0;
    let mut added = 0;

    for raw in domains {
        match canonicalize(raw) {
            Ok(domain) => {
                accepted += 1;
                if add_domain(storage, list, &domain).await? {
                    added += 1;
                }
            }
            Err(e) => {
                tracing::warn!("{}", e);
                last_invalid = Some(e);
            }
        }
    }

    match last_invalid {
        Some(e) if accepted == 0 => Err(e.into()),
        _ => Ok(added),
    }
}

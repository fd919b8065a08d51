use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;
use url::Url;

/// A canonical domain name: lowercase, IDNA (punycode) encoded, no empty
/// labels, never empty and never containing whitespace.
///
/// Only the canonicalizer (`core::canonical`) constructs these, so holding a
/// `DomainKey` is proof the value passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainKey(String);

impl DomainKey {
    pub(crate) fn from_canonical(canonical: String) -> Self {
        debug_assert!(!canonical.is_empty());
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Labels in written order, `a.b.com` -> `a`, `b`, `com`.
    pub fn labels(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.split('.')
    }

    /// Strict ancestors, TLD first: `a.b.com` -> `com`, `b.com`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.0.rmatch_indices('.').map(move |(i, _)| &self.0[i + 1..])
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash/Eq are those of the inner String, so lookups by &str are consistent.
impl Borrow<str> for DomainKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

pub type DomainSet = HashSet<DomainKey>;

/// Where a rule list comes from. Remote locators are cached, local paths are read directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceRef {
    Remote(Url),
    Local(PathBuf),
}

impl SourceRef {
    pub fn locator(&self) -> String {
        match self {
            SourceRef::Remote(url) => url.as_str().to_string(),
            SourceRef::Local(path) => path.display().to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Remote(_))
    }
}

impl FromStr for SourceRef {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return Url::parse(s.trim()).map(SourceRef::Remote);
        }
        let path = s.trim().strip_prefix("file://").unwrap_or(s.trim());
        Ok(SourceRef::Local(PathBuf::from(path)))
    }
}

impl TryFrom<String> for SourceRef {
    type Error = url::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceRef> for String {
    fn from(source: SourceRef) -> Self {
        source.locator()
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator())
    }
}

/// Textual shape of a rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    /// `<address> <domain> [# comment]`
    Hosts,
    /// One domain per line, `#` starts a comment.
    PlainRules,
}

/// Shape of the generated rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Dnsmasq,
    Hosts,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Dnsmasq => f.write_str("dnsmasq"),
            OutputFormat::Hosts => f.write_str("hosts"),
        }
    }
}

/// A cached download. Superseded by a new file on refetch, never edited in place.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub content: Vec<u8>,
    pub fetched_at: SystemTime,
}

/// Domains parsed out of one rule list, with the number of tokens that failed canonicalization.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub domains: DomainSet,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationInput {
    pub remote: DomainSet,
    pub allow: DomainSet,
    pub block: DomainSet,
    pub collapse_to_psl: bool,
    /// Tokens dropped while building the sets above.
    pub rejected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub remote: usize,
    pub rejected: usize,
    pub collapsed: Option<usize>,
    pub readded: usize,
    pub after_allow: usize,
    pub after_block: usize,
    pub pruned: usize,
    pub final_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    pub domains: DomainSet,
    pub stages: StageCounts,
    /// Allow-listed domains whose registrable domain is still blocked.
    pub shadowed_allow: Vec<DomainKey>,
}

/// The final rule list in presentation order.
#[derive(Debug, Clone, Default)]
pub struct OrderedRules {
    pub domains: Vec<DomainKey>,
    pub stages: StageCounts,
}

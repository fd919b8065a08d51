use crate::core::ConfigProvider;
use crate::domain::model::{OutputFormat, SourceRef};
use crate::utils::error::{DnsgateError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_psl_mode, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/dnsgate/config.toml";
pub const DEFAULT_OUTPUT_FILE: &str = "/etc/dnsgate/generated_blacklist";
pub const DEFAULT_ALLOW_LIST: &str = "/etc/dnsgate/whitelist";
pub const DEFAULT_BLOCK_LIST: &str = "/etc/dnsgate/blacklist";
pub const DEFAULT_CACHE_DIRECTORY: &str = "/var/cache/dnsgate";
pub const DEFAULT_CACHE_EXPIRE_SECONDS: u64 = 3600 * 24 * 2;

pub const DEFAULT_REMOTE_BLACKLISTS: [&str; 3] = [
    "http://winhelp2002.mvps.org/hosts.txt",
    "http://someonewhocares.org/hosts/hosts",
    "https://adaway.org/hosts.txt",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsgateConfig {
    pub mode: OutputFormat,
    #[serde(default)]
    pub block_at_psl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<IpAddr>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceRef>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub lists: ListsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_cache_expire")]
    pub expire_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListsConfig {
    #[serde(default = "default_allow_list")]
    pub allow: PathBuf,
    #[serde(default = "default_block_list")]
    pub block: PathBuf,
}

fn default_sources() -> Vec<SourceRef> {
    DEFAULT_REMOTE_BLACKLISTS
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIRECTORY)
}

fn default_cache_expire() -> u64 {
    DEFAULT_CACHE_EXPIRE_SECONDS
}

fn default_allow_list() -> PathBuf {
    PathBuf::from(DEFAULT_ALLOW_LIST)
}

fn default_block_list() -> PathBuf {
    PathBuf::from(DEFAULT_BLOCK_LIST)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            expire_seconds: default_cache_expire(),
        }
    }
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            allow: default_allow_list(),
            block: default_block_list(),
        }
    }
}

impl DnsgateConfig {
    pub fn new(mode: OutputFormat) -> Self {
        Self {
            mode,
            block_at_psl: false,
            dest_ip: None,
            sources: default_sources(),
            output: default_output(),
            backup: false,
            cache: CacheConfig::default(),
            lists: ListsConfig::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DnsgateError::MissingConfigError {
                    field: path.display().to_string(),
                })
            }
            Err(e) => return Err(DnsgateError::IoError(e)),
        };
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the value of the environment variable; unknown variables are left as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DnsgateError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_psl_mode(self.mode, self.block_at_psl)?;

        for source in &self.sources {
            match source {
                SourceRef::Remote(url) => validate_url("sources", url.as_str())?,
                SourceRef::Local(path) => validate_path("sources", &path.to_string_lossy())?,
            }
        }

        validate_path("output", &self.output.to_string_lossy())?;
        validate_path("lists.allow", &self.lists.allow.to_string_lossy())?;
        validate_path("lists.block", &self.lists.block.to_string_lossy())?;
        validate_path("cache.directory", &self.cache.directory.to_string_lossy())?;
        validate_positive_number("cache.expire_seconds", self.cache.expire_seconds, 1)?;

        if self.sources.is_empty() {
            tracing::warn!("No sources configured, only the local block list will be used.");
        }

        Ok(())
    }
}

impl ConfigProvider for DnsgateConfig {
    fn mode(&self) -> OutputFormat {
        self.mode
    }

    fn block_at_psl(&self) -> bool {
        self.block_at_psl
    }

    fn dest_ip(&self) -> Option<IpAddr> {
        self.dest_ip
    }

    fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    fn output_path(&self) -> &Path {
        &self.output
    }

    fn allow_list_path(&self) -> &Path {
        &self.lists.allow
    }

    fn block_list_path(&self) -> &Path {
        &self.lists.block
    }

    fn cache_directory(&self) -> &Path {
        &self.cache.directory
    }

    fn cache_expire(&self) -> Duration {
        Duration::from_secs(self.cache.expire_seconds)
    }

    fn backup(&self) -> bool {
        self.backup
    }
}

impl Validate for DnsgateConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::domain::model::OutputFormat;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use std::net::IpAddr;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "dnsgate")]
#[command(version, about = "Build DNS blocklists for dnsmasq or /etc/hosts")]
pub struct CliConfig {
    #[arg(long, global = true, default_value = toml_config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write the configuration file and create empty allow/block lists
    Configure {
        /// Remote (http/https) or local rule lists; defaults to the built-in blacklists
        sources: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Dnsmasq)]
        mode: OutputFormat,

        /// Block whole registrable domains (dnsmasq only)
        #[arg(long)]
        block_at_psl: bool,

        /// Answer blocked names with this address instead of NXDOMAIN
        #[arg(long)]
        dest_ip: Option<IpAddr>,

        #[arg(long)]
        output: Option<PathBuf>,

        /// Keep a timestamped copy of the previous output
        #[arg(long)]
        backup: bool,
    },

    /// Download sources and write the rule file
    Generate {
        /// Ignore cached downloads
        #[arg(long)]
        no_cache: bool,

        /// Override the cache lifetime in seconds
        #[arg(long)]
        cache_expire: Option<u64>,

        /// Report what would be written without touching the output
        #[arg(long)]
        dry_run: bool,
    },

    /// Add domains to the allow list and regenerate
    Allow {
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Add domains to the block list and regenerate
    Block {
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Block every domain (dnsmasq only)
    Blockall,

    /// Show how to wire the output into dnsmasq or /etc/hosts
    InstallHelp,
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate() {
        let cli = CliConfig::try_parse_from([
            "dnsgate",
            "--verbose",
            "generate",
            "--no-cache",
            "--cache-expire",
            "60",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from(toml_config::DEFAULT_CONFIG_FILE));
        assert!(matches!(
            cli.command,
            Command::Generate {
                no_cache: true,
                cache_expire: Some(60),
                dry_run: false
            }
        ));
    }

    #[test]
    fn test_parse_configure() {
        let cli = CliConfig::try_parse_from([
            "dnsgate",
            "configure",
            "https://adaway.org/hosts.txt",
            "--mode",
            "hosts",
            "--dest-ip",
            "0.0.0.0",
            "--config",
            "/tmp/dnsgate.toml",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/tmp/dnsgate.toml"));
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Configure {
                sources,
                mode,
                dest_ip,
                ..
            } => {
                assert_eq!(sources, vec!["https://adaway.org/hosts.txt"]);
                assert_eq!(mode, OutputFormat::Hosts);
                assert_eq!(dest_ip, Some("0.0.0.0".parse().unwrap()));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_allow_requires_a_domain() {
        assert!(CliConfig::try_parse_from(["dnsgate", "allow"]).is_err());
        assert!(CliConfig::try_parse_from(["dnsgate", "configure", "--mode", "bind"]).is_err());
    }
}

use clap::Parser;
use dnsgate::config::toml_config::{DnsgateConfig, DEFAULT_OUTPUT_FILE};
use dnsgate::config::{Command, LogFormat};
use dnsgate::core::rule_file::{
    add_domains, ensure_rule_file, ListKind, ALLOW_LIST_HEADER, BLOCK_LIST_HEADER,
};
use dnsgate::domain::model::{OutputFormat, SourceRef, StageCounts};
use dnsgate::utils::error::{DnsgateError, ErrorSeverity, Result};
use dnsgate::utils::{logger, validation::Validate};
use dnsgate::{BlocklistPipeline, CliConfig, ConfigProvider, GenerateEngine, LocalStorage, Storage};
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "dnsgate failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("Error: {}", e.user_friendly_message());
        eprintln!("Hint: {}", e.recovery_suggestion());
        std::process::exit(exit_code(&e));
    }

    Ok(())
}

fn exit_code(e: &DnsgateError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    match cli.command {
        Command::Configure {
            sources,
            mode,
            block_at_psl,
            dest_ip,
            output,
            backup,
        } => {
            let mut config = DnsgateConfig::new(mode);
            if !sources.is_empty() {
                config.sources = parse_sources(&sources)?;
            }
            config.block_at_psl = block_at_psl;
            config.dest_ip = dest_ip;
            config.backup = backup;
            if let Some(output) = output {
                config.output = output;
            }
            configure(&cli.config, &config).await
        }
        Command::Generate {
            no_cache,
            cache_expire,
            dry_run,
        } => {
            let mut config = DnsgateConfig::from_file(&cli.config)?;
            if let Some(seconds) = cache_expire {
                config.cache.expire_seconds = seconds;
            }
            generate(config, no_cache, dry_run).await
        }
        Command::Allow { domains } => {
            let config = DnsgateConfig::from_file(&cli.config)?;
            add_domains(&LocalStorage::default(), &config, ListKind::Allow, &domains).await?;
            generate(config, false, false).await
        }
        Command::Block { domains } => {
            let config = DnsgateConfig::from_file(&cli.config)?;
            add_domains(&LocalStorage::default(), &config, ListKind::Block, &domains).await?;
            generate(config, false, false).await
        }
        Command::Blockall => {
            let config = DnsgateConfig::from_file(&cli.config)?;
            config.validate()?;
            let pipeline = BlocklistPipeline::new(LocalStorage::default(), config)?;
            let output = pipeline.load_block_all().await?;
            println!("All domains are now blocked by {}", output);
            println!("Run \"dnsgate generate\" to go back to the regular lists.");
            Ok(())
        }
        Command::InstallHelp => {
            let config = DnsgateConfig::from_file(&cli.config).ok();
            print_install_help(config.as_ref());
            Ok(())
        }
    }
}

fn parse_sources(sources: &[String]) -> Result<Vec<SourceRef>> {
    sources
        .iter()
        .map(|s| {
            s.parse::<SourceRef>()
                .map_err(|e| DnsgateError::ConfigValidationError {
                    field: "sources".to_string(),
                    message: format!("{}: {}", s, e),
                })
        })
        .collect()
}

async fn configure(path: &Path, config: &DnsgateConfig) -> Result<()> {
    config.validate()?;

    let storage = LocalStorage::default();
    storage
        .write_file(path, config.to_toml_string()?.as_bytes())
        .await?;
    tracing::info!("Configuration written to {}", path.display());

    ensure_rule_file(&storage, config.allow_list_path(), ALLOW_LIST_HEADER).await?;
    ensure_rule_file(&storage, config.block_list_path(), BLOCK_LIST_HEADER).await?;

    println!("Configuration written to {}", path.display());
    println!("Run \"dnsgate generate\" to build {}", config.output_path().display());
    Ok(())
}

async fn generate(config: DnsgateConfig, no_cache: bool, dry_run: bool) -> Result<()> {
    config.validate()?;
    if dry_run {
        display_config_summary(&config);
    }

    let pipeline = BlocklistPipeline::new(LocalStorage::default(), config)?
        .with_force_refresh(no_cache);
    let engine = GenerateEngine::new(pipeline);

    if dry_run {
        let rules = engine.dry_run().await?;
        display_stage_counts(&rules.stages);
        println!(
            "Dry run: {} rules would be written to {}",
            rules.domains.len(),
            engine.pipeline().config().output_path().display()
        );
        return Ok(());
    }

    let output_path = engine.run().await?;
    println!("Rules written to {}", output_path);
    Ok(())
}

fn display_config_summary(config: &DnsgateConfig) {
    println!("Configuration Summary:");
    println!("  Mode: {}", config.mode());
    println!("  Block at PSL: {}", config.block_at_psl());
    if let Some(ip) = config.dest_ip() {
        println!("  Destination IP: {}", ip);
    }
    println!("  Output: {}", config.output_path().display());
    println!("  Allow list: {}", config.allow_list_path().display());
    println!("  Block list: {}", config.block_list_path().display());
    println!(
        "  Cache: {} ({}s)",
        config.cache_directory().display(),
        config.cache_expire().as_secs()
    );
    for source in config.sources() {
        println!("  Source: {}", source);
    }
}

fn display_stage_counts(stages: &StageCounts) {
    println!("Stage counts:");
    println!("  Remote domains: {}", stages.remote);
    println!("  Invalid entries dropped: {}", stages.rejected);
    if let Some(collapsed) = stages.collapsed {
        println!("  After PSL collapse: {}", collapsed);
        println!("  Re-added subdomains: {}", stages.readded);
    }
    println!("  After allow list: {}", stages.after_allow);
    println!("  After block list: {}", stages.after_block);
    println!("  Redundant rules pruned: {}", stages.pruned);
    println!("  Final: {}", stages.final_count);
}

fn print_install_help(config: Option<&DnsgateConfig>) {
    let output = config
        .map(|c| c.output_path().display().to_string())
        .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
    let mode = config.map(|c| c.mode());

    if mode != Some(OutputFormat::Hosts) {
        println!("dnsmasq:");
        println!("  1. Add this line to /etc/dnsmasq.conf:");
        println!("       conf-file={}", output);
        println!("  2. Restart dnsmasq, e.g. \"systemctl restart dnsmasq\".");
        println!();
    }
    if mode != Some(OutputFormat::Dnsmasq) {
        println!("hosts:");
        println!("  1. Keep a copy of your own entries: cp /etc/hosts /etc/hosts.local");
        println!("  2. After each run: cat /etc/hosts.local {} > /etc/hosts", output);
        println!();
    }
    println!("To refresh the lists daily, add to root's crontab:");
    println!("  0 4 * * * dnsgate generate --log-format json");
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docorm::config::{CacheStrategy, ConnectionSettings, HostConfig, OrmConfig, PersisterKind, PersisterStrategy};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docorm")]
#[command(about = "Configuration tooling for the docorm entity registry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a configuration file and print what it resolves to
    CheckConfig { path: PathBuf },
    /// Print a starter configuration
    SampleConfig {
        #[arg(long, default_value = "app::entity")]
        package: String,
        #[arg(long, default_value = "docorm")]
        database: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { path } => check_config(&path),
        Command::SampleConfig { package, database } => sample_config(&package, &database),
    }
}

fn check_config(path: &Path) -> Result<()> {
    let config = OrmConfig::from_path(path).with_context(|| format!("invalid configuration {}", path.display()))?;
    let settings = ConnectionSettings::from_host(&config.host)?;

    println!("entity package: {}", config.entity_package);
    println!("store:          {}", settings.to_url());
    println!("pool size:      {}..={}", settings.min_pool_size, settings.max_pool_size);

    println!("\ncache strategies:");
    if config.caches.is_empty() {
        println!("  (none)");
    }
    for cache in &config.caches {
        let size = if cache.size == 0 {
            "unbounded".to_string()
        } else {
            cache.size.to_string()
        };
        let expiry = if cache.expire_millis == 0 {
            "never".to_string()
        } else {
            format!("{}ms", cache.expire_millis)
        };
        println!("  {:<16} size={:<10} expire={}", cache.strategy, size, expiry);
    }

    println!("\npersister strategies:");
    if config.persisters.is_empty() {
        println!("  (none)");
    }
    for persister in &config.persisters {
        println!("  {:<16} {:?}", persister.strategy, persister.kind);
    }
    Ok(())
}

fn sample_config(package: &str, database: &str) -> Result<()> {
    let config = OrmConfig::new(package)
        .host(HostConfig::new(database).address("primary", "localhost:27017"))
        .cache(CacheStrategy::new("default", 10_000, 600_000))
        .persister(PersisterStrategy::new("default", PersisterKind::WriteThrough));
    config.validate()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

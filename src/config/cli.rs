use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, builder::BoolishValueParser};
use uuid::Uuid;

use crate::domain::kinds::ResourceKind;

/// Command-line arguments for the Folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio content repository")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Check database and cache connectivity.
    Health,
    /// Apply pending database migrations.
    Migrate,
    /// Cache maintenance.
    Cache(CacheArgs),
    /// Fetch one record by id or slug.
    Get(GetArgs),
    /// List one page of records.
    List(ListArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "cache-redis-url", value_name = "URL", global = true)]
    pub cache_redis_url: Option<String>,

    /// Enable or disable the cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Bypass the cache for detail-by-slug reads.
    #[arg(
        long = "cache-freshness-mode",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_freshness_mode: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Drop every cached entry of the given kinds (all kinds when none given).
    Purge(PurgeArgs),
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    #[arg(long = "kind", value_name = "KIND")]
    pub kinds: Vec<ResourceKind>,
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("lookup").required(true).args(["id", "slug"])))]
pub struct GetArgs {
    #[arg(value_name = "KIND")]
    pub kind: ResourceKind,

    #[arg(long)]
    pub id: Option<Uuid>,

    #[arg(long)]
    pub slug: Option<String>,

    /// Read as a privileged caller (no public status gate).
    #[arg(long)]
    pub privileged: bool,

    /// Resolve deleted records too; implies `--privileged`.
    #[arg(long = "include-deleted", requires = "id")]
    pub include_deleted: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[arg(value_name = "KIND")]
    pub kind: ResourceKind,

    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long)]
    pub limit: Option<u32>,

    /// Kind-specific filter as `name=value`; may be repeated.
    #[arg(long = "filter", value_name = "NAME=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub privileged: bool,

    /// Keep deleted records in the page; implies `--privileged`.
    #[arg(long = "include-deleted")]
    pub include_deleted: bool,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("filter `{raw}` has no name"));
    }
    Ok((name.to_string(), value.to_string()))
}

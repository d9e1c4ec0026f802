use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use uuid::Uuid;

use crate::domain::api_keys::ApiScope;

/// Command-line arguments for the Memoria binary.
#[derive(Debug, Parser)]
#[command(name = "memoria", version, about = "Memoria media journal server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MEMORIA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and storage server.
    Serve(Box<ServeArgs>),
    /// Manage API keys.
    #[command(name = "keys")]
    Keys(KeysArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the object storage directory.
    #[arg(long = "storage-directory", value_name = "PATH")]
    pub storage_directory: Option<PathBuf>,

    /// Override the storage bucket name.
    #[arg(long = "storage-bucket", value_name = "NAME")]
    pub storage_bucket: Option<String>,

    /// Override the base URL public object links are built from.
    #[arg(long = "storage-public-base-url", value_name = "URL")]
    pub storage_public_base_url: Option<String>,

    /// Override the maximum request size for media submissions in bytes.
    #[arg(long = "storage-max-request-bytes", value_name = "BYTES")]
    pub storage_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct KeysArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(subcommand)]
    pub command: KeysCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum KeysCommand {
    /// Issue a key acting as the given owner. The token is printed once.
    Issue(IssueKeyArgs),
    /// List keys, optionally for one owner.
    List(ListKeysArgs),
    /// Revoke a key by id.
    Revoke(RevokeKeyArgs),
}

#[derive(Debug, Args, Clone)]
pub struct IssueKeyArgs {
    /// Owner the key authenticates as.
    #[arg(long, value_name = "UUID")]
    pub owner: Uuid,

    /// Human readable key name.
    #[arg(long, value_name = "NAME")]
    pub name: String,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Scopes to grant; defaults to all.
    #[arg(long = "scope", value_name = "SCOPE", value_parser = parse_scope)]
    pub scopes: Vec<ApiScope>,

    /// Lifetime in days; keys never expire when omitted.
    #[arg(long = "expires-in-days", value_name = "DAYS")]
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct ListKeysArgs {
    #[arg(long, value_name = "UUID")]
    pub owner: Option<Uuid>,
}

#[derive(Debug, Args, Clone)]
pub struct RevokeKeyArgs {
    #[arg(value_name = "KEY_ID")]
    pub id: Uuid,
}

fn parse_scope(raw: &str) -> Result<ApiScope, String> {
    raw.parse::<ApiScope>().map_err(|_| {
        let known: Vec<&str> = ApiScope::all().iter().map(|scope| scope.as_str()).collect();
        format!("unknown scope `{raw}` (expected one of {})", known.join(", "))
    })
}

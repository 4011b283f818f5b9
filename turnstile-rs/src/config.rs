use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::token::DEFAULT_TTL_HOURS;

#[derive(Debug, Parser)]
#[command(
    name = "turnstile-rs",
    version,
    about = "Minimal auth gatekeeper with a persistent visit counter"
)]
pub struct Cli {
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Token signing secret. Prefer TURNSTILE_SECRET over passing this on
    /// the command line.
    #[arg(long, value_name = "SECRET")]
    pub secret: Option<String>,

    #[arg(long, value_name = "HOURS")]
    pub token_ttl_hours: Option<i64>,

    #[arg(long, value_name = "COST")]
    pub bcrypt_cost: Option<u32>,

    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub database_url: String,
    pub secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error(
        "no signing secret configured; set TURNSTILE_SECRET, --secret, or `secret` in the config file"
    )]
    MissingSecret,
    #[error("invalid value for env var {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    secret: Option<String>,
    token_ttl_hours: Option<i64>,
    bcrypt_cost: Option<u32>,
}

#[derive(Debug, Default)]
struct EnvOverrides {
    database_url: Option<String>,
    secret: Option<String>,
}

impl AppConfig {
    /// Merge configuration sources: CLI > environment > config file > default.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let from_file = read_file_config(cli.config.as_deref())?;
        let env = EnvOverrides {
            database_url: read_env_string("TURNSTILE_DATABASE_URL")?,
            secret: read_env_string("TURNSTILE_SECRET")?,
        };
        Self::merge(cli, from_file, env)
    }

    fn merge(cli: Cli, file: FileConfig, env: EnvOverrides) -> Result<Self, ConfigError> {
        let bind = cli
            .bind
            .or(file.bind)
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
        let database_url = cli
            .database_url
            .or(env.database_url)
            .or(file.database_url)
            .unwrap_or_else(|| String::from("sqlite://turnstile.db"));
        let secret = cli
            .secret
            .or(env.secret)
            .or(file.secret)
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let token_ttl_hours = cli
            .token_ttl_hours
            .or(file.token_ttl_hours)
            .unwrap_or(DEFAULT_TTL_HOURS)
            .max(1);
        let bcrypt_cost = cli
            .bcrypt_cost
            .or(file.bcrypt_cost)
            .unwrap_or(bcrypt::DEFAULT_COST);

        Ok(Self {
            bind,
            database_url,
            secret,
            token_ttl_hours,
            bcrypt_cost,
        })
    }
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn read_env_string(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnv {
            key: String::from(key),
            value: String::from("<non-unicode>"),
        }),
    }
}

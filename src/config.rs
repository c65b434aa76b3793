use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Simple Storage Service: an S3-style object store on local disk")]
pub struct Args {
    /// Host to bind to (overrides TRIPLE_S_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port number (overrides TRIPLE_S_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to the storage directory (overrides TRIPLE_S_DIR)
    #[arg(long = "dir")]
    pub storage_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Merge already-parsed CLI args over the environment and defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("TRIPLE_S_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("TRIPLE_S_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing TRIPLE_S_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading TRIPLE_S_PORT"),
        };
        let env_storage = env::var_os("TRIPLE_S_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_parse() {
        let args = Args::try_parse_from(["triple-s", "--port", "9000", "--dir", "/srv/s3"]).unwrap();
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.storage_dir, Some(PathBuf::from("/srv/s3")));
        assert_eq!(args.host, None);
    }

    #[test]
    fn cli_values_win_over_environment() {
        let cfg = AppConfig::from_args(Args {
            host: Some("127.0.0.1".into()),
            port: Some(9100),
            storage_dir: Some(PathBuf::from("store")),
        })
        .unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:9100");
        assert_eq!(cfg.storage_dir, PathBuf::from("store"));
    }

    #[test]
    fn rejects_non_numeric_port_flag() {
        assert!(Args::try_parse_from(["triple-s", "--port", "http"]).is_err());
    }
}

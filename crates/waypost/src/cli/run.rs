use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use waypost_core::config::WaypostConfig;

use crate::runtime::Waypost;

const DEFAULT_CONFIG_PATH: &str = "waypost.toml";

/// Run the registry server.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path. `waypost.toml` is used when present.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Lease timeout in seconds (overrides config). Services that miss
    /// heartbeats for this long are deregistered.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Enable verbose logging.
    #[arg(long)]
    pub dev: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;

        let log_level = if self.dev {
            "debug"
        } else {
            config.logging.level.as_str()
        };
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
            )
            .init();

        println!();
        println!(
            "  {} v{}",
            style("waypost").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  Listening on {}",
            style(format!("http://{}:{}", config.server.host, config.server.port)).cyan()
        );
        println!(
            "  Lease timeout {}s",
            style(config.registry.lease_timeout_secs).cyan()
        );
        println!();

        let waypost = Waypost::builder().config(config).build()?;
        waypost.run().await?;

        info!("Goodbye");
        Ok(())
    }

    /// Load the configuration file and apply command-line overrides.
    pub fn load_config(&self) -> Result<WaypostConfig> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                WaypostConfig::from_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                WaypostConfig::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => WaypostConfig::default(),
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(timeout) = self.timeout {
            config.registry.lease_timeout_secs = timeout;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn command(config: Option<PathBuf>) -> RunCommand {
        RunCommand {
            config,
            port: None,
            host: None,
            timeout: None,
            dev: false,
        }
    }

    #[test]
    fn test_load_config_from_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 5000\n\n[registry]\nlease_timeout_secs = 12"
        )
        .unwrap();

        let mut cmd = command(Some(file.path().to_path_buf()));
        let config = cmd.load_config().unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.registry.lease_timeout_secs, 12);

        cmd.port = Some(6000);
        cmd.timeout = Some(3);
        cmd.host = Some("0.0.0.0".to_string());
        let config = cmd.load_config().unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.registry.lease_timeout_secs, 3);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let cmd = command(Some(PathBuf::from("/definitely/not/here/waypost.toml")));
        assert!(cmd.load_config().is_err());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"eighty\"").unwrap();

        let cmd = command(Some(file.path().to_path_buf()));
        assert!(cmd.load_config().is_err());
    }
}

mod run;

pub use run::RunCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// waypost - a lease-based service directory
#[derive(Parser)]
#[command(name = "waypost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the registry server.
    Run(RunCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["waypost", "run"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_run_flags() {
        let cli = Cli::try_parse_from(["waypost", "run", "-p", "4949", "-t", "10", "--dev"]).unwrap();
        let Commands::Run(cmd) = cli.command;
        assert_eq!(cmd.port, Some(4949));
        assert_eq!(cmd.timeout, Some(10));
        assert!(cmd.dev);
    }

    #[test]
    fn test_cli_rejects_zero_timeout() {
        assert!(Cli::try_parse_from(["waypost", "run", "-t", "0"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["waypost", "serve"]).is_err());
    }
}

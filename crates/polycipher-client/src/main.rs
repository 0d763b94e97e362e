//! polycipher initiator entry point.
//!
//! Connects to the responder, performs the handshake and then runs the
//! interactive menu on the terminal.
//!
//! # Usage
//!
//! ```text
//! polycipher-client [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>       Config file [default: polycipher-client.toml]
//!   -s, --server <ADDR>       Responder address, host:port
//!   -p, --p <P>               Initiator P
//!       --seed <S>            Key table seed
//!   -n, --num-keys <N>        Key table length
//!       --log-level <LEVEL>   Used when RUST_LOG is unset
//!       --print-config        Print the effective config and exit
//! ```
//!
//! Log output goes to stderr so it never mixes with the menu on stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use polycipher_client::application::initiate::{InitiatorUseCase, MenuExit};
use polycipher_client::infrastructure::console::StdConsole;
use polycipher_client::infrastructure::network::FramedLink;
use polycipher_client::infrastructure::storage::config::{load_config, ClientConfig};

/// polycipher initiator.
#[derive(Debug, Parser)]
#[command(
    name = "polycipher-client",
    about = "Initiator for polycipher sessions",
    version
)]
struct Cli {
    /// Path to the TOML config file.  A missing file means defaults.
    #[arg(
        short,
        long,
        default_value = "polycipher-client.toml",
        env = "POLYCIPHER_CLIENT_CONFIG"
    )]
    config: PathBuf,

    /// Responder address as host:port.
    #[arg(short, long, env = "POLYCIPHER_SERVER")]
    server: Option<String>,

    /// The initiator's P.
    #[arg(short, long)]
    p: Option<u64>,

    /// Seed for the key table.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of keys to generate.
    #[arg(short, long)]
    num_keys: Option<usize>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(server) = &self.server {
            config.network.server_address = server.clone();
        }
        if let Some(p) = self.p {
            config.cipher.p = p;
        }
        if let Some(seed) = self.seed {
            config.cipher.seed = seed;
        }
        if let Some(num_keys) = self.num_keys {
            config.cipher.num_keys = num_keys;
        }
        if let Some(level) = &self.log_level {
            config.client.log_level = level.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let config = cli.apply(config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = config.initiator_settings()?;
    let addr = &config.network.server_address;

    println!("Connecting to {addr}...");
    let link = FramedLink::connect(addr)
        .await
        .with_context(|| format!("could not connect to {addr}; is polycipher-server running?"))?;

    let mut use_case = InitiatorUseCase::new(link, StdConsole::new(), settings)
        .with_ack_timeout(config.ack_timeout());
    let exit = use_case.run().await.context("session ended with an error")?;

    match exit {
        MenuExit::Closed => info!("session closed with LCM"),
        MenuExit::Quit => info!("initiator exited"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["polycipher-client"]);

        assert_eq!(cli.config, PathBuf::from("polycipher-client.toml"));
        assert!(cli.server.is_none());
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        // Arrange
        let cli = Cli::parse_from([
            "polycipher-client",
            "--server",
            "10.1.1.1:4000",
            "-p",
            "11",
            "--seed",
            "99",
            "-n",
            "5",
        ]);

        // Act
        let merged = cli.apply(ClientConfig::default());

        // Assert
        assert_eq!(merged.network.server_address, "10.1.1.1:4000");
        let settings = merged.initiator_settings().unwrap();
        assert_eq!((settings.p, settings.seed, settings.num_keys), (11, 99, 5));
        assert_eq!(merged.client.log_level, "warn");
    }

    #[test]
    fn test_cli_without_overrides_keeps_file_values() {
        let cli = Cli::parse_from(["polycipher-client"]);
        let mut file = ClientConfig::default();
        file.cipher.seed = 1;

        assert_eq!(cli.apply(file.clone()), file);
    }
}

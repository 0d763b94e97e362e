//! polycipher responder entry point.
//!
//! Loads the TOML config, applies command-line overrides, starts logging and
//! runs the accept loop until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! polycipher-server [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>       Config file [default: polycipher-server.toml]
//!       --bind <ADDR>         Bind address (overrides [network] bind_address)
//!   -p, --port <PORT>         Listening port (overrides [network] port)
//!   -q, --q <Q>               Responder Q (overrides [cipher] q)
//!       --max-keys <N>        Largest accepted key table
//!       --log-level <LEVEL>   Used when RUST_LOG is unset
//!       --print-config        Print the effective config and exit
//! ```
//!
//! ```text
//! main()
//!  └─ load_config() + CLI overrides
//!  └─ run_server()            -- TCP accept loop
//!       └─ serve_connection() -- one task and one Session per peer
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use polycipher_server::infrastructure::network::{bind, run_server};
use polycipher_server::infrastructure::storage::config::{load_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// polycipher responder.
///
/// Accepts initiator connections, answers the handshake with its Q and logs
/// every decrypted message.
#[derive(Debug, Parser)]
#[command(
    name = "polycipher-server",
    about = "Responder for polycipher sessions",
    version
)]
struct Cli {
    /// Path to the TOML config file.  A missing file means defaults.
    #[arg(
        short,
        long,
        default_value = "polycipher-server.toml",
        env = "POLYCIPHER_SERVER_CONFIG"
    )]
    config: PathBuf,

    /// IP address to bind.
    #[arg(long, env = "POLYCIPHER_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(short, long, env = "POLYCIPHER_PORT")]
    port: Option<u16>,

    /// The responder's Q.
    #[arg(short, long)]
    q: Option<u64>,

    /// Largest key table accepted from an FCM.
    #[arg(long)]
    max_keys: Option<usize>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Layers the command-line overrides on top of `config`.
    fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = &self.bind {
            config.network.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(q) = self.q {
            config.cipher.q = q;
        }
        if let Some(max_keys) = self.max_keys {
            config.cipher.max_keys = max_keys;
        }
        if let Some(level) = &self.log_level {
            config.server.log_level = level.clone();
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

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

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let addr = config.socket_addr()?;
    let settings = config.responder_settings()?;
    info!(%addr, q = settings.q, max_keys = settings.max_keys, "polycipher responder starting");

    let listener = bind(addr).await?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    run_server(listener, settings, running).await?;

    info!("polycipher responder stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_local_config_file() {
        let cli = Cli::parse_from(["polycipher-server"]);
        assert_eq!(cli.config, PathBuf::from("polycipher-server.toml"));
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_without_overrides_keeps_file_values() {
        // Arrange
        let cli = Cli::parse_from(["polycipher-server"]);
        let mut file = ServerConfig::default();
        file.network.port = 7000;

        // Act
        let merged = cli.apply(file.clone());

        // Assert
        assert_eq!(merged, file);
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        // Arrange
        let cli = Cli::parse_from([
            "polycipher-server",
            "--bind",
            "127.0.0.1",
            "--port",
            "9001",
            "-q",
            "17",
            "--max-keys",
            "8",
            "--log-level",
            "debug",
        ]);

        // Act
        let merged = cli.apply(ServerConfig::default());

        // Assert
        assert_eq!(merged.socket_addr().unwrap().to_string(), "127.0.0.1:9001");
        assert_eq!(merged.cipher.q, 17);
        assert_eq!(merged.cipher.max_keys, 8);
        assert_eq!(merged.server.log_level, "debug");
    }

    #[test]
    fn test_cli_print_config_flag() {
        let cli = Cli::parse_from(["polycipher-server", "--print-config"]);
        assert!(cli.print_config);
    }
}

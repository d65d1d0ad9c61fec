//! spacehubd: the Spacehub daemon.
//!
//! # Usage
//!
//! ```text
//! spacehubd serve --config /etc/spacehub/spacehubd.toml --port 8443
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use spacehubd::DaemonConfig;
use tracing::info;

#[derive(Parser)]
#[command(name = "spacehubd", about = "Spacehub daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the API.
    Serve {
        /// Configuration file (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on; overrides `[server] port`.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state; overrides `[server] data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the effective configuration and exit.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            spacehubd::run(config).await
        }
        Command::Config { config } => {
            print!("{}", load_config(config.as_deref())?.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,spacehubd=debug,spacehub=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<DaemonConfig> {
    match path {
        Some(path) => {
            let config = DaemonConfig::from_file(path)?;
            info!(path = ?path, "configuration loaded");
            Ok(config)
        }
        None => Ok(DaemonConfig::default()),
    }
}

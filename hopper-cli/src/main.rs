mod server;
mod handlers;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hopper_core::client::HopperClient;
use hopper_core::config::HopperConfig;
use hopper_core::source::parse_batch;

#[derive(Parser)]
#[command(
    name = "hopper",
    about = "Hopper: pick a free server and hold it for a cooldown",
    version
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "HOPPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Hopper HTTP selection server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3100")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Largest accepted request body, in bytes
        #[arg(long, default_value = "2097152")]
        max_body_bytes: usize,

        #[command(flatten)]
        options: SelectionOptions,
    },

    /// Select one server from a JSON batch read on stdin
    Pick {
        #[command(flatten)]
        options: SelectionOptions,
    },

    /// Run one polling-mode search against the listing endpoint
    Search {
        #[command(flatten)]
        options: SelectionOptions,
    },

    /// Print version information
    Version,
}

/// Flags shared by every command that selects servers. Each one overrides
/// the matching config file value.
#[derive(Args)]
struct SelectionOptions {
    /// Storage backend: "memory" or "sqlite:<path>"
    #[arg(long, default_value = "memory", env = "HOPPER_STORAGE")]
    storage: String,

    /// Upstream listing endpoint for polling mode
    #[arg(long, env = "HOPPER_LISTING_URL")]
    listing_url: Option<String>,

    /// Reservation cooldown in seconds
    #[arg(long, env = "HOPPER_COOLDOWN_TTL")]
    ttl: Option<u64>,

    /// Seats that must stay free on an eligible server
    #[arg(long, env = "HOPPER_SLACK")]
    slack: Option<u32>,

    /// Maximum full passes for polling-mode search
    #[arg(long, env = "HOPPER_MAX_PASSES")]
    max_passes: Option<u32>,
}

impl SelectionOptions {
    fn apply(&self, config: &mut HopperConfig) {
        if let Some(url) = &self.listing_url {
            config.listing_url = Some(url.clone());
        }
        if let Some(ttl) = self.ttl {
            config.selector.cooldown_ttl_secs = ttl;
        }
        if let Some(slack) = self.slack {
            config.eligibility.slack = slack;
        }
        if let Some(max_passes) = self.max_passes {
            config.selector.max_pass_attempts = max_passes;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => HopperConfig::load(path)?,
        None => HopperConfig::default(),
    };

    match cli.command {
        Commands::Serve {
            port,
            host,
            max_body_bytes,
            options,
        } => {
            let client = create_client(&options, config)?;
            server::run(&host, port, client, max_body_bytes).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Pick { options } => {
            eprintln!("Reading server batch from stdin...");
            let mut input = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)
                .context("failed to read stdin")?;

            let batch = parse_batch(&input)?;
            let client = create_client(&options, config)?;
            Ok(report(client.select_from_batch(batch).await))
        }
        Commands::Search { options } => {
            let client = create_client(&options, config)?;
            if !client.has_listing() {
                bail!("search needs a listing endpoint: pass --listing-url or set listing_url");
            }
            Ok(report(client.search().await))
        }
        Commands::Version => {
            println!("hopper {}", env!("CARGO_PKG_VERSION"));
            println!("Reservation-and-selection kernel for server pools");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn report(
    outcome: Result<hopper_core::types::Selection, hopper_core::error::SelectError>,
) -> ExitCode {
    match outcome {
        Ok(selection) => {
            println!("{}", selection.id);
            ExitCode::SUCCESS
        }
        Err(e) if e.is_not_found() => {
            println!("{}", handlers::NOT_FOUND_BODY);
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!(error = %e, "Selection failed");
            ExitCode::FAILURE
        }
    }
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

fn create_client(
    options: &SelectionOptions,
    mut config: HopperConfig,
) -> anyhow::Result<HopperClient> {
    options.apply(&mut config);
    let storage = options.storage.as_str();

    let client = if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (reservations are per-process)");
        HopperClient::new(config)
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("💾 Storage backend: SQLite ({})", path);
            HopperClient::with_sqlite(path, config)?
        }
        #[cfg(not(feature = "sqlite"))]
        {
            let _ = path;
            bail!(
                "SQLite storage requested but `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
            );
        }
    } else {
        bail!("Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'", storage);
    };

    Ok(client.with_configured_listing()?)
}

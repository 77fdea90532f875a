//! Plugbay CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use plugbay_core::{PluginId, PluginManager, PluginManagerConfig, Version};
use plugbay_foundation::{DiscoveryPolicy, RuntimeConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Plugbay - plugin runtime host
#[derive(Parser, Debug)]
#[command(name = "plugbay")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// User directory holding plugins/, data/ and preferences.json
    #[arg(long, global = true)]
    user_dir: Option<PathBuf>,

    /// Host platform version used for compatibility checks
    #[arg(long, global = true)]
    host_version: Option<String>,

    /// Skip invalid plugin units instead of failing discovery
    #[arg(long, global = true)]
    skip_invalid: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed plugins
    List,
    /// Install a plugin from a .zip package or a directory
    Install {
        /// Package path
        path: PathBuf,
    },
    /// Uninstall a plugin
    Uninstall {
        id: String,

        /// Also delete the plugin's data directory
        #[arg(long)]
        purge: bool,
    },
    /// Enable a plugin
    Enable { id: String },
    /// Disable a plugin
    Disable { id: String },
    /// Start all plugins and wait for Ctrl-C
    Run,
    /// Check plugin artifact repositories for newer versions
    CheckUpdate {
        /// Plugin to check (all plugins when omitted)
        id: Option<String>,
    },
    /// Run the pending cleanup queue
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let manager = build_manager(&args)?;

    match args.command {
        Command::List => cli::list(&manager).await,
        Command::Install { path } => cli::install(&manager, &path).await,
        Command::Uninstall { id, purge } => {
            cli::uninstall(&manager, &PluginId::from(id), purge).await
        }
        Command::Enable { id } => cli::set_enabled(&manager, &PluginId::from(id), true).await,
        Command::Disable { id } => cli::set_enabled(&manager, &PluginId::from(id), false).await,
        Command::Run => cli::run(&manager).await,
        Command::CheckUpdate { id } => cli::check_update(&manager, id.map(PluginId::from)).await,
        Command::Cleanup => cli::cleanup(&manager).await,
    }
}

fn build_manager(args: &Args) -> anyhow::Result<PluginManager> {
    // Load configuration
    let mut runtime = RuntimeConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        RuntimeConfig::default()
    });
    if let Some(dir) = &args.user_dir {
        runtime = runtime.user_dir(dir);
    }
    if args.skip_invalid {
        runtime = runtime.discovery_policy(DiscoveryPolicy::SkipInvalid);
    }

    let host_version = args
        .host_version
        .as_deref()
        .unwrap_or(env!("CARGO_PKG_VERSION"));
    let host_version = Version::parse(host_version)
        .map_err(|e| anyhow::anyhow!("invalid host version {}: {}", host_version, e))?;

    let config = PluginManagerConfig::from_runtime(host_version, &runtime)?;
    tracing::debug!("Using user directory {:?}", config.layout.root());

    Ok(PluginManager::new(config))
}

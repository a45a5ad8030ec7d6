//! ONVIF camera emulator
//!
//! Serves Device, Media and PTZ over HTTP, answers WS-Discovery probes,
//! and points stream URIs at an existing RTSP source.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config_manager::EmulatorConfig;
use onvif_server::{
    advertised_base_url, build_dispatcher, run_discovery, run_onvif_server, ConfigurationStore,
    DiscoveryMode, Service, SharedStore,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "onvif-emulator")]
#[command(about = "Emulate an ONVIF Profile S camera in front of an RTSP source")]
#[command(version)]
struct Cli {
    /// Path to the emulator config (defaults to the XDG config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Start the emulator
    Run {
        /// Override the HTTP bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Verbose logging
        #[arg(long)]
        debug: bool,

        /// Do not answer WS-Discovery probes
        #[arg(long)]
        no_discovery: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = match cli.config {
        Some(path) => path,
        None => EmulatorConfig::default_path()?,
    };

    match cli.command {
        Commands::Init { force } => init(&path, force),
        Commands::Run {
            bind,
            debug,
            no_discovery,
        } => {
            init_tracing(debug);

            let mut config = load_config(&path)?;
            if let Some(bind) = bind {
                config.http.bind = bind;
            }
            if no_discovery {
                config.discovery.enabled = false;
            }

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(serve(config))
        }
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    EmulatorConfig::default().save_to(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "onvif_emulator=debug,onvif_server=debug"
    } else {
        "onvif_emulator=info,onvif_server=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

/// Missing config at the default path falls back to built-in defaults
fn load_config(path: &Path) -> Result<EmulatorConfig> {
    if path.exists() {
        let config = EmulatorConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    } else {
        warn!(path = %path.display(), "No config file, using defaults");
        Ok(EmulatorConfig::default())
    }
}

async fn serve(config: EmulatorConfig) -> Result<()> {
    let store = ConfigurationStore::from_config(&config).map_err(|e| {
        error!("Failed to seed configuration store: {}", e);
        e
    })?;
    let store = SharedStore::new(store);

    let base_url = advertised_base_url(&config.http);
    let discovery = DiscoveryMode::new(config.discovery.enabled);
    let dispatcher = Arc::new(build_dispatcher(&config, store, discovery.clone(), &base_url)?);
    let device_xaddr = format!("{}/onvif/{}", base_url, Service::Device.endpoint());

    info!(
        name = %config.device.name,
        endpoint = %config.device.endpoint_reference(),
        xaddr = %device_xaddr,
        upstream = %config.upstream.stream_uri,
        "Starting ONVIF emulator"
    );

    if config.discovery.enabled {
        let identity = config.device.clone();
        let port = config.discovery.port;
        let xaddr = device_xaddr.clone();
        tokio::spawn(async move {
            if let Err(e) = run_discovery(port, identity, xaddr, discovery).await {
                error!("WS-Discovery stopped: {}", e);
            }
        });
    }

    tokio::select! {
        result = run_onvif_server(config.http.bind, dispatcher) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

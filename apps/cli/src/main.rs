use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    ControllerConfig, Ed25519Signer, HttpStorageGateway, Signer, UploadController,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod repl;

use config::{load_settings, parse_release_policy};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "storage_cli.toml")]
    config: PathBuf,
    #[arg(long)]
    gateway_url: Option<String>,
    #[arg(long)]
    signer_seed: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// "reset" or "restart"
    #[arg(long)]
    release_policy: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config);
    if let Some(v) = args.gateway_url {
        settings.gateway_url = v;
    }
    if let Some(v) = args.signer_seed {
        settings.signer_seed = Some(v);
    }
    if let Some(v) = args.address {
        settings.address = Some(v);
    }
    if let Some(v) = args.release_policy {
        settings.release_policy = parse_release_policy(&v)
            .with_context(|| format!("unknown release policy '{v}'"))?;
    }

    let signer: Option<Arc<dyn Signer>> = match &settings.signer_seed {
        Some(seed) => Some(Arc::new(
            Ed25519Signer::from_base64_seed(seed).context("failed to load signer seed")?,
        )),
        None => None,
    };

    let gateway = HttpStorageGateway::new(
        &settings.gateway_url,
        Some(Duration::from_secs(settings.request_timeout_secs)),
    )?;
    info!(
        gateway = %gateway.base_url(),
        release_policy = ?settings.release_policy,
        "storage cli starting"
    );
    let controller = UploadController::new_with_config(
        Arc::new(gateway),
        ControllerConfig {
            release_policy: settings.release_policy,
        },
    );

    repl::Repl::new(controller, signer, settings.address)
        .run(BufReader::new(tokio::io::stdin()))
        .await
}

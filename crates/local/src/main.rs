//! SeaSync Local - replay captured store deliveries through a session
//!
//! Reads a JSON-lines file of raw node deliveries, feeds them through an
//! in-memory store into a session (decrypting with whatever keys are
//! supplied), and prints the resulting snapshot as JSON on stdout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use common::prelude::*;
use service::{run_worker, Config};

/// SeaSync Local - replay captured deliveries and print the decoded snapshot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines file, one delivery per line
    ///  (`{"node": {...}, "key": "..."}` or a bare node)
    #[arg(short, long)]
    input: PathBuf,

    /// Register a decryption key for an owner, as PUB=HEX (repeatable)
    #[arg(long = "key", value_parser = parse_key_pair)]
    keys: Vec<(String, Secret)>,

    /// Path to a PEM-encoded Ed25519 signing key for this session
    #[arg(long)]
    signing_key: Option<PathBuf>,

    /// Hex-encoded self encryption key for this session
    #[arg(long)]
    encryption_key: Option<String>,

    /// Session id; a random UUID when omitted
    #[arg(long)]
    session_id: Option<String>,

    /// Coalescing window in milliseconds
    #[arg(long, default_value = "50")]
    coalesce_ms: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_key_pair(pair: &str) -> std::result::Result<(String, Secret), String> {
    let (public_key, secret) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected PUB=HEX, got {:?}", pair))?;
    if public_key.is_empty() {
        return Err("public key is empty".to_string());
    }
    let secret = Secret::from_hex(secret).map_err(|e| e.to_string())?;
    Ok((public_key.to_string(), secret))
}

fn parse_delivery(line: &str) -> Result<Delivery> {
    match serde_json::from_str::<Delivery>(line) {
        Ok(delivery) => Ok(delivery),
        Err(_) => {
            let node: Node = serde_json::from_str(line)?;
            Ok(Delivery::from(node))
        }
    }
}

async fn read_deliveries(path: &Path) -> Result<Vec<Delivery>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            parse_delivery(line).with_context(|| format!("line {}: invalid delivery", number + 1))
        })
        .collect()
}

async fn session_key(args: &Args) -> Result<Option<KeyMaterial>> {
    let mut keys = KeyMaterial::default();
    if let Some(path) = &args.signing_key {
        let pem = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        keys = keys.with_signing(SecretKey::from_pem(&pem)?);
    }
    if let Some(hex) = &args.encryption_key {
        keys = keys.with_encryption(Secret::from_hex(hex)?);
    }

    if keys.signing.is_none() && keys.encryption.is_none() {
        return Ok(None);
    }
    Ok(Some(keys))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    // Create configuration
    let config = Config {
        coalesce_window: Duration::from_millis(args.coalesce_ms),
        session_id: args.session_id.clone(),
        session_key: session_key(&args).await?,
        log_level,
    };

    let deliveries = read_deliveries(&args.input).await?;
    tracing::info!("Replaying {} deliveries from {}", deliveries.len(), args.input.display());

    let session_config = config.session_config();
    let (session, _snapshots) = Session::new(
        MemoryTransport::new(),
        SeaCipher,
        config.session_key,
        session_config,
    );
    for (public_key, secret) in args.keys {
        session.vault().remember_self_key(public_key, secret);
    }

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    let transport = session.transport().clone();
    let stream = transport.subscribe().into_stream();
    let worker = tokio::spawn(run_worker(session.clone(), stream, shutdown_rx));

    for delivery in deliveries {
        transport.publish(delivery)?;
    }
    transport.close();

    let summary = worker.await?;
    if summary.dropped_fields > 0 {
        tracing::warn!(
            "{} fields could not be decoded; supply more keys with --key",
            summary.dropped_fields
        );
    }

    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    Ok(())
}

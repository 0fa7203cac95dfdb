//! `mailforge` - small mail transfer agent
//!
//! Receives mail over SMTP into in-memory mailboxes and delivers outbound
//! mail directly to MX hosts or through a relay.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailforge_core::delivery::{
    DnsMxResolver, OutgoingMessage, Router, SmtpTransport, StaticMxTable,
};
use mailforge_core::{Config, InMemoryMailStore, IngestPipeline, RelaySettings, SmtpRelay};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type MailRouter = Router<SmtpRelay, DnsMxResolver, SmtpTransport>;

#[derive(Parser, Debug)]
#[command(name = "mailforge", version)]
#[command(about = "Receive mail over SMTP and deliver it to MX hosts or a relay")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "MAILFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the SMTP listener (default)
    Serve,
    /// Route one message and print the path it took
    Send {
        /// Sender address
        #[arg(long)]
        from: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,
        /// Plain-text body
        #[arg(long, default_value = "")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailforge=info,mailforge_core=info,mailforge_smtp=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Send {
            from,
            to,
            subject,
            body,
        } => send(&config, OutgoingMessage::new(from, to, subject, body)).await,
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path.or_else(Config::default_path) else {
        warn!("no configuration directory, using defaults");
        return Ok(Config::default());
    };
    info!(path = %path.display(), "loading configuration");
    Config::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn build_router(config: &Config) -> MailRouter {
    let relay = SmtpRelay::new(
        RelaySettings::new(config.relay.clone()),
        &config.domain,
        &config.hostname,
        config.dial_timeout(),
    );

    Router::new(
        &config.domain,
        relay,
        DnsMxResolver::from_system_conf(),
        SmtpTransport::new(&config.hostname, config.dial_timeout()),
    )
    .with_local_endpoint(config.local_endpoint.clone())
    .with_static_mx(StaticMxTable::with_entries(&config.static_mx))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let router = Arc::new(build_router(&config));
    let store = Arc::new(InMemoryMailStore::new(config.mailboxes.iter().cloned()));
    let pipeline = Arc::new(IngestPipeline::new(store, router));

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(
        listen = %config.listen,
        domain = %config.domain,
        mailboxes = config.mailboxes.len(),
        relay = config.relay.enabled,
        max_message_size = config.max_message_size,
        "Starting mailforge"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = signal_tx.send(());
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl+C"),
        }
    });

    mailforge_smtp::server::run(
        listener,
        config.domain.clone(),
        config.session_limits(),
        pipeline,
        shutdown_rx,
    )
    .await;
    drop(shutdown_tx);
    Ok(())
}

async fn send(config: &Config, message: OutgoingMessage) -> anyhow::Result<()> {
    let router = build_router(config);
    let route = router
        .deliver(&message)
        .await
        .with_context(|| format!("delivering to {}", message.to))?;
    println!("delivered to {} via {route}", message.to);
    Ok(())
}

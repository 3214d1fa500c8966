use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modgate_network::{ConnectionState, DisconnectReason, Role};
use modgate_server::{
    config::ServerConfig, connect_failed_text, metrics::start_metrics_reporter, ServerSession,
    TcpTransport,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "modgate")]
#[command(about = "Refuse peers running a different build of the mod", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept peers and enforce the version handshake
    Serve {
        /// Address to bind, overrides MODGATE_BIND
        #[arg(long)]
        bind: Option<String>,
    },
    /// Connect to a server and report whether it accepted us
    Connect {
        /// Server address, overrides MODGATE_SERVER
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("modgate={log_level},modgate_server={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        "{} {} ({})",
        config.identity.name,
        config.identity.version,
        config.identity.guid()
    );

    match args.command {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Connect { server } => connect(config, server).await,
    }
}

async fn serve(config: ServerConfig, bind: Option<String>) -> Result<()> {
    let address = bind.unwrap_or_else(|| config.bind_address.clone());
    let transport = TcpTransport::new(Role::Server, config.transport(&address));
    let session = ServerSession::from_config(&config, transport.clone())?;

    if !config.metrics_interval.is_zero() {
        tokio::spawn(start_metrics_reporter(
            session.metrics().clone(),
            config.metrics_interval,
        ));
    }

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    tokio::select! {
        result = transport.serve(listener, session.hooks()) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down, {} validated peers", session.registry().len());
        }
    }
    Ok(())
}

async fn connect(config: ServerConfig, server: Option<String>) -> Result<()> {
    let address = server.unwrap_or_else(|| config.server_address.clone());
    let transport = TcpTransport::new(Role::Client, config.transport(&address));
    let session = ServerSession::from_config(&config, transport.clone())?;
    let mut events = session.connections().subscribe();

    let (peer, task) = transport
        .clone()
        .connect(session.hooks())
        .await
        .with_context(|| format!("Failed to connect to {address}"))?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                if event.peer != peer {
                    continue;
                }
                match event.to {
                    ConnectionState::Validated => {
                        tracing::info!("Server accepted our fingerprint, press Ctrl-C to leave");
                    }
                    ConnectionState::Disconnected => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                task.abort();
                return Ok(());
            }
        }
    }

    let _ = task.await;
    let reason = transport
        .disconnect_reason()
        .unwrap_or(DisconnectReason::Disconnected);
    let text = connect_failed_text(reason.description(), session.connection_error());
    println!("{text}");

    if let Some(admins) = session.admin_sync().received() {
        tracing::info!("Last admin list: {}", admins.join(", "));
    }
    Ok(())
}

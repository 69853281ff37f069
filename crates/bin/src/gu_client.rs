//! Grid Universe terminal client.
//!
//! Environment:
//!   GU_CONFIG            path to the TOML config (default `config.toml`)
//!   GU_HOST              overrides `network.host`
//!   PARTICIPANT_ID       player id; watch as a spectator when unset
//!   GU_ITEM_TABLE        JSON item table from the experiment server
//!   GU_TRANSITION_TABLE  JSON transition table from the experiment server
//!   GU_FRAME_MS          tick interval (default 16)

mod terminal;
mod transport;

use anyhow::Context;
use client::render::Frame;
use client::utils::now;
use client::{Config, GameClient};
use protocol::PlayerId;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use terminal::{Command, LogRenderer};
use transport::{Transport, TransportEvent};

fn load_config() -> anyhow::Result<Config> {
    let path = std::env::var("GU_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = Config::load(&path).with_context(|| format!("loading {}", path))?;
    if let Ok(host) = std::env::var("GU_HOST") {
        config.network.host = host;
    }
    Ok(config)
}

fn load_tables(client: &mut GameClient) -> anyhow::Result<()> {
    if let Ok(path) = std::env::var("GU_ITEM_TABLE") {
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
        client.load_item_table(&json).with_context(|| format!("parsing {}", path))?;
    }
    if let Ok(path) = std::env::var("GU_TRANSITION_TABLE") {
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
        client.load_transition_table(&json).with_context(|| format!("parsing {}", path))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,client=debug")),
        )
        .init();

    info!("Grid Universe client v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!("Loaded configuration");
    info!("  Server: {}", config.network.host);
    info!("  Grid: {}x{}", config.grid.rows, config.grid.columns);

    let ego_id = std::env::var("PARTICIPANT_ID")
        .map(PlayerId::new)
        .unwrap_or_else(|_| PlayerId::spectator());
    if ego_id.is_spectator() {
        info!("No PARTICIPANT_ID, watching as spectator");
    }

    let frame_ms = std::env::var("GU_FRAME_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(16)
        .max(1);

    let mut client = GameClient::new(config, ego_id, Box::new(LogRenderer::default()), now());
    load_tables(&mut client)?;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut transport = Transport::new(events_tx);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
    let mut last_frame: Option<Frame> = None;

    println!("{}", terminal::HELP);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for request in client.socket_mut().drain_requests() {
                    transport.open(request);
                }
                if let Some(frame) = client.update(now()) {
                    last_frame = Some(frame);
                }
                for frame in client.socket_mut().drain_outbox() {
                    transport.send(frame);
                }
                for message in client.dashboard_mut().unread() {
                    println!("{}", message);
                }
                if client.is_stopped() {
                    info!("Game finished, final score {}", client.dashboard().score);
                    break;
                }
            }
            Some(event) = events.recv() => {
                match event {
                    TransportEvent::Opened(kind) => client.on_socket_open(kind),
                    TransportEvent::Frame(kind, text) => client.enqueue_frame(kind, text),
                    TransportEvent::Closed(kind) => client.on_socket_closed(kind),
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match Command::parse(&line) {
                        Some(Command::Quit) => break,
                        Some(command) => {
                            if let Some(text) = command.apply(&mut client, last_frame.as_ref(), now()) {
                                println!("{}", text);
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => println!("Unknown command: {} (try /help)", line.trim()),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    drop(transport);
    Ok(())
}

//! Websocket transport for the lobby and game sockets.
//!
//! One task per socket. Each task reconnects with backoff until the
//! transport is dropped, and reports everything it sees as a
//! [`TransportEvent`] on a single channel read by the main loop.

use client::{OutboundFrame, ReconnectState, SocketKind, SocketRequest};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum TransportEvent {
    Opened(SocketKind),
    Frame(SocketKind, String),
    Closed(SocketKind),
}

struct Link {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

pub struct Transport {
    events: mpsc::UnboundedSender<TransportEvent>,
    lobby: Option<Link>,
    game: Option<Link>,
}

impl Transport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            lobby: None,
            game: None,
        }
    }

    fn slot(&mut self, kind: SocketKind) -> &mut Option<Link> {
        match kind {
            SocketKind::Lobby => &mut self.lobby,
            SocketKind::Game => &mut self.game,
        }
    }

    /// Open (or replace) the socket named by `request`.
    pub fn open(&mut self, request: SocketRequest) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(request.kind, request.url, rx, self.events.clone()));
        if let Some(old) = self.slot(request.kind).replace(Link { outbound, task }) {
            debug!("Replacing {} socket", request.kind);
            old.task.abort();
        }
    }

    pub fn send(&mut self, frame: OutboundFrame) {
        let Some(link) = self.slot(frame.socket).as_ref() else {
            warn!("No {} socket for outbound frame", frame.socket);
            return;
        };
        if link.outbound.send(frame.text).is_err() {
            warn!("{} socket task has exited", frame.socket);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        for link in [self.lobby.take(), self.game.take()].into_iter().flatten() {
            link.task.abort();
        }
    }
}

async fn run_socket(
    kind: SocketKind,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut backoff = ReconnectState::default();
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("{} socket connected to {}", kind, url);
                backoff.reset();
                if events.send(TransportEvent::Opened(kind)).is_err() {
                    return;
                }
                let (mut write, mut read) = stream.split();

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let frame = TransportEvent::Frame(kind, text.as_str().to_owned());
                                    if events.send(frame).is_err() {
                                        return;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    info!("{} socket closed", kind);
                                    break;
                                }
                                Some(Err(e)) => {
                                    warn!("{} socket error: {}", kind, e);
                                    break;
                                }
                                _ => {}
                            }
                        }
                        text = outbound.recv() => {
                            let Some(text) = text else {
                                return;
                            };
                            if let Err(e) = write.send(Message::text(text)).await {
                                warn!("{} socket write failed: {}", kind, e);
                                break;
                            }
                        }
                    }
                }

                if events.send(TransportEvent::Closed(kind)).is_err() {
                    return;
                }
            }
            Err(e) => warn!("{} socket could not connect to {}: {}", kind, url, e),
        }

        let delay = backoff.next_delay_ms();
        info!("Reconnecting {} socket in {} ms", kind, delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

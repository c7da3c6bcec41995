//! Server network layer handling WebSocket connections
//!
//! Each accepted socket gets its own task. The task registers the player with
//! the game task, then pumps frames in both directions until either side
//! closes: queued server messages go out, client messages are parsed and
//! forwarded as `GameCommand`s.

use crate::game::{GameCommand, GameHandle};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, PlayerId};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Accepts WebSocket clients and hands them to the game task
pub struct Server {
    listener: TcpListener,
    game: GameHandle,
    outbox_capacity: usize,
}

impl Server {
    pub async fn bind(
        addr: &str,
        game: GameHandle,
        outbox_capacity: usize,
    ) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on ws://{}", listener.local_addr()?);

        Ok(Server {
            listener,
            game,
            outbox_capacity: outbox_capacity.max(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Runs until the task is dropped.
    pub async fn run(self) -> Result<(), BoxError> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    continue;
                }
            };

            let game = self.game.clone();
            let capacity = self.outbox_capacity;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, game, capacity).await {
                    warn!("Connection from {} failed: {}", addr, e);
                }
            });
        }
    }
}

/// Pulls the `name` query parameter out of the connection request, if present
pub fn name_hint(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.into_owned())
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    game: GameHandle,
    outbox_capacity: usize,
) -> Result<(), BoxError> {
    let mut hint = None;
    let socket = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            hint = name_hint(request.uri().query());
            Ok(response)
        },
    )
    .await?;

    let (outbox, outgoing) = mpsc::channel(outbox_capacity);
    let Some(id) = game.join(hint, outbox).await else {
        return Ok(());
    };
    info!("Player {} connected from {}", id, addr);

    pump(socket, id, &game, outgoing).await;

    game.leave(id).await;
    info!("Player {} disconnected", id);
    Ok(())
}

/// Moves frames between the socket and the game until the connection ends
async fn pump(
    socket: WebSocketStream<TcpStream>,
    id: PlayerId,
    game: &GameHandle,
    mut outgoing: mpsc::Receiver<String>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!("Failed to send to player {}: {}", id, e);
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => forward(game, id, &text).await,
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => forward(game, id, text).await,
                        Err(_) => debug!("Dropping non-UTF-8 frame from player {}", id),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Read error from player {}: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn forward(game: &GameHandle, id: PlayerId, text: &str) {
    match ClientMessage::parse(text) {
        Some(message) => match GameCommand::from_client(id, message) {
            Some(command) => game.send(command).await,
            None => debug!("Ignoring unknown message type from player {}", id),
        },
        None => debug!("Dropping malformed message from player {}", id),
    }
}

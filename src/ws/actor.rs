use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::messages::ServerMessage;
use crate::registry::ResponderStatus;
use crate::state::AppState;
use crate::ws::broadcast::push_to_all_responders;
use crate::ws::{protocol, RegisteredParty};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for a WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming messages, dispatches to protocol handlers
///
/// The mpsc channel allows any part of the system to send messages to this client
/// by cloning the sender. The session starts unregistered; a registration
/// frame moves it to registered(kind), transport close moves it to closed.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // The party this connection registered as, kept beside the channel so
    // close-cleanup needs no reverse scan of the registries.
    let mut session: Option<RegisteredParty> = None;

    tracing::debug!("WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Send ping
            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            // Wait for pong within timeout
            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    // Pong timeout or channel closed — close connection
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages in arrival order.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &tx, &state, &mut session);
                }
                Message::Binary(_) => {
                    // The protocol is JSON text; binary frames are ignored.
                    tracing::debug!("Ignoring binary frame");
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::debug!(reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(error = %e, "WebSocket receive error");
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::debug!("WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    cleanup_session(&state, session);

    tracing::debug!("WebSocket actor stopped");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

/// Remove the registry entry owned by a closing connection.
///
/// Removal is idempotent, so a re-registration that already displaced the
/// entry costs nothing here. A removed responder gets exactly one offline
/// status broadcast; volunteers leave without one.
fn cleanup_session(state: &AppState, session: Option<RegisteredParty>) {
    match session {
        Some(RegisteredParty::Responder(id)) => {
            if state.registry.remove_responder(&id) {
                tracing::info!(responder_id = %id, "Responder disconnected");
                push_to_all_responders(
                    &state.registry,
                    &ServerMessage::ResponderStatus {
                        responder_id: id,
                        status: ResponderStatus::Offline,
                    },
                );
            }
        }
        Some(RegisteredParty::Volunteer(id)) => {
            if state.registry.remove_volunteer(&id) {
                tracing::info!(volunteer_id = %id, "Volunteer disconnected");
            }
        }
        None => {}
    }
}

pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// The registry entry a connection registered as. Stored beside the
/// connection handle so close-cleanup is O(1) instead of a reverse scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisteredParty {
    Responder(String),
    Volunteer(String),
}

//! Notification fan-out: push typed events to computed subsets of the
//! connected parties.
//!
//! Delivery is push-only and best-effort. A party that disconnected
//! between selection and send just drops the frame; nothing is queued or
//! retried.

use axum::extract::ws::Message;

use crate::emergency::Emergency;
use crate::matching;
use crate::messages::{EmergencyAlertData, ServerMessage};
use crate::registry::Registry;
use crate::state::AppState;
use crate::ws::ConnectionSender;

/// Serialize and send one frame. Send failures mean the receiver side of
/// the connection channel is gone; they are swallowed here.
pub fn send_message(tx: &ConnectionSender, message: &ServerMessage) {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize outbound frame");
            return;
        }
    };
    if tx.send(Message::Text(text.into())).is_err() {
        tracing::debug!("Dropped frame for disconnected party");
    }
}

/// Push to responders currently marked available.
pub fn push_to_available_responders(registry: &Registry, message: &ServerMessage) {
    for tx in matching::select_responders(registry) {
        send_message(&tx, message);
    }
}

/// Push to every connected responder regardless of status. Used for the
/// status and acceptance broadcasts that keep shared situational
/// awareness.
pub fn push_to_all_responders(registry: &Registry, message: &ServerMessage) {
    for tx in registry.responder_senders(|_| true) {
        send_message(&tx, message);
    }
}

/// Push to one volunteer, if still connected.
pub fn push_to_volunteer(registry: &Registry, volunteer_id: &str, message: &ServerMessage) {
    if let Some(snapshot) = registry.volunteer_snapshot(volunteer_id) {
        send_message(&snapshot.tx, message);
    }
}

/// Fan out a newly created emergency: `new_emergency` to available
/// responders, `emergency_alert` to matched volunteers with their
/// per-volunteer distance and language annotations.
pub fn announce_emergency(state: &AppState, emergency: &Emergency) {
    push_to_available_responders(
        &state.registry,
        &ServerMessage::NewEmergency {
            data: emergency.clone(),
        },
    );

    let matches = matching::select_volunteers(&state.registry, emergency, &state.policy);
    let alerted = matches.len();
    for m in matches {
        let alert = ServerMessage::EmergencyAlert {
            data: EmergencyAlertData {
                emergency: emergency.clone(),
                distance: m.distance_km,
                preferred_language: m.preferred_language,
            },
        };
        send_message(&m.snapshot.tx, &alert);
    }

    tracing::info!(
        emergency_id = %emergency.id,
        volunteers_alerted = alerted,
        "Emergency announced"
    );
}

//! Inbound frame dispatch for a registered or unregistered connection.
//!
//! Operations referencing unknown identities are ignored without a
//! reply: stale or out-of-order client state is tolerated, not punished.
//! Unparseable frames are logged and the connection stays open.

use crate::emergency::{valid_contact_phone, AcceptedVolunteer};
use crate::geo::{self, GeoPoint};
use crate::matching;
use crate::messages::{ClientMessage, ServerMessage, VolunteerDecision, VolunteerDetails};
use crate::registry::{NewVolunteer, ResponderStatus};
use crate::skills;
use crate::state::AppState;
use crate::ws::broadcast::{push_to_all_responders, push_to_volunteer, send_message};
use crate::ws::{ConnectionSender, RegisteredParty};

/// Handle one inbound text frame, updating the connection's session
/// state on successful registration.
pub fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    session: &mut Option<RegisteredParty>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse inbound frame");
            return;
        }
    };

    match message {
        ClientMessage::ResponderRegister {
            responder_id,
            location,
            name,
            phone,
            vehicle,
        } => {
            handle_responder_register(tx, state, session, responder_id, location, name, phone, vehicle);
        }
        ClientMessage::ResponderLocation {
            responder_id,
            location,
        } => {
            // Sub-threshold moves are discarded without a broadcast.
            if state.registry.update_responder_location(&responder_id, location) == Some(true) {
                push_to_all_responders(
                    &state.registry,
                    &ServerMessage::ResponderLocation {
                        responder_id,
                        location,
                    },
                );
            }
        }
        ClientMessage::ResponderStatus {
            responder_id,
            status,
        } => {
            if state.registry.update_responder_status(&responder_id, status) {
                push_to_all_responders(
                    &state.registry,
                    &ServerMessage::ResponderStatus {
                        responder_id,
                        status,
                    },
                );
            }
        }
        ClientMessage::VolunteerRegister {
            volunteer_id,
            location,
            skills,
            availability,
            first_name,
            last_name,
            phone,
            languages,
        } => {
            handle_volunteer_register(
                tx,
                state,
                session,
                volunteer_id,
                location,
                skills,
                availability,
                first_name,
                last_name,
                phone,
                languages,
            );
        }
        ClientMessage::VolunteerResponse {
            emergency_id,
            volunteer_id,
            response,
        } => {
            handle_volunteer_response(state, &emergency_id, &volunteer_id, response);
        }
        ClientMessage::EmergencyAccept {
            emergency_id,
            responder_id,
        } => {
            if let Some(updated) = state.emergencies.set_accepted(&emergency_id, &responder_id) {
                tracing::info!(
                    emergency_id = %emergency_id,
                    responder_id = %responder_id,
                    "Emergency accepted"
                );
                push_to_all_responders(
                    &state.registry,
                    &ServerMessage::EmergencyUpdate { data: updated },
                );
            }
        }
        ClientMessage::VolunteerComplete {
            emergency_id,
            volunteer_id,
        } => {
            handle_volunteer_complete(state, &emergency_id, &volunteer_id);
        }
        ClientMessage::Unknown => {
            tracing::warn!("Unknown message type");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_responder_register(
    tx: &ConnectionSender,
    state: &AppState,
    session: &mut Option<RegisteredParty>,
    responder_id: Option<String>,
    location: GeoPoint,
    name: String,
    phone: Option<String>,
    vehicle: Option<String>,
) {
    replace_existing_registration(state, session);

    let id = state
        .registry
        .register_responder(responder_id, tx.clone(), location, name, phone, vehicle);
    *session = Some(RegisteredParty::Responder(id.clone()));

    tracing::info!(responder_id = %id, "Responder registered");

    send_message(
        tx,
        &ServerMessage::ResponderConnected {
            responder_id: id.clone(),
        },
    );
    push_to_all_responders(
        &state.registry,
        &ServerMessage::ResponderStatus {
            responder_id: id,
            status: ResponderStatus::Available,
        },
    );
}

#[allow(clippy::too_many_arguments)]
fn handle_volunteer_register(
    tx: &ConnectionSender,
    state: &AppState,
    session: &mut Option<RegisteredParty>,
    volunteer_id: String,
    location: GeoPoint,
    skills: Vec<String>,
    availability: Vec<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: String,
    languages: Vec<String>,
) {
    let mut errors = Vec::new();
    if !valid_contact_phone(&phone) {
        errors.push("Invalid phone number".to_string());
    }
    if !state.policy.region.contains(location.lat, location.lng) {
        errors.push("Location is outside the service region".to_string());
    }
    if !errors.is_empty() {
        // Registration failure leaves the session unregistered.
        send_message(
            tx,
            &ServerMessage::Error {
                message: "Validation failed".to_string(),
                errors: Some(errors),
            },
        );
        return;
    }

    replace_existing_registration(state, session);

    let classified = skills::classify_skills(&skills);
    state.registry.register_volunteer(
        volunteer_id.clone(),
        tx.clone(),
        NewVolunteer {
            location,
            skills: classified,
            availability,
            first_name: first_name.unwrap_or_else(|| "Volunteer".to_string()),
            last_name: last_name.unwrap_or_else(|| "User".to_string()),
            phone,
            languages,
        },
    );
    *session = Some(RegisteredParty::Volunteer(volunteer_id.clone()));

    tracing::info!(volunteer_id = %volunteer_id, "Volunteer registered");

    send_message(tx, &ServerMessage::RegistrationSuccess { volunteer_id });
}

fn handle_volunteer_response(
    state: &AppState,
    emergency_id: &str,
    volunteer_id: &str,
    response: VolunteerDecision,
) {
    // Both ends must still be tracked; otherwise the response is stale.
    let Some(emergency) = state.emergencies.get(emergency_id) else {
        return;
    };
    let Some(volunteer) = state.registry.volunteer_snapshot(volunteer_id) else {
        return;
    };

    match response {
        VolunteerDecision::Accepted => {
            let distance = matching::round_distance(geo::distance_km(
                emergency.coordinates.lat,
                emergency.coordinates.lng,
                volunteer.location.lat,
                volunteer.location.lng,
            ));

            state
                .registry
                .set_volunteer_responding(volunteer_id, emergency_id);
            state.emergencies.append_volunteer_acceptance(
                emergency_id,
                AcceptedVolunteer {
                    id: volunteer_id.to_string(),
                    name: volunteer.display_name(),
                    skills: volunteer.skills.clone(),
                    distance,
                    completed: false,
                },
            );

            tracing::info!(
                emergency_id = %emergency_id,
                volunteer_id = %volunteer_id,
                "Volunteer accepted"
            );

            push_to_all_responders(
                &state.registry,
                &ServerMessage::VolunteerResponse {
                    emergency_id: emergency_id.to_string(),
                    volunteer_id: volunteer_id.to_string(),
                    response: VolunteerDecision::Accepted,
                    volunteer_details: VolunteerDetails {
                        name: volunteer.display_name(),
                        skills: volunteer.skills.clone(),
                        distance,
                        phone: volunteer.phone.clone(),
                    },
                },
            );

            let responder_contact = state
                .registry
                .first_available_responder_phone()
                .unwrap_or_else(|| state.policy.fallback_contact.clone());
            push_to_volunteer(
                &state.registry,
                volunteer_id,
                &ServerMessage::ResponseConfirmation {
                    emergency_id: emergency_id.to_string(),
                    status: VolunteerDecision::Accepted,
                    responder_contact: Some(responder_contact),
                },
            );
        }
        VolunteerDecision::Declined => {
            push_to_volunteer(
                &state.registry,
                volunteer_id,
                &ServerMessage::ResponseConfirmation {
                    emergency_id: emergency_id.to_string(),
                    status: VolunteerDecision::Declined,
                    responder_contact: None,
                },
            );
        }
    }
}

fn handle_volunteer_complete(state: &AppState, emergency_id: &str, volunteer_id: &str) {
    if !state.emergencies.contains(emergency_id) {
        return;
    }

    state.registry.set_volunteer_available(volunteer_id);
    state
        .emergencies
        .mark_volunteer_completed(emergency_id, volunteer_id);

    tracing::info!(
        emergency_id = %emergency_id,
        volunteer_id = %volunteer_id,
        "Volunteer completed response"
    );

    push_to_all_responders(
        &state.registry,
        &ServerMessage::VolunteerUpdate {
            emergency_id: emergency_id.to_string(),
            volunteer_id: volunteer_id.to_string(),
            status: "completed".to_string(),
        },
    );
}

/// A registration frame on an already-registered connection replaces the
/// previous entry, keeping the socket-to-entry mapping one-to-one.
fn replace_existing_registration(state: &AppState, session: &mut Option<RegisteredParty>) {
    match session.take() {
        Some(RegisteredParty::Responder(id)) => {
            tracing::warn!(responder_id = %id, "Re-registration replaces previous responder entry");
            state.registry.remove_responder(&id);
        }
        Some(RegisteredParty::Volunteer(id)) => {
            tracing::warn!(volunteer_id = %id, "Re-registration replaces previous volunteer entry");
            state.registry.remove_volunteer(&id);
        }
        None => {}
    }
}

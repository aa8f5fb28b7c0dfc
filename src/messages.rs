//! Wire contract for the WebSocket protocol.
//!
//! Every frame is JSON text carrying a `type` discriminator. Inbound
//! frames form a closed tagged union; unrecognized types land on the
//! explicit `Unknown` variant instead of falling through silently.

use serde::{Deserialize, Serialize};

use crate::emergency::Emergency;
use crate::geo::GeoPoint;
use crate::registry::ResponderStatus;
use crate::skills::SkillCategory;

/// Volunteer's answer to an emergency alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerDecision {
    Accepted,
    Declined,
}

/// Inbound client frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    ResponderRegister {
        #[serde(default)]
        responder_id: Option<String>,
        location: GeoPoint,
        name: String,
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        vehicle: Option<String>,
    },
    ResponderLocation {
        responder_id: String,
        location: GeoPoint,
    },
    ResponderStatus {
        responder_id: String,
        status: ResponderStatus,
    },
    VolunteerRegister {
        volunteer_id: String,
        location: GeoPoint,
        skills: Vec<String>,
        #[serde(default)]
        availability: Vec<String>,
        #[serde(default)]
        first_name: Option<String>,
        #[serde(default)]
        last_name: Option<String>,
        phone: String,
        #[serde(default)]
        languages: Vec<String>,
    },
    VolunteerResponse {
        emergency_id: String,
        volunteer_id: String,
        response: VolunteerDecision,
    },
    EmergencyAccept {
        emergency_id: String,
        responder_id: String,
    },
    VolunteerComplete {
        emergency_id: String,
        volunteer_id: String,
    },
    #[serde(other)]
    Unknown,
}

/// Volunteer contact details attached to a responder-facing acceptance
/// notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerDetails {
    pub name: String,
    pub skills: Vec<SkillCategory>,
    /// Distance from the emergency, km, one decimal.
    pub distance: f64,
    pub phone: String,
}

/// Emergency payload of a volunteer-targeted alert: the emergency record
/// plus the per-volunteer annotations computed by matching.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlertData {
    #[serde(flatten)]
    pub emergency: Emergency,
    /// Distance from the volunteer, km, one decimal.
    pub distance: f64,
    pub preferred_language: String,
}

/// Outbound server frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ResponderConnected {
        responder_id: String,
    },
    RegistrationSuccess {
        volunteer_id: String,
    },
    ResponderStatus {
        responder_id: String,
        status: ResponderStatus,
    },
    ResponderLocation {
        responder_id: String,
        location: GeoPoint,
    },
    NewEmergency {
        data: Emergency,
    },
    EmergencyAlert {
        data: EmergencyAlertData,
    },
    EmergencyUpdate {
        data: Emergency,
    },
    VolunteerResponse {
        emergency_id: String,
        volunteer_id: String,
        response: VolunteerDecision,
        volunteer_details: VolunteerDetails,
    },
    ResponseConfirmation {
        emergency_id: String,
        status: VolunteerDecision,
        #[serde(skip_serializing_if = "Option::is_none")]
        responder_contact: Option<String>,
    },
    VolunteerUpdate {
        emergency_id: String,
        volunteer_id: String,
        status: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        errors: Option<Vec<String>>,
    },
}

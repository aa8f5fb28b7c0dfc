//! In-memory registries of connected responders and volunteers.
//!
//! Entries are keyed by party identity and own the connection sender
//! handle used for push delivery. Entries live exactly as long as their
//! socket; removal is idempotent. Methods return owned snapshots so no
//! map guard is ever held across a send or a second lookup.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{self, GeoPoint};
use crate::skills::SkillCategory;
use crate::ws::ConnectionSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolunteerStatus {
    Available,
    Responding,
    Offline,
}

/// Verification references recorded at registration. Recorded only,
/// never enforced.
#[derive(Debug, Clone, Default)]
pub struct Verification {
    pub id_proof: Option<String>,
    pub training_cert: Option<String>,
}

pub struct ResponderEntry {
    pub tx: ConnectionSender,
    pub location: GeoPoint,
    pub status: ResponderStatus,
    pub name: String,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
    pub last_update: DateTime<Utc>,
}

pub struct VolunteerEntry {
    pub tx: ConnectionSender,
    pub location: GeoPoint,
    pub skills: Vec<SkillCategory>,
    pub availability: Vec<String>,
    pub status: VolunteerStatus,
    /// Set iff status is `Responding`.
    pub current_emergency: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub languages: Vec<String>,
    pub verification: Verification,
    pub last_active: DateTime<Utc>,
}

/// Owned snapshot of a volunteer, handed to matching and fan-out.
#[derive(Clone)]
pub struct VolunteerSnapshot {
    pub id: String,
    pub tx: ConnectionSender,
    pub location: GeoPoint,
    pub skills: Vec<SkillCategory>,
    pub status: VolunteerStatus,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub languages: Vec<String>,
}

impl VolunteerSnapshot {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// First entry of the language list, defaulting to "en".
    pub fn preferred_language(&self) -> String {
        self.languages
            .first()
            .cloned()
            .unwrap_or_else(|| "en".to_string())
    }
}

pub struct NewVolunteer {
    pub location: GeoPoint,
    pub skills: Vec<SkillCategory>,
    pub availability: Vec<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub languages: Vec<String>,
}

/// Registry of connected parties.
pub struct Registry {
    responders: DashMap<String, ResponderEntry>,
    volunteers: DashMap<String, VolunteerEntry>,
    /// Location updates below this distance are discarded.
    min_move_km: f64,
}

impl Registry {
    pub fn new(min_move_km: f64) -> Self {
        Self {
            responders: DashMap::new(),
            volunteers: DashMap::new(),
            min_move_km,
        }
    }

    /// Register a responder. When no identity is supplied the registry
    /// assigns an opaque token; caller-supplied identities are trusted.
    pub fn register_responder(
        &self,
        identity: Option<String>,
        tx: ConnectionSender,
        location: GeoPoint,
        name: String,
        phone: Option<String>,
        vehicle: Option<String>,
    ) -> String {
        let id = identity.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.responders.insert(
            id.clone(),
            ResponderEntry {
                tx,
                location,
                status: ResponderStatus::Available,
                name,
                phone,
                vehicle,
                last_update: Utc::now(),
            },
        );
        id
    }

    /// Register a volunteer under its caller-supplied identity.
    pub fn register_volunteer(&self, id: String, tx: ConnectionSender, details: NewVolunteer) {
        self.volunteers.insert(
            id,
            VolunteerEntry {
                tx,
                location: details.location,
                skills: details.skills,
                availability: details.availability,
                status: VolunteerStatus::Available,
                current_emergency: None,
                first_name: details.first_name,
                last_name: details.last_name,
                phone: details.phone,
                languages: details.languages,
                verification: Verification::default(),
                last_active: Utc::now(),
            },
        );
    }

    /// Apply a responder location update if it moved far enough.
    ///
    /// Returns `None` for unknown identities, `Some(false)` when the move
    /// was below the significance threshold (nothing stored, no broadcast
    /// due), `Some(true)` when the location was replaced.
    pub fn update_responder_location(&self, id: &str, location: GeoPoint) -> Option<bool> {
        let mut entry = self.responders.get_mut(id)?;
        let moved = geo::distance_between(entry.location, location);
        if moved <= self.min_move_km {
            return Some(false);
        }
        entry.location = location;
        entry.last_update = Utc::now();
        Some(true)
    }

    /// Returns whether the identity was known.
    pub fn update_responder_status(&self, id: &str, status: ResponderStatus) -> bool {
        match self.responders.get_mut(id) {
            Some(mut entry) => {
                entry.status = status;
                entry.last_update = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a responder. Idempotent: removing an absent identity is a
    /// no-op returning `false`. A `true` result means the caller owes the
    /// one offline status broadcast.
    pub fn remove_responder(&self, id: &str) -> bool {
        self.responders.remove(id).is_some()
    }

    /// Remove a volunteer. Idempotent. No broadcast is due on volunteer
    /// removal.
    pub fn remove_volunteer(&self, id: &str) -> bool {
        self.volunteers.remove(id).is_some()
    }

    /// First available responder's phone, if any responder carries one.
    pub fn first_available_responder_phone(&self) -> Option<String> {
        self.responders
            .iter()
            .filter(|e| e.status == ResponderStatus::Available)
            .find_map(|e| e.phone.clone())
    }

    /// Sender handles for responders matching `predicate`.
    pub fn responder_senders(
        &self,
        predicate: impl Fn(&ResponderEntry) -> bool,
    ) -> Vec<ConnectionSender> {
        self.responders
            .iter()
            .filter(|e| predicate(e.value()))
            .map(|e| e.tx.clone())
            .collect()
    }

    /// Snapshots of all volunteers matching `predicate`.
    pub fn volunteer_snapshots(
        &self,
        predicate: impl Fn(&VolunteerEntry) -> bool,
    ) -> Vec<VolunteerSnapshot> {
        self.volunteers
            .iter()
            .filter(|e| predicate(e.value()))
            .map(|e| VolunteerSnapshot {
                id: e.key().clone(),
                tx: e.tx.clone(),
                location: e.location,
                skills: e.skills.clone(),
                status: e.status,
                first_name: e.first_name.clone(),
                last_name: e.last_name.clone(),
                phone: e.phone.clone(),
                languages: e.languages.clone(),
            })
            .collect()
    }

    /// Snapshot of a single volunteer.
    pub fn volunteer_snapshot(&self, id: &str) -> Option<VolunteerSnapshot> {
        self.volunteers.get(id).map(|e| VolunteerSnapshot {
            id: id.to_string(),
            tx: e.tx.clone(),
            location: e.location,
            skills: e.skills.clone(),
            status: e.status,
            first_name: e.first_name.clone(),
            last_name: e.last_name.clone(),
            phone: e.phone.clone(),
            languages: e.languages.clone(),
        })
    }

    /// Mark a volunteer as responding to an emergency.
    pub fn set_volunteer_responding(&self, id: &str, emergency_id: &str) -> bool {
        match self.volunteers.get_mut(id) {
            Some(mut entry) => {
                entry.status = VolunteerStatus::Responding;
                entry.current_emergency = Some(emergency_id.to_string());
                entry.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Return a volunteer to the available pool, clearing its current
    /// emergency reference.
    pub fn set_volunteer_available(&self, id: &str) -> bool {
        match self.volunteers.get_mut(id) {
            Some(mut entry) => {
                entry.status = VolunteerStatus::Available;
                entry.current_emergency = None;
                entry.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn responder_count(&self) -> usize {
        self.responders.len()
    }

    pub fn volunteer_count(&self) -> usize {
        self.volunteers.len()
    }
}

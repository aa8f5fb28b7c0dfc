//! Selection of notification recipients for a new emergency.
//!
//! All matches are notified: no ranking, no capacity cap, no best-K
//! selection. Scans are linear over the connected population.

use crate::config::DispatchPolicy;
use crate::emergency::Emergency;
use crate::geo;
use crate::registry::{Registry, ResponderStatus, VolunteerSnapshot, VolunteerStatus};
use crate::ws::ConnectionSender;

/// A volunteer selected for alerting, annotated with the values the
/// outbound alert consumes verbatim.
pub struct VolunteerMatch {
    pub snapshot: VolunteerSnapshot,
    /// Distance from the emergency, km, rounded to one decimal.
    pub distance_km: f64,
    pub preferred_language: String,
}

/// Round a distance to one decimal place for the wire.
pub fn round_distance(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

/// All responders currently available, unordered. Broadcast target, not
/// a ranking.
pub fn select_responders(registry: &Registry) -> Vec<ConnectionSender> {
    registry.responder_senders(|r| r.status == ResponderStatus::Available)
}

/// Volunteers eligible for an emergency alert: available, inside the
/// severity radius, and carrying the skill category the emergency type
/// requires. Types outside {medical, rescue} bypass the skill filter.
pub fn select_volunteers(
    registry: &Registry,
    emergency: &Emergency,
    policy: &DispatchPolicy,
) -> Vec<VolunteerMatch> {
    let radius_km = policy.radius_for_severity(emergency.severity);
    let required = emergency.kind.required_category();

    registry
        .volunteer_snapshots(|v| v.status == VolunteerStatus::Available)
        .into_iter()
        .filter_map(|snapshot| {
            let distance = geo::distance_km(
                emergency.coordinates.lat,
                emergency.coordinates.lng,
                snapshot.location.lat,
                snapshot.location.lng,
            );
            if distance > radius_km {
                return None;
            }
            if let Some(category) = required {
                if !snapshot.skills.contains(&category) {
                    return None;
                }
            }
            let preferred_language = snapshot.preferred_language();
            Some(VolunteerMatch {
                snapshot,
                distance_km: round_distance(distance),
                preferred_language,
            })
        })
        .collect()
}

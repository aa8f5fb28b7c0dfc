//! Emergency records: lifecycle state, creation validation, and the
//! in-memory store that is the single source of truth for status and
//! assignment. Records are retained for the process lifetime so late
//! joiners and audits can still look them up.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DispatchPolicy, RegionBounds};
use crate::error::DispatchError;
use crate::skills::SkillCategory;

/// Incident type. Unrecognized values fold into `Other`, which bypasses
/// the skill filter during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EmergencyType {
    Medical,
    Rescue,
    Other,
}

impl From<String> for EmergencyType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "medical" => Self::Medical,
            "rescue" => Self::Rescue,
            _ => Self::Other,
        }
    }
}

impl EmergencyType {
    /// The skill category a volunteer must carry to be alerted, if any.
    pub fn required_category(self) -> Option<SkillCategory> {
        match self {
            Self::Medical => Some(SkillCategory::Medical),
            Self::Rescue => Some(SkillCategory::Rescue),
            Self::Other => None,
        }
    }
}

/// Reported severity. Unrecognized values are admitted as `Unknown` so the
/// default alert radius applies instead of rejecting the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Unknown,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }
}

/// Lifecycle status: pending -> accepted -> resolved. Resolved is reached
/// only through volunteer completion events; acceptance is re-triggerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyStatus {
    Pending,
    Accepted,
    Resolved,
}

/// Coordinates as reported at submission. The `verified` flag is asserted
/// by the submitting layer and required for creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReportedCoordinates {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub verified: bool,
}

/// A volunteer acceptance recorded against an emergency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedVolunteer {
    pub id: String,
    pub name: String,
    pub skills: Vec<SkillCategory>,
    /// Distance from the emergency at acceptance time, km, one decimal.
    pub distance: f64,
    #[serde(default)]
    pub completed: bool,
}

/// A tracked emergency. Identity is immutable once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emergency {
    pub id: String,
    pub name: String,
    pub contact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub coordinates: ReportedCoordinates,
    #[serde(rename = "type")]
    pub kind: EmergencyType,
    pub severity: Severity,
    pub status: EmergencyStatus,
    pub assigned_responder: Option<String>,
    pub accepted_volunteers: Vec<AcceptedVolunteer>,
    pub timestamp: String,
}

/// Inbound report payload at the submission boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyReport {
    #[serde(default)]
    pub name: Option<String>,
    pub contact: String,
    #[serde(default)]
    pub location: Option<String>,
    pub coordinates: ReportedCoordinates,
    #[serde(rename = "type")]
    pub kind: EmergencyType,
    pub severity: Severity,
}

/// Strict national phone format: +91 followed by 10 digits, first of which
/// is 6-9.
pub fn valid_contact_phone(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix("+91") else {
        return false;
    };
    if digits.len() != 10 {
        return false;
    }
    let mut chars = digits.chars();
    matches!(chars.next(), Some('6'..='9')) && chars.all(|c| c.is_ascii_digit())
}

/// In-memory emergency store.
pub struct EmergencyStore {
    emergencies: DashMap<String, Emergency>,
    region: RegionBounds,
    reporter_placeholder: String,
}

impl EmergencyStore {
    pub fn new(policy: &DispatchPolicy) -> Self {
        Self {
            emergencies: DashMap::new(),
            region: policy.region,
            reporter_placeholder: policy.reporter_placeholder.clone(),
        }
    }

    /// Validate a report and create the emergency in `pending` state.
    /// On validation failure nothing is stored.
    pub fn create(&self, report: EmergencyReport) -> Result<Emergency, DispatchError> {
        let mut errors = Vec::new();

        if !valid_contact_phone(&report.contact) {
            errors.push("Invalid contact phone number".to_string());
        }

        if !report.coordinates.verified {
            errors.push("Coordinates must be verified".to_string());
        } else if !self
            .region
            .contains(report.coordinates.lat, report.coordinates.lng)
        {
            errors.push("Location is outside the service region".to_string());
        }

        if !errors.is_empty() {
            return Err(DispatchError::validation(errors));
        }

        let emergency = Emergency {
            id: Uuid::new_v4().to_string(),
            name: report
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| self.reporter_placeholder.clone()),
            contact: report.contact,
            location: report.location,
            coordinates: report.coordinates,
            kind: report.kind,
            severity: report.severity,
            status: EmergencyStatus::Pending,
            assigned_responder: None,
            accepted_volunteers: Vec::new(),
            timestamp: Utc::now().to_rfc3339(),
        };

        self.emergencies
            .insert(emergency.id.clone(), emergency.clone());
        Ok(emergency)
    }

    /// Snapshot of a tracked emergency.
    pub fn get(&self, id: &str) -> Option<Emergency> {
        self.emergencies.get(id).map(|e| e.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.emergencies.contains_key(id)
    }

    /// Record responder acceptance. Policy: last-write-wins — a later
    /// acceptance reassigns the responder rather than being rejected.
    /// Returns the updated record for broadcast, or `None` if untracked.
    pub fn set_accepted(&self, id: &str, responder_id: &str) -> Option<Emergency> {
        let mut entry = self.emergencies.get_mut(id)?;
        entry.status = EmergencyStatus::Accepted;
        entry.assigned_responder = Some(responder_id.to_string());
        Some(entry.clone())
    }

    /// Append a volunteer acceptance record. Returns the updated record,
    /// or `None` if untracked.
    pub fn append_volunteer_acceptance(
        &self,
        id: &str,
        record: AcceptedVolunteer,
    ) -> Option<Emergency> {
        let mut entry = self.emergencies.get_mut(id)?;
        entry.accepted_volunteers.push(record);
        Some(entry.clone())
    }

    /// Flag a volunteer's acceptance as completed. When every accepted
    /// volunteer of a non-empty list has completed, the emergency
    /// transitions to `resolved` — the only path to that state.
    pub fn mark_volunteer_completed(
        &self,
        id: &str,
        volunteer_id: &str,
    ) -> Option<Emergency> {
        let mut entry = self.emergencies.get_mut(id)?;
        for record in entry
            .accepted_volunteers
            .iter_mut()
            .filter(|r| r.id == volunteer_id)
        {
            record.completed = true;
        }
        if !entry.accepted_volunteers.is_empty()
            && entry.accepted_volunteers.iter().all(|r| r.completed)
        {
            entry.status = EmergencyStatus::Resolved;
        }
        Some(entry.clone())
    }
}

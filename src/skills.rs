//! Classification of free-text volunteer skill tags into dispatch categories.

use serde::{Deserialize, Serialize};

/// The fixed skill categories used for targeted alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Medical,
    Rescue,
    Logistics,
}

/// Raw tags recognized as medical capability.
const MEDICAL_TAGS: &[&str] = &["first-aid", "cpr", "emt", "nurse", "doctor"];

/// Raw tags recognized as rescue capability.
const RESCUE_TAGS: &[&str] = &["swimming", "climbing", "firefighting"];

/// Raw tags recognized as logistics capability.
const LOGISTICS_TAGS: &[&str] = &["driver", "translator", "counselor"];

/// Map a single raw tag to its category. Unrecognized tags map to nothing.
pub fn category_for_tag(tag: &str) -> Option<SkillCategory> {
    if MEDICAL_TAGS.contains(&tag) {
        Some(SkillCategory::Medical)
    } else if RESCUE_TAGS.contains(&tag) {
        Some(SkillCategory::Rescue)
    } else if LOGISTICS_TAGS.contains(&tag) {
        Some(SkillCategory::Logistics)
    } else {
        None
    }
}

/// Classify a list of raw skill tags into the category set.
/// Unrecognized tags are dropped silently and duplicate categories collapse.
pub fn classify_skills(raw_tags: &[String]) -> Vec<SkillCategory> {
    let mut categories = Vec::new();
    for tag in raw_tags {
        if let Some(category) = category_for_tag(tag) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
    }
    categories
}

use std::sync::Arc;

use crate::config::DispatchPolicy;
use crate::emergency::EmergencyStore;
use crate::registry::Registry;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The registries and store are process-lifetime owned objects injected
/// here, never process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    /// Connected responders and volunteers
    pub registry: Arc<Registry>,
    /// Tracked emergencies, single source of truth for status/assignment
    pub emergencies: Arc<EmergencyStore>,
    /// Policy tables: radii, thresholds, region bounds
    pub policy: Arc<DispatchPolicy>,
}

impl AppState {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            registry: Arc::new(Registry::new(policy.min_move_km)),
            emergencies: Arc::new(EmergencyStore::new(&policy)),
            policy: Arc::new(policy),
        }
    }
}

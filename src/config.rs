use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::emergency::Severity;

/// Emergency dispatch coordination server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "dispatch-server", version, about = "Emergency dispatch coordination server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "DISPATCH_PORT", default_value = "8000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "DISPATCH_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./dispatch.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "DISPATCH_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Dispatch policy tables (loaded from [dispatch] section in TOML)
    #[arg(skip)]
    #[serde(default = "default_dispatch_policy")]
    pub dispatch: Option<DispatchPolicy>,
}

/// Policy tables for matching and validation. Kept out of the matching
/// logic so radii and region bounds can change without touching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPolicy {
    /// Volunteer alert radius for low-severity emergencies (km)
    #[serde(default = "default_radius_low")]
    pub radius_low_km: f64,

    /// Volunteer alert radius for medium-severity emergencies (km)
    #[serde(default = "default_radius_medium")]
    pub radius_medium_km: f64,

    /// Volunteer alert radius for high-severity emergencies (km)
    #[serde(default = "default_radius_high")]
    pub radius_high_km: f64,

    /// Fallback radius for unrecognized severity values (km)
    #[serde(default = "default_radius_fallback")]
    pub radius_default_km: f64,

    /// Minimum movement before a location update is applied (km)
    #[serde(default = "default_min_move")]
    pub min_move_km: f64,

    /// Display name recorded when a report omits one
    #[serde(default = "default_reporter_placeholder")]
    pub reporter_placeholder: String,

    /// Contact handed to volunteers when no responder phone is known
    #[serde(default = "default_fallback_contact")]
    pub fallback_contact: String,

    /// Accepted coordinate region for reported emergencies
    #[serde(default)]
    pub region: RegionBounds,
}

/// Bounding box reported coordinates must fall inside.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl RegionBounds {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lng_min..=self.lng_max).contains(&lng)
    }
}

impl Default for RegionBounds {
    // Covers the Indian subcontinent service region.
    fn default() -> Self {
        Self {
            lat_min: 8.4,
            lat_max: 37.6,
            lng_min: 68.1,
            lng_max: 97.4,
        }
    }
}

impl DispatchPolicy {
    /// Severity to alert-radius lookup. Unrecognized severities use the
    /// configured default radius.
    pub fn radius_for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.radius_low_km,
            Severity::Medium => self.radius_medium_km,
            Severity::High => self.radius_high_km,
            Severity::Unknown => self.radius_default_km,
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            radius_low_km: default_radius_low(),
            radius_medium_km: default_radius_medium(),
            radius_high_km: default_radius_high(),
            radius_default_km: default_radius_fallback(),
            min_move_km: default_min_move(),
            reporter_placeholder: default_reporter_placeholder(),
            fallback_contact: default_fallback_contact(),
            region: RegionBounds::default(),
        }
    }
}

fn default_radius_low() -> f64 {
    5.0
}

fn default_radius_medium() -> f64 {
    10.0
}

fn default_radius_high() -> f64 {
    20.0
}

fn default_radius_fallback() -> f64 {
    10.0
}

fn default_min_move() -> f64 {
    0.05
}

fn default_reporter_placeholder() -> String {
    "Ankit Sharma".to_string()
}

fn default_fallback_contact() -> String {
    "Emergency Services".to_string()
}

fn default_dispatch_policy() -> Option<DispatchPolicy> {
    Some(DispatchPolicy::default())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./dispatch.toml".to_string(),
            json_logs: false,
            generate_config: false,
            dispatch: Some(DispatchPolicy::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (DISPATCH_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("DISPATCH_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Emergency Dispatch Coordination Server Configuration
# Place this file at ./dispatch.toml or specify with --config <path>
# All settings can be overridden via environment variables (DISPATCH_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- Dispatch Policy ----
# [dispatch]

# Volunteer alert radius per emergency severity, in kilometers
# radius_low_km = 5.0
# radius_medium_km = 10.0
# radius_high_km = 20.0
# radius_default_km = 10.0

# Minimum movement before a responder location update is applied (km)
# min_move_km = 0.05

# Display name recorded when a report omits one
# reporter_placeholder = "Ankit Sharma"

# Contact handed to volunteers when no responder phone is known
# fallback_contact = "Emergency Services"

# Accepted coordinate region for reported emergencies
# [dispatch.region]
# lat_min = 8.4
# lat_max = 37.6
# lng_min = 68.1
# lng_max = 97.4
"#
    .to_string()
}

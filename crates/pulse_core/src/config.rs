use crate::error::{PulseError, Result};
use crate::schema::Urgency;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Tunable triage thresholds. Every field has a default matching the
/// shipped decision rules, so a config file only needs to name what it
/// overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriageConfig {
    pub base_priority: f64,
    pub safety_bonus: f64,
    pub vote_surge_threshold: u32,
    pub vote_surge_bonus: f64,
    pub vote_notable_threshold: u32,
    pub vote_notable_bonus: f64,
    pub max_similar: usize,
    pub response_hours: ResponseHours,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            base_priority: 3.0,
            safety_bonus: 1.0,
            vote_surge_threshold: 10,
            vote_surge_bonus: 1.0,
            vote_notable_threshold: 5,
            vote_notable_bonus: 0.5,
            max_similar: 3,
            response_hours: ResponseHours::default(),
        }
    }
}

/// Estimated response time by urgency. The values must stay inside the
/// 24..=71 hour envelope the dashboards were built around.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseHours {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low_medium: u32,
    pub low: u32,
}

impl Default for ResponseHours {
    fn default() -> Self {
        Self {
            critical: 24,
            high: 36,
            medium: 48,
            low_medium: 60,
            low: 71,
        }
    }
}

impl ResponseHours {
    pub fn for_urgency(&self, urgency: Urgency) -> u32 {
        match urgency {
            Urgency::Critical => self.critical,
            Urgency::High => self.high,
            Urgency::Medium => self.medium,
            Urgency::LowMedium => self.low_medium,
            Urgency::Low => self.low,
        }
    }
}

impl TriageConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            PulseError::InvalidInput(format!("cannot read config {}: {err}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|err| PulseError::InvalidInput(format!("malformed config: {err}")))
    }
}

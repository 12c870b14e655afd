use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

fn default_schema_version() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Whether the respondent is sent to the confirmation page before or
/// after the relay acknowledges the submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    AwaitAck,
    FireAndForget,
}

impl SubmitMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "await_ack" | "await" => Some(SubmitMode::AwaitAck),
            "fire_and_forget" | "fire" => Some(SubmitMode::FireAndForget),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub endpoint: String,
    pub confirmation_url: String,
    pub submit_mode: SubmitMode,
    pub captcha: bool,
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://formsubmit.co/contact@buildlab.fr".to_string(),
            confirmation_url: "https://audiopoll.buildlab.fr/merci".to_string(),
            submit_mode: SubmitMode::AwaitAck,
            captcha: false,
            timeout_ms: 10_000,
        }
    }
}

/// Required listening is `ceil(duration * threshold_fraction)` seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningConfig {
    pub threshold_fraction: f64,
    pub max_plausible_gap_secs: f64,
}

impl Default for ListeningConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.25,
            max_plausible_gap_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FlowConfig {
    /// Skip course selection and go straight to this course.
    pub fixed_course: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub tick_ms: u64,
    pub skip_secs: f64,
    pub block_first_play: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            skip_secs: 10.0,
            block_first_play: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub listening: ListeningConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            log_level: default_log_level(),
            relay: RelayConfig::default(),
            listening: ListeningConfig::default(),
            flow: FlowConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(data)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self, catalog: &Catalog) -> Result<(), ConfigError> {
        Url::parse(&self.relay.endpoint).map_err(|e| ConfigError::Invalid {
            field: "relay.endpoint",
            reason: e.to_string(),
        })?;
        Url::parse(&self.relay.confirmation_url).map_err(|e| ConfigError::Invalid {
            field: "relay.confirmation_url",
            reason: e.to_string(),
        })?;

        let fraction = self.listening.threshold_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "listening.threshold_fraction",
                reason: format!("{fraction} is not in (0, 1]"),
            });
        }
        let gap = self.listening.max_plausible_gap_secs;
        if !(gap.is_finite() && gap > 0.0) {
            return Err(ConfigError::Invalid {
                field: "listening.max_plausible_gap_secs",
                reason: format!("{gap} must be a positive number of seconds"),
            });
        }
        if self.player.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "player.tick_ms",
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(id) = &self.flow.fixed_course {
            if catalog.get(id).is_none() {
                return Err(ConfigError::Invalid {
                    field: "flow.fixed_course",
                    reason: format!("unknown course {id}, expected one of {:?}", catalog.ids()),
                });
            }
        }
        Ok(())
    }
}

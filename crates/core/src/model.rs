use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Ended,
}

/// Read-only course metadata, defined at build time and keyed by `id`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Course {
    pub id: &'static str,
    pub title: &'static str,
    pub subtitle: Option<&'static str>,
    pub audio_url: &'static str,
    pub duration_seconds: u32,
    pub category: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlaybackPosition {
    pub current_time: f64,
    pub duration: Option<f64>,
    pub is_playing: bool,
    pub playback_rate: f64,
}

impl PlaybackPosition {
    pub fn progress_percent(&self) -> f64 {
        match self.duration {
            Some(d) if d > 0.0 => (self.current_time / d * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_playing {
            PlaybackState::Playing
        } else if matches!(self.duration, Some(d) if d > 0.0 && self.current_time >= d) {
            PlaybackState::Ended
        } else {
            PlaybackState::Paused
        }
    }
}

impl Default for PlaybackPosition {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: None,
            is_playing: false,
            playback_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ListeningProgress {
    pub cumulative_seconds: f64,
    pub required_seconds: u32,
    pub threshold_reached: bool,
}

impl ListeningProgress {
    pub fn remaining_seconds(&self) -> f64 {
        (f64::from(self.required_seconds) - self.cumulative_seconds).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WillingToPay {
    Oui,
    Non,
    PeutEtre,
}

impl WillingToPay {
    pub fn as_str(self) -> &'static str {
        match self {
            WillingToPay::Oui => "oui",
            WillingToPay::Non => "non",
            WillingToPay::PeutEtre => "peut-etre",
        }
    }

    /// Whether the amount question applies to this answer.
    pub fn asks_amount(self) -> bool {
        !matches!(self, WillingToPay::Non)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "oui" | "yes" => Some(WillingToPay::Oui),
            "non" | "no" => Some(WillingToPay::Non),
            "peut-etre" | "peut-être" | "maybe" => Some(WillingToPay::PeutEtre),
            _ => None,
        }
    }
}

impl fmt::Display for WillingToPay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub rating: u8,
    pub comments: String,
    pub willing_to_pay: Option<WillingToPay>,
    pub amount: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{ListeningProgress, PlaybackPosition, PlaybackState, WillingToPay};

    #[test]
    fn progress_percent_needs_a_known_duration() {
        let mut pos = PlaybackPosition {
            current_time: 30.0,
            ..PlaybackPosition::default()
        };
        assert_eq!(pos.progress_percent(), 0.0);

        pos.duration = Some(120.0);
        assert_eq!(pos.progress_percent(), 25.0);
    }

    #[test]
    fn position_at_end_reports_ended() {
        let pos = PlaybackPosition {
            current_time: 60.0,
            duration: Some(60.0),
            is_playing: false,
            playback_rate: 1.0,
        };
        assert_eq!(pos.state(), PlaybackState::Ended);
    }

    #[test]
    fn willing_to_pay_accepts_accented_and_plain_spelling() {
        assert_eq!(WillingToPay::parse("Peut-Être"), Some(WillingToPay::PeutEtre));
        assert_eq!(WillingToPay::parse("peut-etre"), Some(WillingToPay::PeutEtre));
        assert_eq!(WillingToPay::parse("sometimes"), None);
        assert!(!WillingToPay::Non.asks_amount());
    }

    #[test]
    fn remaining_never_goes_negative() {
        let progress = ListeningProgress {
            cumulative_seconds: 45.0,
            required_seconds: 30,
            threshold_reached: true,
        };
        assert_eq!(progress.remaining_seconds(), 0.0);
    }
}

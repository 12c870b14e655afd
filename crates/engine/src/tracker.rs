use audiopoll_core::{AppConfig, ListeningProgress};
use audiopoll_media::NativeEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub threshold_fraction: f64,
    pub max_plausible_gap: f64,
}

impl TrackerConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            threshold_fraction: cfg.listening.threshold_fraction,
            max_plausible_gap: cfg.listening.max_plausible_gap_secs,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.25,
            max_plausible_gap: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    BelowThreshold,
    ThresholdReached { at_seconds: f64 },
}

/// One-shot notification returned by the sample that crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdReached {
    pub cumulative_seconds: f64,
    pub required_seconds: u32,
}

/// Accumulates attentive listening time, in media seconds, from the native
/// event stream of the current course.
#[derive(Debug, Clone)]
pub struct ListeningTracker {
    cfg: TrackerConfig,
    cumulative: f64,
    required: u32,
    gate: Gate,
    playing: bool,
    baseline: Option<f64>,
    rate: f64,
}

impl ListeningTracker {
    pub fn new(cfg: TrackerConfig) -> Self {
        Self {
            cfg,
            cumulative: 0.0,
            required: 0,
            gate: Gate::BelowThreshold,
            playing: false,
            baseline: None,
            rate: 1.0,
        }
    }

    /// Media time advances `rate` seconds per wall second, so the gap that
    /// still counts as continuous playback scales with it.
    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
    }

    fn max_gap(&self) -> f64 {
        self.cfg.max_plausible_gap * self.rate.max(1.0)
    }

    /// Start over for a freshly loaded course. `duration_seconds` is the
    /// catalog value until metadata reports the real one.
    pub fn reset(&mut self, duration_seconds: f64) {
        self.cumulative = 0.0;
        self.gate = Gate::BelowThreshold;
        self.playing = false;
        self.baseline = None;
        self.required = self.required_for(duration_seconds).unwrap_or(0);
    }

    pub fn required_for(&self, duration_seconds: f64) -> Option<u32> {
        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return None;
        }
        let required = (duration_seconds * self.cfg.threshold_fraction).ceil();
        Some((required as u32).max(1))
    }

    pub fn observe(&mut self, event: NativeEvent) -> Option<ThresholdReached> {
        match event {
            NativeEvent::LoadedMetadata { duration } => {
                if matches!(self.gate, Gate::BelowThreshold) {
                    if let Some(required) = self.required_for(duration) {
                        self.required = required;
                    }
                }
            }
            NativeEvent::Play { position } => {
                self.playing = true;
                self.baseline = Some(position);
            }
            NativeEvent::Pause { .. } | NativeEvent::Ended { .. } => {
                self.playing = false;
                self.baseline = None;
            }
            NativeEvent::Seeked { position } => {
                self.baseline = self.playing.then_some(position);
            }
            NativeEvent::TimeUpdate { position } => {
                if !self.playing {
                    return None;
                }
                if let Some(last) = self.baseline {
                    let delta = position - last;
                    if delta > 0.0 && delta <= self.max_gap() {
                        self.cumulative += delta;
                    }
                }
                self.baseline = Some(position);
            }
        }
        self.check_gate()
    }

    fn check_gate(&mut self) -> Option<ThresholdReached> {
        match self.gate {
            Gate::BelowThreshold
                if self.required > 0 && self.cumulative >= f64::from(self.required) =>
            {
                self.gate = Gate::ThresholdReached {
                    at_seconds: self.cumulative,
                };
                Some(ThresholdReached {
                    cumulative_seconds: self.cumulative,
                    required_seconds: self.required,
                })
            }
            _ => None,
        }
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    pub fn progress(&self) -> ListeningProgress {
        ListeningProgress {
            cumulative_seconds: self.cumulative,
            required_seconds: self.required,
            threshold_reached: matches!(self.gate, Gate::ThresholdReached { .. }),
        }
    }
}

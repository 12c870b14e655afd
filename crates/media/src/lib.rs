use anyhow::Result;
use async_trait::async_trait;
use audiopoll_core::{Course, PlaybackPosition};
use std::time::Duration;
use tracing::{debug, info, warn};

mod simulated;

pub use simulated::SimulatedElement;

/// Events raised by a native playback handle, in the order it raised them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeEvent {
    LoadedMetadata { duration: f64 },
    TimeUpdate { position: f64 },
    Seeked { position: f64 },
    Play { position: f64 },
    Pause { position: f64 },
    Ended { position: f64 },
}

/// A native event stamped with the adapter generation it was produced under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaEvent {
    pub generation: u64,
    pub kind: NativeEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    AlreadyPlaying,
    NoSource,
    /// The host refused to start playback (autoplay policy and the like).
    Blocked(String),
}

/// One native playback handle. Transport calls queue events that are handed
/// back, in order, by the next `poll`.
#[async_trait]
pub trait MediaElement: Send {
    fn name(&self) -> &'static str;
    fn load(&mut self, source: &str, duration_hint: Option<f64>);
    async fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_rate(&mut self, rate: f64);
    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn is_playing(&self) -> bool;
    fn has_source(&self) -> bool;
    async fn poll(&mut self, elapsed: Duration) -> Result<Vec<NativeEvent>>;
}

/// Owns the single playback handle of a session and mirrors its state into a
/// [`PlaybackPosition`]. Views read through [`MediaAdapter::position`]; they
/// never hold a handle of their own.
pub struct MediaAdapter {
    element: Box<dyn MediaElement>,
    course: Option<&'static Course>,
    generation: u64,
    position: PlaybackPosition,
}

impl MediaAdapter {
    pub fn new(element: Box<dyn MediaElement>) -> Self {
        Self {
            element,
            course: None,
            generation: 0,
            position: PlaybackPosition::default(),
        }
    }

    pub fn element_name(&self) -> &'static str {
        self.element.name()
    }

    pub fn course(&self) -> Option<&'static Course> {
        self.course
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn position(&self) -> PlaybackPosition {
        self.position
    }

    /// Swaps the source. Anything produced under the previous generation is
    /// stale from here on.
    pub fn load(&mut self, course: &'static Course) -> u64 {
        self.element.pause();
        self.element
            .load(course.audio_url, Some(f64::from(course.duration_seconds)));
        self.generation += 1;
        self.course = Some(course);
        self.position = PlaybackPosition {
            playback_rate: self.position.playback_rate,
            ..PlaybackPosition::default()
        };
        self.element.set_rate(self.position.playback_rate);
        info!(
            course = course.id,
            generation = self.generation,
            backend = self.element.name(),
            "media source loaded"
        );
        self.generation
    }

    pub async fn play(&mut self) -> PlayOutcome {
        if !self.element.has_source() {
            return PlayOutcome::NoSource;
        }
        if self.element.is_playing() {
            return PlayOutcome::AlreadyPlaying;
        }
        match self.element.play().await {
            Ok(()) => PlayOutcome::Started,
            Err(err) => {
                warn!(error = %err, "playback start rejected; waiting for a manual retry");
                PlayOutcome::Blocked(err.to_string())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.element.is_playing() {
            self.element.pause();
        }
    }

    /// Returns `None` when the toggle paused playback.
    pub async fn toggle(&mut self) -> Option<PlayOutcome> {
        if self.element.is_playing() {
            self.pause();
            None
        } else {
            Some(self.play().await)
        }
    }

    pub fn seek(&mut self, time: f64) -> f64 {
        if !self.element.has_source() || !time.is_finite() {
            return self.position.current_time;
        }
        let upper = self.known_duration().unwrap_or(f64::MAX);
        let target = time.clamp(0.0, upper);
        self.element.seek(target);
        self.position.current_time = target;
        debug!(target, "seek");
        target
    }

    pub fn skip(&mut self, delta_seconds: f64) -> f64 {
        let from = self.element.position();
        self.seek(from + delta_seconds)
    }

    pub fn set_rate(&mut self, multiplier: f64) -> bool {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            warn!(multiplier, "ignoring invalid playback rate");
            return false;
        }
        self.element.set_rate(multiplier);
        self.position.playback_rate = multiplier;
        true
    }

    pub async fn poll(&mut self, elapsed: Duration) -> Vec<MediaEvent> {
        let native = match self.element.poll(elapsed).await {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, backend = self.element.name(), "media poll failed");
                return Vec::new();
            }
        };

        native
            .into_iter()
            .map(|kind| {
                self.apply(kind);
                MediaEvent {
                    generation: self.generation,
                    kind,
                }
            })
            .collect()
    }

    fn apply(&mut self, event: NativeEvent) {
        match event {
            NativeEvent::LoadedMetadata { duration } => {
                if duration.is_finite() && duration > 0.0 {
                    self.position.duration = Some(duration);
                }
            }
            NativeEvent::TimeUpdate { position } | NativeEvent::Seeked { position } => {
                self.position.current_time = position;
            }
            NativeEvent::Play { position } => {
                self.position.current_time = position;
                self.position.is_playing = true;
            }
            NativeEvent::Pause { position } | NativeEvent::Ended { position } => {
                self.position.current_time = position;
                self.position.is_playing = false;
            }
        }
    }

    fn known_duration(&self) -> Option<f64> {
        self.position.duration.or_else(|| self.element.duration())
    }
}

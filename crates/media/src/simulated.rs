use crate::{MediaElement, NativeEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Clock-driven stand-in for a real media stack. Media time advances by
/// `elapsed * rate` on every poll while playing.
#[derive(Debug, Default)]
pub struct SimulatedElement {
    source: Option<String>,
    duration: Option<f64>,
    duration_override: Option<f64>,
    position: f64,
    rate: f64,
    playing: bool,
    block_next_play: bool,
    pending: Vec<NativeEvent>,
}

impl SimulatedElement {
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            ..Self::default()
        }
    }

    /// Rejects the first `play()` like a browser autoplay policy would.
    pub fn block_first_play(mut self) -> Self {
        self.block_next_play = true;
        self
    }

    /// Reports this duration instead of the catalog hint.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_override = Some(seconds);
        self
    }

    fn end(&self) -> f64 {
        self.duration.unwrap_or(f64::MAX)
    }
}

#[async_trait]
impl MediaElement for SimulatedElement {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn load(&mut self, source: &str, duration_hint: Option<f64>) {
        self.source = Some(source.to_string());
        self.duration = self.duration_override.or(duration_hint);
        self.position = 0.0;
        self.playing = false;
        self.pending.clear();
        if let Some(duration) = self.duration {
            self.pending.push(NativeEvent::LoadedMetadata { duration });
        }
    }

    async fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(anyhow!("no source loaded"));
        }
        if self.block_next_play {
            self.block_next_play = false;
            return Err(anyhow!(
                "play() failed because the user didn't interact with the document first"
            ));
        }
        if self.playing {
            return Ok(());
        }
        if self.position >= self.end() {
            self.position = 0.0;
            self.pending.push(NativeEvent::Seeked { position: 0.0 });
        }
        self.playing = true;
        self.pending.push(NativeEvent::Play {
            position: self.position,
        });
        Ok(())
    }

    fn pause(&mut self) {
        if self.playing {
            self.playing = false;
            self.pending.push(NativeEvent::Pause {
                position: self.position,
            });
        }
    }

    fn seek(&mut self, position: f64) {
        if self.source.is_none() {
            return;
        }
        self.position = position.clamp(0.0, self.end());
        self.pending.push(NativeEvent::Seeked {
            position: self.position,
        });
        self.pending.push(NativeEvent::TimeUpdate {
            position: self.position,
        });
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn has_source(&self) -> bool {
        self.source.is_some()
    }

    async fn poll(&mut self, elapsed: Duration) -> Result<Vec<NativeEvent>> {
        let mut events = std::mem::take(&mut self.pending);
        if self.playing && !elapsed.is_zero() {
            let end = self.end();
            self.position = (self.position + elapsed.as_secs_f64() * self.rate).min(end);
            events.push(NativeEvent::TimeUpdate {
                position: self.position,
            });
            if self.position >= end {
                self.playing = false;
                events.push(NativeEvent::Ended {
                    position: self.position,
                });
            }
        }
        Ok(events)
    }
}

use crate::flow::{FlowAction, FlowController, FlowError, Stage};
use crate::tracker::{ListeningTracker, ThresholdReached, TrackerConfig};
use audiopoll_core::{AppConfig, Catalog, Course, ListeningProgress, PlaybackPosition, UserInfo};
use audiopoll_media::{MediaAdapter, MediaElement, MediaEvent, PlayOutcome};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub fixed_course: Option<&'static Course>,
}

impl SessionConfig {
    pub fn from_app_config(cfg: &AppConfig, catalog: &Catalog) -> Self {
        let fixed_course = cfg.flow.fixed_course.as_deref().and_then(|id| {
            let course = catalog.get(id);
            if course.is_none() {
                warn!(course = id, "fixed course not in catalog; falling back to selection");
            }
            course
        });
        Self {
            tracker: TrackerConfig::from_app_config(cfg),
            fixed_course,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutput {
    pub handled: usize,
    pub threshold: Option<ThresholdReached>,
}

/// Everything the feedback submission needs, captured once the form is open.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackContext {
    pub user: UserInfo,
    pub course: &'static Course,
    pub progress: ListeningProgress,
    pub total_duration_seconds: f64,
}

/// One respondent's run through the funnel. Owns the single media handle;
/// views borrow the session and never get a handle of their own.
pub struct Session {
    media: MediaAdapter,
    tracker: ListeningTracker,
    flow: FlowController,
}

impl Session {
    pub fn new(cfg: SessionConfig, catalog: Catalog, element: Box<dyn MediaElement>) -> Self {
        Self {
            media: MediaAdapter::new(element),
            tracker: ListeningTracker::new(cfg.tracker),
            flow: FlowController::new(catalog, cfg.fixed_course),
        }
    }

    pub fn stage(&self) -> Stage {
        self.flow.stage()
    }

    pub fn flow(&self) -> &FlowController {
        &self.flow
    }

    pub fn media(&self) -> &MediaAdapter {
        &self.media
    }

    pub fn position(&self) -> PlaybackPosition {
        self.media.position()
    }

    pub fn progress(&self) -> ListeningProgress {
        self.tracker.progress()
    }

    pub fn submit_identity(&mut self, user: UserInfo) -> Result<Stage, FlowError> {
        let stage = self.flow.submit_identity(user)?;
        if let Stage::Playing(course) = stage {
            self.start_course(course);
        }
        Ok(stage)
    }

    pub fn pick_course(&mut self, id: &str) -> Result<Stage, FlowError> {
        let stage = self.flow.pick_course_id(id)?;
        if let Some(course) = stage.course() {
            self.start_course(course);
        }
        Ok(stage)
    }

    /// Reload the current course from the start with fresh tracking.
    pub fn restart_course(&mut self) -> Result<Stage, FlowError> {
        let course = self
            .flow
            .stage()
            .course()
            .ok_or(FlowError::InvalidTransition {
                stage: self.flow.stage().name(),
                action: FlowAction::RestartCourse,
            })?;
        let stage = self.flow.pick_course(course)?;
        self.start_course(course);
        Ok(stage)
    }

    fn start_course(&mut self, course: &'static Course) {
        self.media.load(course);
        self.tracker.reset(f64::from(course.duration_seconds));
        info!(
            course = course.id,
            required_seconds = self.tracker.progress().required_seconds,
            "course started"
        );
    }

    pub async fn play(&mut self) -> PlayOutcome {
        self.media.play().await
    }

    pub fn pause(&mut self) {
        self.media.pause();
    }

    pub async fn toggle(&mut self) -> Option<PlayOutcome> {
        self.media.toggle().await
    }

    pub fn seek(&mut self, time: f64) -> f64 {
        self.media.seek(time)
    }

    pub fn skip(&mut self, delta_seconds: f64) -> f64 {
        self.media.skip(delta_seconds)
    }

    pub fn set_rate(&mut self, multiplier: f64) -> bool {
        let accepted = self.media.set_rate(multiplier);
        if accepted {
            self.tracker.set_rate(multiplier);
        }
        accepted
    }

    /// Advance the media handle and feed whatever it produced, in order.
    pub async fn tick(&mut self, elapsed: Duration) -> TickOutput {
        let events = self.media.poll(elapsed).await;
        let mut out = TickOutput::default();
        for event in events {
            out.handled += 1;
            if let Some(hit) = self.handle_event(event) {
                out.threshold = Some(hit);
            }
        }
        out
    }

    /// Events produced under an earlier generation are dropped.
    pub fn handle_event(&mut self, event: MediaEvent) -> Option<ThresholdReached> {
        if event.generation != self.media.generation() {
            debug!(
                event_generation = event.generation,
                current = self.media.generation(),
                "dropping stale media event"
            );
            return None;
        }
        if self.flow.stage().course().is_none() {
            return None;
        }

        let hit = self.tracker.observe(event.kind)?;
        match self.flow.threshold_reached() {
            Ok(_) => {
                info!(
                    cumulative = hit.cumulative_seconds,
                    required = hit.required_seconds,
                    "listening threshold reached; feedback unlocked"
                );
                Some(hit)
            }
            Err(err) => {
                warn!(error = %err, "threshold reached outside of playback");
                None
            }
        }
    }

    pub fn feedback_context(&self) -> Option<FeedbackContext> {
        let Stage::FeedbackRevealed(course) = self.flow.stage() else {
            return None;
        };
        let user = self.flow.user()?.clone();
        let total_duration_seconds = self
            .media
            .position()
            .duration
            .unwrap_or_else(|| f64::from(course.duration_seconds));
        Some(FeedbackContext {
            user,
            course,
            progress: self.tracker.progress(),
            total_duration_seconds,
        })
    }

    pub fn record_submission(&mut self) -> Result<&'static Course, FlowError> {
        self.flow.record_submission()
    }

    pub fn next_courses(&self) -> Vec<&'static Course> {
        self.flow.next_courses()
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionConfig};
    use crate::flow::Stage;
    use crate::tracker::TrackerConfig;
    use audiopoll_core::{Catalog, UserInfo};
    use audiopoll_media::{PlayOutcome, SimulatedElement};
    use std::time::Duration;

    fn jean() -> UserInfo {
        UserInfo {
            first_name: "Jean".to_string(),
            last_name: "Dupont".to_string(),
            email: "jean@x.com".to_string(),
        }
    }

    fn session(element: SimulatedElement, fixed: Option<&str>) -> Session {
        let catalog = Catalog::builtin();
        let cfg = SessionConfig {
            tracker: TrackerConfig::default(),
            fixed_course: fixed.and_then(|id| catalog.get(id)),
        };
        Session::new(cfg, catalog, Box::new(element))
    }

    async fn run_for(s: &mut Session, seconds: u32) -> usize {
        let mut fired = 0;
        for _ in 0..seconds * 4 {
            if s.tick(Duration::from_millis(250)).await.threshold.is_some() {
                fired += 1;
            }
        }
        fired
    }

    #[tokio::test]
    async fn threshold_reveals_feedback_exactly_once() {
        // 120 s of media: a quarter is 30 s
        let mut s = session(SimulatedElement::new().with_duration(120.0), Some("TC4"));
        assert!(matches!(s.submit_identity(jean()).unwrap(), Stage::Playing(_)));
        assert_eq!(s.play().await, PlayOutcome::Started);

        assert_eq!(run_for(&mut s, 29).await, 0);
        assert!(matches!(s.stage(), Stage::Playing(_)));
        assert_eq!(s.progress().required_seconds, 30);

        assert_eq!(run_for(&mut s, 20).await, 1);
        assert!(matches!(s.stage(), Stage::FeedbackRevealed(_)));
        assert!(s.progress().threshold_reached);
        assert_eq!(s.progress().cumulative_seconds, 49.0);
    }

    #[tokio::test]
    async fn pause_then_resume_counts_only_playing_time() {
        let mut s = session(SimulatedElement::new(), Some("TC3"));
        s.submit_identity(jean()).unwrap();
        s.play().await;
        run_for(&mut s, 10).await;
        s.pause();
        run_for(&mut s, 30).await;
        s.play().await;
        run_for(&mut s, 25).await;

        assert_eq!(s.progress().cumulative_seconds, 35.0);
        assert_eq!(s.position().current_time, 35.0);
    }

    #[tokio::test]
    async fn rate_speeds_media_not_the_definition_of_a_second() {
        let mut s = session(SimulatedElement::new(), Some("TC3"));
        s.submit_identity(jean()).unwrap();
        assert!(s.set_rate(2.0));
        s.play().await;
        run_for(&mut s, 10).await;

        assert_eq!(s.position().current_time, 20.0);
        assert_eq!(s.progress().cumulative_seconds, 20.0);
    }

    #[tokio::test]
    async fn fastest_rate_still_unlocks_feedback() {
        let mut s = session(SimulatedElement::new(), Some("TC3"));
        s.submit_identity(jean()).unwrap();
        assert!(s.set_rate(5.0));
        s.play().await;
        run_for(&mut s, 10).await;

        assert_eq!(s.position().current_time, 50.0);
        assert_eq!(s.progress().cumulative_seconds, 50.0);

        // 450 s required on TC3, reached after 90 wall seconds at 5x
        assert_eq!(run_for(&mut s, 85).await, 1);
        assert!(matches!(s.stage(), Stage::FeedbackRevealed(_)));
    }

    #[tokio::test]
    async fn rate_survives_a_course_switch() {
        let mut s = session(SimulatedElement::new(), None);
        s.submit_identity(jean()).unwrap();
        assert!(s.set_rate(5.0));
        s.pick_course("TC2").unwrap();
        s.play().await;
        run_for(&mut s, 4).await;
        assert_eq!(s.progress().cumulative_seconds, 20.0);
    }

    #[tokio::test]
    async fn seeking_forward_while_paused_counts_nothing() {
        let mut s = session(SimulatedElement::new(), Some("TC3"));
        s.submit_identity(jean()).unwrap();
        s.seek(300.0);
        s.skip(60.0);
        run_for(&mut s, 5).await;

        assert_eq!(s.position().current_time, 360.0);
        assert_eq!(s.progress().cumulative_seconds, 0.0);
    }

    #[tokio::test]
    async fn course_switch_resets_and_drops_stale_events() {
        let mut s = session(SimulatedElement::new(), None);
        s.submit_identity(jean()).unwrap();
        s.pick_course("TC2").unwrap();
        s.play().await;
        run_for(&mut s, 5).await;

        // produced for TC2 but handled after the switch
        let mut leftover = Vec::new();
        for _ in 0..4 {
            leftover.extend(s.media.poll(Duration::from_millis(250)).await);
        }
        assert!(!leftover.is_empty());

        s.pick_course("TC3").unwrap();
        assert_eq!(s.progress().cumulative_seconds, 0.0);
        assert!(!s.progress().threshold_reached);

        for event in leftover {
            assert!(s.handle_event(event).is_none());
        }
        assert_eq!(s.progress().cumulative_seconds, 0.0);
        assert_eq!(s.progress().required_seconds, 450);
    }

    #[tokio::test]
    async fn blocked_autoplay_leaves_session_paused() {
        let mut s = session(SimulatedElement::new().block_first_play(), Some("TC4"));
        s.submit_identity(jean()).unwrap();
        assert!(matches!(s.play().await, PlayOutcome::Blocked(_)));
        run_for(&mut s, 3).await;
        assert!(!s.position().is_playing);
        assert_eq!(s.progress().cumulative_seconds, 0.0);

        assert_eq!(s.play().await, PlayOutcome::Started);
        run_for(&mut s, 3).await;
        assert_eq!(s.progress().cumulative_seconds, 3.0);
    }

    #[tokio::test]
    async fn restart_course_rearms_tracking() {
        let mut s = session(SimulatedElement::new().with_duration(8.0), Some("TC4"));
        s.submit_identity(jean()).unwrap();
        s.play().await;
        run_for(&mut s, 3).await;
        assert!(matches!(s.stage(), Stage::FeedbackRevealed(_)));

        assert!(matches!(s.restart_course().unwrap(), Stage::Playing(_)));
        assert_eq!(s.progress().cumulative_seconds, 0.0);
        assert_eq!(s.position().current_time, 0.0);
    }

    #[tokio::test]
    async fn feedback_context_only_once_revealed() {
        let mut s = session(SimulatedElement::new().with_duration(40.0), Some("TC4"));
        assert!(s.feedback_context().is_none());
        s.submit_identity(jean()).unwrap();
        assert!(s.feedback_context().is_none());

        s.play().await;
        run_for(&mut s, 12).await;
        let ctx = s.feedback_context().expect("form is open");
        assert_eq!(ctx.course.id, "TC4");
        assert_eq!(ctx.user.first_name, "Jean");
        assert_eq!(ctx.total_duration_seconds, 40.0);
        assert_eq!(ctx.progress.required_seconds, 10);

        s.record_submission().unwrap();
        assert!(s.next_courses().iter().all(|c| c.id != "TC4"));
    }
}

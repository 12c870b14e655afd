use audiopoll_core::{Catalog, Course, UserInfo};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    CollectingIdentity,
    SelectingCourse,
    Playing(&'static Course),
    FeedbackRevealed(&'static Course),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::CollectingIdentity => "collecting-identity",
            Stage::SelectingCourse => "selecting-course",
            Stage::Playing(_) => "playing",
            Stage::FeedbackRevealed(_) => "feedback-revealed",
        }
    }

    pub fn course(&self) -> Option<&'static Course> {
        match *self {
            Stage::Playing(c) | Stage::FeedbackRevealed(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    SubmitIdentity,
    PickCourse,
    ThresholdReached,
    RecordSubmission,
    RestartCourse,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowAction::SubmitIdentity => "submit identity",
            FlowAction::PickCourse => "pick course",
            FlowAction::ThresholdReached => "threshold reached",
            FlowAction::RecordSubmission => "record submission",
            FlowAction::RestartCourse => "restart course",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("cannot {action} while {stage}")]
    InvalidTransition {
        stage: &'static str,
        action: FlowAction,
    },
    #[error("unknown course {0}")]
    UnknownCourse(String),
}

/// Funnel state: identity, then a course, then the feedback form.
#[derive(Debug, Clone)]
pub struct FlowController {
    catalog: Catalog,
    fixed_course: Option<&'static Course>,
    user: Option<UserInfo>,
    stage: Stage,
    completed: Vec<&'static str>,
}

impl FlowController {
    pub fn new(catalog: Catalog, fixed_course: Option<&'static Course>) -> Self {
        Self {
            catalog,
            fixed_course,
            user: None,
            stage: Stage::CollectingIdentity,
            completed: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn submit_identity(&mut self, user: UserInfo) -> Result<Stage, FlowError> {
        self.guard(
            matches!(self.stage, Stage::CollectingIdentity),
            FlowAction::SubmitIdentity,
        )?;
        self.user = Some(user);
        self.stage = match self.fixed_course {
            Some(course) => Stage::Playing(course),
            None => Stage::SelectingCourse,
        };
        Ok(self.stage)
    }

    /// Also the "pick another course" action once a course is running.
    pub fn pick_course(&mut self, course: &'static Course) -> Result<Stage, FlowError> {
        self.guard(
            !matches!(self.stage, Stage::CollectingIdentity),
            FlowAction::PickCourse,
        )?;
        self.stage = Stage::Playing(course);
        Ok(self.stage)
    }

    pub fn pick_course_id(&mut self, id: &str) -> Result<Stage, FlowError> {
        let course = self
            .catalog
            .get(id)
            .ok_or_else(|| FlowError::UnknownCourse(id.to_string()))?;
        self.pick_course(course)
    }

    pub fn threshold_reached(&mut self) -> Result<Stage, FlowError> {
        match self.stage {
            Stage::Playing(course) => {
                self.stage = Stage::FeedbackRevealed(course);
                Ok(self.stage)
            }
            _ => Err(self.invalid(FlowAction::ThresholdReached)),
        }
    }

    pub fn record_submission(&mut self) -> Result<&'static Course, FlowError> {
        match self.stage {
            Stage::FeedbackRevealed(course) => {
                if !self.completed.contains(&course.id) {
                    self.completed.push(course.id);
                }
                Ok(course)
            }
            _ => Err(self.invalid(FlowAction::RecordSubmission)),
        }
    }

    /// Courses not yet submitted, in catalog order.
    pub fn next_courses(&self) -> Vec<&'static Course> {
        self.catalog.excluding(&self.completed).collect()
    }

    fn guard(&self, ok: bool, action: FlowAction) -> Result<(), FlowError> {
        if ok {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: FlowAction) -> FlowError {
        FlowError::InvalidTransition {
            stage: self.stage.name(),
            action,
        }
    }
}

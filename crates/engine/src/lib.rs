pub mod flow;
pub mod session;
pub mod tracker;

pub use flow::{FlowAction, FlowController, FlowError, Stage};
pub use session::{FeedbackContext, Session, SessionConfig, TickOutput};
pub use tracker::{Gate, ListeningTracker, ThresholdReached, TrackerConfig};

pub mod catalog;
pub mod config;
pub mod format;
pub mod model;
pub mod validation;

pub use catalog::{Catalog, COURSES};
pub use config::{
    AppConfig, ConfigError, FlowConfig, ListeningConfig, PlayerConfig, RelayConfig, SubmitMode,
};
pub use format::{format_clock, format_duration};
pub use model::{
    Course, FeedbackRecord, ListeningProgress, PlaybackPosition, PlaybackState, UserInfo,
    WillingToPay,
};
pub use validation::{FeedbackDraft, FieldError, IdentityDraft, ValidationErrors};

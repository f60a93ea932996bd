mod progress;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::{SessionProgress, progress_fraction};
pub use service::{AssessmentSession, SessionState};
pub use workflow::SessionLoopService;

/// Progress of one score submission.
///
/// Transitions run `Idle -> Submitting -> {Success, Error}`; a submission in
/// `Error` may be reset to `Idle` for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

impl SubmissionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionState::Success | SubmissionState::Error)
    }
}

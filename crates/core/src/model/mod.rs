mod assessment;
mod ids;
mod stats;
mod submission;
mod topic;

pub use ids::{ParseIdError, SessionId};

pub use assessment::{AssessmentResult, QuestionDescriptor, score_percent};
pub use stats::{
    RemoteTopicStat, STALE_AFTER_SECS, StatsSnapshot, SyncStatus, align_to_catalog,
    default_stale_after, is_stale, merge_remote,
};
pub use submission::SubmissionState;
pub use topic::{TopicKey, TopicStat, default_catalog, normalize_title};

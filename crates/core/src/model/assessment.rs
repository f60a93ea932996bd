use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::topic::{TopicKey, normalize_title};

/// One question screen, as supplied by the content catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescriptor {
    pub id: String,
    pub prompt: String,
    /// Answer a recognized utterance is compared against, if the screen is spoken.
    #[serde(default)]
    pub expected: Option<String>,
}

impl QuestionDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            expected: None,
        }
    }

    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Grade a speech-to-text utterance against the expected answer.
    ///
    /// Missing utterances and screens without an expected answer grade as incorrect.
    #[must_use]
    pub fn accepts(&self, utterance: Option<&str>) -> bool {
        match (self.expected.as_deref(), utterance) {
            (Some(expected), Some(heard)) => normalize_title(expected) == normalize_title(heard),
            _ => false,
        }
    }
}

/// `round(100 * correct / total)`, clamped to `0..=100`; `0` when there are no questions.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct);
    let total = u64::from(total);
    let rounded = (200 * correct + total) / (2 * total);
    u32::try_from(rounded.min(100)).unwrap_or(100)
}

/// Outcome of a finished assessment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentResult {
    topic_key: TopicKey,
    score_percent: u32,
    correct_count: u32,
    total_questions: u32,
    elapsed: Duration,
}

impl AssessmentResult {
    /// Build a result, computing the score from the counters.
    ///
    /// Negative elapsed time (clock moved backwards) is stored as zero.
    #[must_use]
    pub fn new(topic_key: TopicKey, correct_count: u32, total_questions: u32, elapsed: Duration) -> Self {
        Self {
            topic_key,
            score_percent: score_percent(correct_count, total_questions),
            correct_count,
            total_questions,
            elapsed: elapsed.max(Duration::zero()),
        }
    }

    #[must_use]
    pub fn topic_key(&self) -> TopicKey {
        self.topic_key
    }

    #[must_use]
    pub fn score_percent(&self) -> u32 {
        self.score_percent
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(7, 7), 100);
        assert_eq!(score_percent(0, 5), 0);
    }

    #[test]
    fn score_is_zero_without_questions() {
        assert_eq!(score_percent(0, 0), 0);
        assert_eq!(score_percent(3, 0), 0);
    }

    #[test]
    fn score_is_capped_when_revisits_inflate_correct_count() {
        assert_eq!(score_percent(5, 4), 100);
    }

    #[test]
    fn result_clamps_negative_elapsed() {
        let result = AssessmentResult::new(TopicKey::Intonation, 1, 2, Duration::seconds(-4));
        assert_eq!(result.elapsed(), Duration::zero());
        assert_eq!(result.score_percent(), 50);
    }

    #[test]
    fn utterance_matching_ignores_case_and_padding() {
        let q = QuestionDescriptor::new("q1", "Say the word").with_expected("Ship");
        assert!(q.accepts(Some("  ship ")));
        assert!(!q.accepts(Some("sheep")));
        assert!(!q.accepts(None));
        assert!(!QuestionDescriptor::new("q2", "Listen").accepts(Some("ship")));
    }
}

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use assess_core::Clock;
use assess_core::model::{AssessmentResult, QuestionDescriptor, SessionId, TopicKey};

use super::progress::{SessionProgress, progress_fraction};
use crate::error::SessionError;

/// Where an assessment attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Active { current_index: usize },
    Finished(AssessmentResult),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One assessment attempt over a topic's question screens.
///
/// Screens are fixed at construction. The index only moves through
/// [`advance`](Self::advance) and [`retreat`](Self::retreat); answers are
/// counted separately and are never retracted when a screen is revisited.
pub struct AssessmentSession {
    id: SessionId,
    topic_key: TopicKey,
    screens: Vec<QuestionDescriptor>,
    current: usize,
    correct: u32,
    incorrect: u32,
    started_at: Option<DateTime<Utc>>,
    result: Option<AssessmentResult>,
    clock: Clock,
}

impl AssessmentSession {
    #[must_use]
    pub fn new(topic_key: TopicKey, screens: Vec<QuestionDescriptor>, clock: Clock) -> Self {
        Self {
            id: SessionId::new(),
            topic_key,
            screens,
            current: 0,
            correct: 0,
            incorrect: 0,
            started_at: None,
            result: None,
            clock,
        }
    }

    /// Begin timing. Later calls keep the first start time.
    ///
    /// Returns true if this call started the timer.
    pub fn start(&mut self) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(self.clock.now());
        true
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn topic_key(&self) -> TopicKey {
        self.topic_key
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn screens(&self) -> &[QuestionDescriptor] {
        &self.screens
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.screens.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuestionDescriptor> {
        if self.is_finished() {
            return None;
        }
        self.screens.get(self.current)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    #[must_use]
    pub fn result(&self) -> Option<&AssessmentResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.result {
            Some(result) => SessionState::Finished(result.clone()),
            None => SessionState::Active {
                current_index: self.current,
            },
        }
    }

    /// Count an answer for the current screen. Does not move the index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` once a result has been produced.
    pub fn record_answer(&mut self, correct: bool) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        if correct {
            self.correct = self.correct.saturating_add(1);
        } else {
            self.incorrect = self.incorrect.saturating_add(1);
        }
        Ok(())
    }

    /// Grade a speech-to-text utterance against the current screen and count it.
    ///
    /// Returns whether the utterance was accepted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` once a result has been produced.
    pub fn record_utterance(&mut self, utterance: Option<&str>) -> Result<bool, SessionError> {
        let accepted = self
            .current_question()
            .is_some_and(|question| question.accepts(utterance));
        self.record_answer(accepted)?;
        Ok(accepted)
    }

    /// Move to the next screen, or finish when on the last one.
    ///
    /// Once finished, further calls return the same result until
    /// [`acknowledge`](Self::acknowledge) clears it.
    pub fn advance(&mut self) -> Option<&AssessmentResult> {
        if self.result.is_none() {
            if self.current + 1 < self.screens.len() {
                self.current += 1;
            } else {
                self.finish();
            }
        }
        self.result.as_ref()
    }

    /// Step back one screen. No-op on the first screen or after finishing.
    pub fn retreat(&mut self) {
        if self.is_finished() {
            return;
        }
        self.current = self.current.saturating_sub(1);
    }

    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        progress_fraction(self.current, self.screens.len())
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            current: self.current,
            total: self.screens.len(),
            fraction: self.progress_fraction(),
            is_finished: self.is_finished(),
        }
    }

    /// Take the finished result and reset the session to its first screen.
    ///
    /// Timing restarts on the next [`start`](Self::start).
    pub fn acknowledge(&mut self) -> Option<AssessmentResult> {
        let result = self.result.take()?;
        self.current = 0;
        self.correct = 0;
        self.incorrect = 0;
        self.started_at = None;
        Some(result)
    }

    fn finish(&mut self) {
        let total = u32::try_from(self.screens.len()).unwrap_or(u32::MAX);
        let elapsed = self
            .started_at
            .map_or_else(Duration::zero, |started| self.clock.now() - started);
        self.current = self.screens.len();
        self.result = Some(AssessmentResult::new(
            self.topic_key,
            self.correct,
            total,
            elapsed,
        ));
    }
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("id", &self.id)
            .field("topic_key", &self.topic_key)
            .field("screens_len", &self.screens.len())
            .field("current", &self.current)
            .field("correct", &self.correct)
            .field("incorrect", &self.incorrect)
            .field("started_at", &self.started_at)
            .field("finished", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::ParseIdError;

//
// ─── TOPIC KEYS ────────────────────────────────────────────────────────────────
//

/// The fixed set of assessed topics.
///
/// Topics are never created or removed at runtime; every stats list the app
/// publishes is a permutation of [`TopicKey::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKey {
    Monophthongs,
    Diphthongs,
    Triphthongs,
    Consonants,
    WordStress,
    SentenceStress,
    Intonation,
    ConnectedSpeech,
}

impl TopicKey {
    /// Catalog order.
    pub const ALL: [TopicKey; 8] = [
        TopicKey::Monophthongs,
        TopicKey::Diphthongs,
        TopicKey::Triphthongs,
        TopicKey::Consonants,
        TopicKey::WordStress,
        TopicKey::SentenceStress,
        TopicKey::Intonation,
        TopicKey::ConnectedSpeech,
    ];

    /// Stable machine key used in persisted data.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TopicKey::Monophthongs => "monophthongs",
            TopicKey::Diphthongs => "diphthongs",
            TopicKey::Triphthongs => "triphthongs",
            TopicKey::Consonants => "consonants",
            TopicKey::WordStress => "word_stress",
            TopicKey::SentenceStress => "sentence_stress",
            TopicKey::Intonation => "intonation",
            TopicKey::ConnectedSpeech => "connected_speech",
        }
    }

    /// Human label shown in the topic list.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            TopicKey::Monophthongs => "Monophthongs",
            TopicKey::Diphthongs => "Diphthongs",
            TopicKey::Triphthongs => "Triphthongs",
            TopicKey::Consonants => "Consonants",
            TopicKey::WordStress => "Word Stress",
            TopicKey::SentenceStress => "Sentence Stress",
            TopicKey::Intonation => "Intonation",
            TopicKey::ConnectedSpeech => "Connected Speech",
        }
    }

    /// Topic name the remote service expects on score submission.
    ///
    /// The remote side identifies topics by display title, which is also the
    /// key remote stats are matched on when merging. Renaming a title on
    /// either side silently breaks both directions.
    #[must_use]
    pub fn remote_name(self) -> &'static str {
        self.title()
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicKey {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TopicKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| ParseIdError::new("TopicKey", s))
    }
}

/// Normalization applied to both sides of the remote title match.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

//
// ─── TOPIC STATS ───────────────────────────────────────────────────────────────
//

/// Per-topic performance as last known locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStat {
    pub title: String,
    pub topic_key: TopicKey,
    pub highest_score: Option<u32>,
    pub accuracy: Option<u32>,
}

impl TopicStat {
    /// Entry with no recorded performance.
    #[must_use]
    pub fn empty(key: TopicKey) -> Self {
        Self {
            title: key.title().to_owned(),
            topic_key: key,
            highest_score: None,
            accuracy: None,
        }
    }

    #[must_use]
    pub fn with_scores(mut self, highest_score: Option<u32>, accuracy: Option<u32>) -> Self {
        self.highest_score = highest_score;
        self.accuracy = accuracy;
        self
    }
}

/// The default catalog: every topic, in catalog order, with no scores.
#[must_use]
pub fn default_catalog() -> Vec<TopicStat> {
    TopicKey::ALL.into_iter().map(TopicStat::empty).collect()
}

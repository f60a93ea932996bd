//! Question content supplied by the app's static catalogs.

use std::collections::HashMap;

use assess_core::model::{QuestionDescriptor, TopicKey};

/// Ordered question screens for each topic.
pub trait ContentCatalog: Send + Sync {
    /// Questions for `topic`, in presentation order. Unknown topics yield an empty list.
    fn questions_for(&self, topic: TopicKey) -> Vec<QuestionDescriptor>;
}

/// Catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticContentCatalog {
    by_topic: HashMap<TopicKey, Vec<QuestionDescriptor>>,
}

impl StaticContentCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_topic(mut self, topic: TopicKey, questions: Vec<QuestionDescriptor>) -> Self {
        self.by_topic.insert(topic, questions);
        self
    }
}

impl ContentCatalog for StaticContentCatalog {
    fn questions_for(&self, topic: TopicKey) -> Vec<QuestionDescriptor> {
        self.by_topic.get(&topic).cloned().unwrap_or_default()
    }
}

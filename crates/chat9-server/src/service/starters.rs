use std::sync::Arc;

/// Starter questions shown before the first message of a conversation.
#[derive(Debug, Clone, Default)]
pub struct StarterQuestions {
    questions: Option<Arc<[String]>>,
}

impl StarterQuestions {
    pub fn new(questions: Option<Vec<String>>) -> Self {
        Self {
            questions: questions.map(Into::into),
        }
    }

    /// Returns the questions, or `None` when none are configured.
    pub fn questions(&self) -> Option<&[String]> {
        self.questions.as_deref()
    }
}

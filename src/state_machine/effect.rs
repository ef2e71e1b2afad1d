//! Effects produced by state transitions

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the question frame to the backend
    SendQuestion { question: String },

    /// Rewrite the stored message history
    PersistMessages,

    /// Rewrite the stored theme
    PersistTheme,
}

impl Effect {
    pub fn send_question(question: impl Into<String>) -> Self {
        Effect::SendQuestion {
            question: question.into(),
        }
    }
}

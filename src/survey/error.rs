use thiserror::Error;

use crate::survey::types::Phase;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurveyError {
    #[error("no word found near rank {rank} after searching the whole rank space")]
    NoWordAtRank { rank: u32 },
    #[error("only {found} of {needed} distractors available for rank {rank}")]
    InsufficientDistractors { rank: u32, needed: usize, found: usize },
    #[error("invalid answer: {reason} (phase={}, question={question_count})", .phase.as_str())]
    InvalidAnswer {
        reason: String,
        phase: Phase,
        question_count: u32,
    },
    #[error("survey session not found: {0}")]
    SessionNotFound(String),
    #[error("survey session already complete: {id}")]
    SessionAlreadyComplete { id: String },
    #[error("no outstanding challenge (phase={}, question={question_count})", .phase.as_str())]
    NoOutstandingChallenge { phase: Phase, question_count: u32 },
    #[error("invalid survey config: {0}")]
    Config(String),
}

impl SurveyError {
    /// True when the caller sent something wrong, false for engine or data defects.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAnswer { .. } | Self::SessionNotFound(_) | Self::SessionAlreadyComplete { .. }
        )
    }
}

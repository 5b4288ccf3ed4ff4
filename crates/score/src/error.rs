/// Malformed score input. Fatal to the single operation only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("malformed score: {0}")]
    Format(String),
}

impl ScoreError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

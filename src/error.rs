use fp::FpError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a computation. None of these are retried: the caller either gives
/// up on the current resolution degree or, for [`Error::Interrupted`], resumes later from the
/// same state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The arithmetic layer refused an operation.
    #[error("arithmetic failure: {0}")]
    Arithmetic(#[from] FpError),

    /// A generating system was driven in a way its state does not allow.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The kernel of a differential does not have the size the asserted rank predicts. This
    /// means the expected image dimension passed in was wrong, or the heuristics stopped early.
    #[error("theoretical error: rank differs from expected value (expected {expected}, found {found})")]
    RankMismatch { expected: usize, found: usize },

    #[error("interrupted while expanding degree {degree}")]
    Interrupted { degree: usize },

    #[error("invalid algebra: {0}")]
    InvalidAlgebra(String),

    #[error("corrupt save data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn invalid_algebra(msg: impl Into<String>) -> Self {
        Self::InvalidAlgebra(msg.into())
    }
}

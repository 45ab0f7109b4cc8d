use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebugError {
    #[error("Evaluation is not paused")]
    NotPaused,
    #[error("Debug session has been terminated")]
    Terminated,
    #[error("Unknown variable reference: {0}")]
    UnknownVariableReference(i64),
}

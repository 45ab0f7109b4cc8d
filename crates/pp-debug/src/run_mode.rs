use std::fmt;

/// Stepping strategy deciding which future evaluation points pause.
///
/// `depth` is the AST depth of the pause the step was issued from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Hash)]
pub enum RunMode {
    /// Run until a breakpoint is hit.
    #[default]
    Run,
    /// Pause on every node.
    StepIn,
    /// Pause on the next node at the same depth or shallower.
    Next { depth: usize },
    /// Pause on the next node shallower than the current one.
    StepOut { depth: usize },
}

impl RunMode {
    pub fn should_pause(&self, depth: usize) -> bool {
        match *self {
            RunMode::Run => false,
            RunMode::StepIn => true,
            RunMode::Next { depth: step_depth } => depth <= step_depth,
            RunMode::StepOut { depth: step_depth } => depth < step_depth,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Run => write!(f, "run"),
            RunMode::StepIn => write!(f, "step-in"),
            RunMode::Next { depth } => write!(f, "next (depth {})", depth),
            RunMode::StepOut { depth } => write!(f, "step-out (depth {})", depth),
        }
    }
}

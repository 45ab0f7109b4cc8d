use std::fmt;

/// Why evaluation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    Step,
    Breakpoint,
    FunctionBreakpoint,
    Exception,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Step => "step",
            StopReason::Breakpoint => "breakpoint",
            StopReason::FunctionBreakpoint => "function breakpoint",
            StopReason::Exception => "exception",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputCategory {
    Console,
    Stdout,
    Stderr,
}

/// Receiver of client notifications.
///
/// Implementations must not block: the engine calls these from the
/// evaluation thread right before it parks.
pub trait ClientSink: Send + Sync {
    fn send_stopped(&self, reason: StopReason, description: &str, text: &str, thread_id: i64);

    fn send_exited(&self, code: i32);

    fn send_output(&self, category: OutputCategory, text: &str);

    fn send_terminated(&self) {}
}

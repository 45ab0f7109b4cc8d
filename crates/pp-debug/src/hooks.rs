use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::flow::{Flag, FlowControl};
use crate::node::{AstNode, Scope};
use crate::sink::{OutputCategory, StopReason};
use crate::state::{EvaluationError, PausedState, StackFrame};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Err,
    Alert,
    Emerg,
    Crit,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Err => "err",
            LogLevel::Alert => "alert",
            LogLevel::Emerg => "emerg",
            LogLevel::Crit => "crit",
        }
    }

    fn category(&self) -> OutputCategory {
        match self {
            LogLevel::Warning | LogLevel::Err | LogLevel::Alert | LogLevel::Emerg | LogLevel::Crit => {
                OutputCategory::Stderr
            }
            LogLevel::Debug | LogLevel::Info | LogLevel::Notice => OutputCategory::Stdout,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: LogLevel,
    pub text: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Decides whether a node kind may carry a line breakpoint.
pub type NodeFilter = Arc<dyn Fn(&dyn AstNode) -> bool + Send + Sync>;

/// Action run when the client does not disconnect after the process exited.
pub type ExitAction = Arc<dyn Fn(i32) + Send + Sync>;

/// How a process exit hook completed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExitDisposition {
    Disconnected,
    GracePeriodExpired,
}

/// Entry points the interpreter calls while evaluating a manifest.
///
/// All methods must be called from the evaluation thread.
#[derive(Clone)]
pub struct HookAdapter {
    flow: Arc<FlowControl>,
    node_filter: NodeFilter,
    exit_action: ExitAction,
}

impl fmt::Debug for HookAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookAdapter").field("flow", &self.flow).finish()
    }
}

impl HookAdapter {
    pub fn new(flow: Arc<FlowControl>) -> Self {
        let excluded = flow.config().excluded_node_kinds.clone();
        Self {
            flow,
            node_filter: Arc::new(move |node: &dyn AstNode| !excluded.iter().any(|kind| kind == node.kind_name())),
            exit_action: Arc::new(|code| std::process::exit(code)),
        }
    }

    /// Replaces the excluded node kind list with a binding supplied predicate.
    pub fn with_node_filter(mut self, filter: impl Fn(&dyn AstNode) -> bool + Send + Sync + 'static) -> Self {
        self.node_filter = Arc::new(filter);
        self
    }

    pub fn with_exit_action(mut self, action: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit_action = Arc::new(action);
        self
    }

    pub fn flow(&self) -> &Arc<FlowControl> {
        &self.flow
    }

    pub fn before_evaluate(&self, node: &Arc<dyn AstNode>, scope: &Arc<dyn Scope>) {
        if self.flow.is_paused() {
            return;
        }

        let depth = self.flow.state().increment();
        self.check_pause(node, scope, depth);
    }

    pub fn after_evaluate(&self, _node: &Arc<dyn AstNode>, _scope: &Arc<dyn Scope>) {
        if self.flow.is_paused() {
            return;
        }

        self.flow.state().decrement();
    }

    fn check_pause(&self, node: &Arc<dyn AstNode>, scope: &Arc<dyn Scope>, depth: usize) {
        if self.flow.is_paused() || self.flow.is_terminated() {
            return;
        }

        if let Some(name) = node.function_name()
            && self.flow.breakpoints().is_function_breakpoint(name)
        {
            debug!(function = name, depth, "Function breakpoint hit");
            self.pause(
                StopReason::FunctionBreakpoint,
                &format!("Function breakpoint hit in {}", name),
                name,
                node,
                scope,
                depth,
            );
            return;
        }

        if let Some((file, line)) = self.line_breakpoint_for(node.as_ref()) {
            debug!(file = %file.display(), line, depth, "Line breakpoint hit");
            self.pause(
                StopReason::Breakpoint,
                &format!("Breakpoint hit at {}", describe_location(&file, line)),
                &format!("Line {}", line),
                node,
                scope,
                depth,
            );
            return;
        }

        if self.flow.run_mode().should_pause(depth) {
            debug!(mode = %self.flow.run_mode(), depth, "Step completed");
            self.pause(StopReason::Step, "Step completed", "", node, scope, depth);
        }
    }

    /// First line breakpoint within the lines spanned by `node`.
    fn line_breakpoint_for(&self, node: &dyn AstNode) -> Option<(PathBuf, usize)> {
        let location = node.source_location()?;
        if location.length == 0 || !(self.node_filter)(node) {
            return None;
        }

        let end_line = node.line_for_offset(location.offset + location.length);
        self.flow
            .breakpoints()
            .find_line_breakpoint(&location.file, location.line, end_line)
            .map(|line| (location.file, line))
    }

    fn pause(
        &self,
        reason: StopReason,
        description: &str,
        text: &str,
        node: &Arc<dyn AstNode>,
        scope: &Arc<dyn Scope>,
        depth: usize,
    ) {
        let state = PausedState {
            exception: None,
            stack_trace: caller_first(scope.stack_trace()),
            node: Some(Arc::clone(node)),
            scope: Some(Arc::clone(scope)),
            depth,
        };
        self.flow.raise_stopped_event_and_wait(reason, description, text, state);
    }

    pub fn on_exception(&self, error: &EvaluationError) {
        if self.flow.is_paused() {
            return;
        }

        warn!(error = %error, "Evaluation raised an error");
        let state = PausedState {
            exception: Some(error.clone()),
            stack_trace: caller_first(error.stack.clone()),
            node: None,
            scope: None,
            depth: self.flow.state().depth(),
        };
        self.flow
            .raise_stopped_event_and_wait(StopReason::Exception, &error.message, &error.message, state);
    }

    pub fn on_log(&self, message: &LogMessage) {
        if self.flow.query_flag(Flag::SuppressLogs) {
            return;
        }

        self.flow.sink().send_output(
            message.level.category(),
            &format!("{}: {}\n", message.level, message.text),
        );
    }

    /// Reports the exit to the client, ends the session and waits for the
    /// client to disconnect. Runs the exit action when it does not.
    pub fn before_process_exit(&self, code: i32) -> ExitDisposition {
        info!(code, "Interpreter process exiting");
        self.flow.sink().send_exited(code);
        self.flow.sink().send_terminated();
        self.flow.terminate();

        let grace = self.flow.config().exit_grace_period();
        if self.flow.wait_for_disconnect(grace) {
            ExitDisposition::Disconnected
        } else {
            warn!(grace_ms = grace.as_millis() as u64, "Client did not disconnect, forcing exit");
            (self.exit_action)(code);
            ExitDisposition::GracePeriodExpired
        }
    }

    /// Reports an error that prevented evaluation from running at all.
    pub fn report_failure(&self, error: &dyn std::error::Error) {
        self.flow
            .sink()
            .send_output(OutputCategory::Stderr, &format!("{}\n", error));
    }
}

fn caller_first(mut frames: Vec<StackFrame>) -> Vec<StackFrame> {
    frames.reverse();
    frames
}

fn describe_location(file: &Path, line: usize) -> String {
    format!("{}:{}", file.display(), line)
}

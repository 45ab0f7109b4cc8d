//! Debug session engine for manifest evaluation.
//!
//! An interpreter calls into [`HookAdapter`] while it evaluates; a protocol
//! front end drives [`FlowControl`] from its request threads. The two meet in
//! shared, lock-guarded session state.
//!
//! ```rust,ignore
//! let flow = Arc::new(FlowControl::new(DebugConfig::default(), sink));
//! let hooks = HookAdapter::new(Arc::clone(&flow));
//!
//! // request thread
//! flow.breakpoints().set_line_breakpoints(Path::new("site.pp"), &[5]);
//! flow.assert_flag(Flag::ClientConfigured);
//!
//! // evaluation thread
//! flow.assert_flag(Flag::SessionReady);
//! if flow.wait_for_start() {
//!     flow.begin_evaluation();
//!     interpreter.evaluate_with(&hooks);
//! }
//! ```
pub mod breakpoints;
pub mod config;
pub mod error;
pub mod flow;
pub mod hooks;
pub mod node;
pub mod run_mode;
pub mod sink;
pub mod state;

pub use breakpoints::{Breakpoint, BreakpointRegistry};
pub use config::DebugConfig;
pub use error::DebugError;
pub use flow::{Flag, FlowControl, SessionPhase};
pub use hooks::{ExitDisposition, HookAdapter, LogLevel, LogMessage};
pub use node::{AstNode, LineIndex, Scope, SourceLocation};
pub use run_mode::RunMode;
pub use sink::{ClientSink, OutputCategory, StopReason};
pub use state::{EvaluationError, PausedState, SessionState, StackFrame, Value};

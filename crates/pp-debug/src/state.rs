use itertools::Itertools;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::error::DebugError;
use crate::node::{AstNode, Scope, SourceLocation};

/// Interpreter data as seen by variable inspection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undef,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Entries in insertion order.
    Hash(Vec<(String, Value)>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "Undef",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
        }
    }

    pub fn has_children(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Hash(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => write!(f, "undef"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Hash(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("'{}' => {}", k.replace('\'', "\\'"), v))
                    .join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub name: String,
    pub file: Option<PathBuf>,
    pub line: usize,
}

impl StackFrame {
    pub fn new(name: impl Into<String>, file: Option<PathBuf>, line: usize) -> Self {
        Self {
            name: name.into(),
            file,
            line,
        }
    }
}

/// An error raised by the interpreted program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Frames active when the error was raised, innermost first.
    pub stack: Vec<StackFrame>,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            stack: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }
}

/// What is captured when evaluation pauses.
#[derive(Debug, Clone, Default)]
pub struct PausedState {
    pub exception: Option<EvaluationError>,
    /// Caller first.
    pub stack_trace: Vec<StackFrame>,
    pub node: Option<Arc<dyn AstNode>>,
    pub scope: Option<Arc<dyn Scope>>,
    pub depth: usize,
}

#[derive(Debug, Default)]
struct Saved {
    exception: Option<EvaluationError>,
    stack_trace: Option<Vec<StackFrame>>,
    paused_node: Option<Arc<dyn AstNode>>,
    scope: Option<Arc<dyn Scope>>,
    depth: Option<usize>,
    variable_cache: FxHashMap<i64, Value>,
    next_reference: i64,
}

impl Saved {
    fn is_empty(&self) -> bool {
        self.exception.is_none()
            && self.stack_trace.is_none()
            && self.paused_node.is_none()
            && self.scope.is_none()
            && self.depth.is_none()
            && self.variable_cache.is_empty()
    }
}

pub type CompilationUnit = Arc<dyn Any + Send + Sync>;

/// Live evaluation position plus the snapshot taken at the last pause.
///
/// The depth counter is written only by the evaluation thread. Saved state
/// is written by the evaluation thread when it pauses and cleared by the
/// request thread when it resumes.
#[derive(Default)]
pub struct SessionState {
    depth: AtomicUsize,
    compilation_unit: Mutex<Option<CompilationUnit>>,
    saved: Mutex<Saved>,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("depth", &self.depth())
            .field("saved", &*self.saved())
            .finish()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn saved(&self) -> MutexGuard<'_, Saved> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current AST nesting depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub(crate) fn increment(&self) -> usize {
        self.depth.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn decrement(&self) -> usize {
        let previous = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| Some(depth.saturating_sub(1)))
            .unwrap_or_default();
        previous.saturating_sub(1)
    }

    pub(crate) fn reset(&self) {
        self.depth.store(0, Ordering::SeqCst);
    }

    pub fn set_compilation_unit(&self, unit: CompilationUnit) {
        *self.compilation_unit.lock().unwrap_or_else(PoisonError::into_inner) = Some(unit);
    }

    pub fn compilation_unit(&self) -> Option<CompilationUnit> {
        self.compilation_unit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn save(&self, state: PausedState) {
        let mut saved = self.saved();
        *saved = Saved {
            exception: state.exception,
            stack_trace: Some(state.stack_trace),
            paused_node: state.node,
            scope: state.scope,
            depth: Some(state.depth),
            variable_cache: FxHashMap::default(),
            next_reference: 0,
        };
    }

    /// Drops the saved snapshot and returns the depth it was taken at.
    pub(crate) fn clear(&self) -> Option<usize> {
        std::mem::take(&mut *self.saved()).depth
    }

    pub fn has_saved(&self) -> bool {
        !self.saved().is_empty()
    }

    pub fn saved_depth(&self) -> Option<usize> {
        self.saved().depth
    }

    pub fn exception(&self) -> Option<EvaluationError> {
        self.saved().exception.clone()
    }

    /// Stack trace of the paused evaluation, caller first.
    pub fn stack_trace(&self) -> Option<Vec<StackFrame>> {
        self.saved().stack_trace.clone()
    }

    pub fn paused_node(&self) -> Option<Arc<dyn AstNode>> {
        self.saved().paused_node.clone()
    }

    pub fn scope(&self) -> Option<Arc<dyn Scope>> {
        self.saved().scope.clone()
    }

    /// Stores `value` under a fresh reference id. Fails once the snapshot is cleared.
    pub fn cache_variable(&self, value: Value) -> Result<i64, DebugError> {
        let mut saved = self.saved();
        if saved.depth.is_none() {
            return Err(DebugError::NotPaused);
        }

        saved.next_reference += 1;
        let id = saved.next_reference;
        saved.variable_cache.insert(id, value);
        Ok(id)
    }

    pub fn cached_variable(&self, id: i64) -> Result<Value, DebugError> {
        self.saved()
            .variable_cache
            .get(&id)
            .cloned()
            .ok_or(DebugError::UnknownVariableReference(id))
    }
}

//! Capabilities the host interpreter exposes to the debugger.
//!
//! The engine never looks inside interpreter objects. An evaluator binding
//! wraps its AST nodes and scopes in these traits and hands them to the hooks.

use std::fmt::Debug;
use std::path::PathBuf;

use crate::state::{StackFrame, Value};

/// Location of a node in its manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based line of the first character of the node.
    pub line: usize,
    /// Byte offset of the node in the file.
    pub offset: usize,
    /// Length of the node in bytes.
    pub length: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize, offset: usize, length: usize) -> Self {
        Self {
            file: file.into(),
            line,
            offset,
            length,
        }
    }
}

pub trait AstNode: Debug + Send + Sync {
    /// Interpreter specific kind of the node, e.g. `CallNamedFunctionExpression`.
    fn kind_name(&self) -> &str;

    /// Name of the called function when the node is a named function call.
    fn function_name(&self) -> Option<&str> {
        None
    }

    fn source_location(&self) -> Option<SourceLocation>;

    /// Translates a byte offset in the node's file to a 1-based line number.
    fn line_for_offset(&self, offset: usize) -> usize;
}

pub trait Scope: Debug + Send + Sync {
    fn local_variables(&self) -> Vec<(String, Value)>;

    fn global_variables(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Active frames, innermost first.
    fn stack_trace(&self) -> Vec<StackFrame> {
        Vec::new()
    }
}

/// Byte offset to line lookup for a source text.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts }
    }

    /// 1-based line containing `offset`. Offsets past the end map to the last line.
    pub fn line_for_offset(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line.max(1),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

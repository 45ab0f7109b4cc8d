use itertools::Itertools;
use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error};

const COMMENT_MARKER: char = '#';

/// A requested breakpoint and whether it could be placed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    /// File the breakpoint was requested for, or `None` for function breakpoints.
    pub file: Option<PathBuf>,
    /// 1-based line, `None` for function breakpoints.
    pub line: Option<usize>,
    /// Function name, `None` for line breakpoints.
    pub function: Option<String>,
    pub verified: bool,
    /// Reason the breakpoint was rejected.
    pub message: Option<String>,
}

impl Breakpoint {
    fn line(file: &Path, line: usize) -> Self {
        Self {
            file: Some(file.to_path_buf()),
            line: Some(line),
            function: None,
            verified: true,
            message: None,
        }
    }

    fn function(name: &str) -> Self {
        Self {
            file: None,
            line: None,
            function: Some(name.to_string()),
            verified: true,
            message: None,
        }
    }

    fn rejected(mut self, message: impl Into<String>) -> Self {
        self.verified = false;
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Default)]
struct Registry {
    lines: FxHashMap<String, BTreeSet<usize>>,
    functions: BTreeSet<String>,
}

/// Line and function breakpoints, replaced wholesale per request.
#[derive(Debug)]
pub struct BreakpointRegistry {
    registry: RwLock<Registry>,
    sentinel_function: String,
}

impl BreakpointRegistry {
    pub fn new(sentinel_function: impl Into<String>) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            sentinel_function: sentinel_function.into(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the breakpoints for `file` with the verifiable subset of
    /// `requested_lines` and returns one result per requested line, in order.
    pub fn set_line_breakpoints(&self, file: &Path, requested_lines: &[usize]) -> Vec<Breakpoint> {
        let results = Self::validate_lines(file, requested_lines);
        let verified = results
            .iter()
            .filter(|bp| bp.verified)
            .filter_map(|bp| bp.line)
            .collect::<BTreeSet<_>>();

        debug!(
            file = %file.display(),
            requested = requested_lines.len(),
            verified = verified.len(),
            "Setting line breakpoints"
        );

        self.write().lines.insert(canonical_key(file), verified);
        results
    }

    fn validate_lines(file: &Path, requested_lines: &[usize]) -> Vec<Breakpoint> {
        if !file.exists() {
            return requested_lines
                .iter()
                .map(|&line| Breakpoint::line(file, line).rejected("File does not exist"))
                .collect();
        }

        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                error!(file = %file.display(), error = %e, "Failed to read breakpoint source file");
                return requested_lines
                    .iter()
                    .map(|&line| Breakpoint::line(file, line).rejected(format!("Unable to read file: {}", e)))
                    .collect();
            }
        };

        let wanted = requested_lines.iter().copied().collect::<HashSet<_>>();
        let source_lines = content
            .lines()
            .enumerate()
            .map(|(i, text)| (i + 1, text))
            .filter(|(line, _)| wanted.contains(line))
            .collect::<FxHashMap<_, _>>();

        requested_lines
            .iter()
            .map(|&line| {
                let breakpoint = Breakpoint::line(file, line);
                match source_lines.get(&line) {
                    None => breakpoint.rejected("Line does not exist"),
                    Some(text) if is_blank(text) => breakpoint.rejected("Line is blank"),
                    Some(_) => breakpoint,
                }
            })
            .collect()
    }

    /// Replaces the function breakpoint set. Every name is accepted.
    pub fn set_function_breakpoints<S: AsRef<str>>(&self, names: &[S]) -> Vec<Breakpoint> {
        let names = names.iter().map(|name| name.as_ref()).collect_vec();
        debug!(names = ?names, "Setting function breakpoints");

        self.write().functions = names.iter().map(|name| name.to_string()).collect();
        names.into_iter().map(Breakpoint::function).collect()
    }

    pub fn line_breakpoints(&self, file: &Path) -> BTreeSet<usize> {
        self.read()
            .lines
            .get(&canonical_key(file))
            .cloned()
            .unwrap_or_default()
    }

    /// First breakpoint line of `file` within `start..=end`.
    pub fn find_line_breakpoint(&self, file: &Path, start: usize, end: usize) -> Option<usize> {
        if start > end {
            return None;
        }

        self.read()
            .lines
            .get(&canonical_key(file))
            .and_then(|lines| lines.range(start..=end).next().copied())
    }

    /// Registered function names, always including the sentinel.
    pub fn function_breakpoint_names(&self) -> BTreeSet<String> {
        let mut names = self.read().functions.clone();
        names.insert(self.sentinel_function.clone());
        names
    }

    pub fn is_function_breakpoint(&self, name: &str) -> bool {
        name == self.sentinel_function || self.read().functions.contains(name)
    }
}

fn is_blank(text: &str) -> bool {
    text.split(COMMENT_MARKER).next().unwrap_or_default().trim().is_empty()
}

/// Lookup key for a file. Absolute, with `.` and `..` resolved lexically,
/// and lower-cased, so matching is case insensitive even on case sensitive
/// filesystems.
pub fn canonical_key(file: &Path) -> String {
    let absolute = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
    normalize(&absolute).to_string_lossy().to_lowercase()
}

fn normalize(path: &Path) -> PathBuf {
    path.components().fold(PathBuf::new(), |mut normalized, component| {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            other => normalized.push(other),
        }
        normalized
    })
}

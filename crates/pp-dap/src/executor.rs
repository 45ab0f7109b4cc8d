use pp_debug::state::CompilationUnit;
use pp_debug::{Flag, HookAdapter, Scope, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::AdapterError;
use crate::protocol::LaunchArgs;

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// The interpreter side of a debug session.
///
/// `run` compiles and evaluates the launched manifest on the calling thread,
/// invoking the hooks as it evaluates nodes, and returns the process exit
/// code. It must not call `before_process_exit` itself.
pub trait ManifestRunner: Send + Sync {
    fn run(&self, launch: &LaunchArgs, hooks: &HookAdapter) -> Result<i32, DynError>;

    /// Evaluates `expression` in the paused scope.
    fn evaluate(
        &self,
        _expression: &str,
        _scope: Option<&dyn Scope>,
        _unit: Option<CompilationUnit>,
    ) -> Result<Value, String> {
        Err("Expression evaluation is not supported".to_string())
    }
}

/// Evaluate the launched manifest. Runs on the evaluation thread.
pub fn execute_manifest(runner: Arc<dyn ManifestRunner>, launch: LaunchArgs, hooks: HookAdapter) {
    debug!(manifest = %launch.manifest, noop = ?launch.noop, "Preparing manifest evaluation");
    let flow = Arc::clone(hooks.flow());

    let manifest = match resolve_manifest(&launch) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!(error = %e);
            hooks.report_failure(&e);
            hooks.before_process_exit(1);
            return;
        }
    };

    flow.state().set_compilation_unit(Arc::new(manifest));
    flow.assert_flag(Flag::SessionReady);

    if !flow.wait_for_start() {
        info!("Session terminated before evaluation started");
        return;
    }
    flow.begin_evaluation();

    let code = match runner.run(&launch, &hooks) {
        Ok(code) => {
            info!(code, "Manifest evaluation completed");
            code
        }
        Err(e) => {
            error!(error = %e, "Manifest evaluation failed");
            hooks.report_failure(e.as_ref());
            1
        }
    };

    hooks.before_process_exit(code);
}

fn resolve_manifest(launch: &LaunchArgs) -> Result<PathBuf, AdapterError> {
    let manifest = match &launch.cwd {
        Some(cwd) => Path::new(cwd).join(&launch.manifest),
        None => PathBuf::from(&launch.manifest),
    };

    if manifest.is_file() {
        Ok(manifest)
    } else {
        Err(AdapterError::FileError(format!(
            "Manifest file '{}' does not exist",
            manifest.display()
        )))
    }
}

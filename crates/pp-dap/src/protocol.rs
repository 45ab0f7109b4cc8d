use pp_debug::{OutputCategory, StopReason};
use serde::Deserialize;

/// Messages sent from the evaluation side to the DAP server
#[derive(Debug, Clone, PartialEq)]
pub enum DebuggerMessage {
    /// Evaluation paused, should send stopped event
    Stopped {
        reason: StopReason,
        description: String,
        text: String,
        thread_id: i64,
    },
    /// Interpreter or adapter output for the debug console
    Output { category: OutputCategory, text: String },
    /// The interpreter process is exiting
    Exited { code: i32 },
    /// Debug session is over
    Terminated,
}

/// Launch arguments for DAP launch configuration
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArgs {
    /// Manifest file to evaluate.
    pub manifest: String,
    /// Compile without applying changes.
    pub noop: Option<bool>,
    /// Extra interpreter arguments.
    pub args: Option<Vec<String>>,
    /// Working directory for the interpreter.
    pub cwd: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_from_camel_case_json() {
        let args: LaunchArgs = serde_json::from_value(serde_json::json!({
            "manifest": "/etc/site.pp",
            "noop": true,
            "args": ["--strict_variables"],
        }))
        .unwrap();

        assert_eq!(args.manifest, "/etc/site.pp");
        assert_eq!(args.noop, Some(true));
        assert_eq!(args.args, Some(vec!["--strict_variables".to_string()]));
        assert_eq!(args.cwd, None);
    }

    #[test]
    fn test_launch_args_require_manifest() {
        let result = serde_json::from_value::<LaunchArgs>(serde_json::json!({"noop": false}));
        assert!(result.is_err());
    }
}

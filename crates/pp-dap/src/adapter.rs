use crossbeam_channel::{Receiver, Sender};
use dap::prelude::*;
use dap::responses::{
    ContinueResponse, EvaluateResponse, ScopesResponse, SetBreakpointsResponse, SetExceptionBreakpointsResponse,
    SetFunctionBreakpointsResponse, StackTraceResponse, ThreadsResponse, VariablesResponse,
};
use pp_debug::{ClientSink, DebugConfig, DebugError, Flag, FlowControl, HookAdapter, OutputCategory, StopReason, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::executor::{self, ManifestRunner};
use crate::handler::DapClientSink;
use crate::protocol::{DebuggerMessage, LaunchArgs};

type DynResult<T> = miette::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// DAP request handling for a single manifest debug session
pub struct ManifestAdapter {
    flow: Arc<FlowControl>,
    hooks: HookAdapter,
    runner: Arc<dyn ManifestRunner>,
    manifest: Option<PathBuf>,
    debugger_message_rx: Option<Receiver<DebuggerMessage>>,
    debugger_message_tx: Sender<DebuggerMessage>,
    evaluation: Option<JoinHandle<()>>,
}

impl ManifestAdapter {
    pub fn new(runner: Arc<dyn ManifestRunner>, config: DebugConfig) -> Self {
        let (message_tx, message_rx) = crossbeam_channel::unbounded::<DebuggerMessage>();
        let sink: Arc<dyn ClientSink> = Arc::new(DapClientSink::new(message_tx.clone()));
        let flow = Arc::new(FlowControl::new(config, sink));

        Self {
            hooks: HookAdapter::new(Arc::clone(&flow)),
            flow,
            runner,
            manifest: None,
            debugger_message_rx: Some(message_rx),
            debugger_message_tx: message_tx,
            evaluation: None,
        }
    }

    /// Customizes the hooks handed to the runner, e.g. the node filter.
    pub fn with_hooks(mut self, f: impl FnOnce(HookAdapter) -> HookAdapter) -> Self {
        self.hooks = f(self.hooks.clone());
        self
    }

    pub fn flow(&self) -> &Arc<FlowControl> {
        &self.flow
    }

    pub fn message_sender(&self) -> Sender<DebuggerMessage> {
        self.debugger_message_tx.clone()
    }

    /// Takes the receiving end of engine notifications. Only the first call
    /// returns a receiver.
    pub fn take_debugger_messages(&mut self) -> Option<Receiver<DebuggerMessage>> {
        self.debugger_message_rx.take()
    }

    fn source_for(&self, file: Option<&Path>) -> Option<types::Source> {
        file.or(self.manifest.as_deref()).map(|path| types::Source {
            name: path.file_name().map(|n| n.to_string_lossy().to_string()),
            path: Some(path.to_string_lossy().to_string()),
            adapter_data: None,
            source_reference: None,
            presentation_hint: None,
            origin: None,
            checksums: None,
            sources: None,
        })
    }

    /// Frames of the paused evaluation, innermost first.
    fn stack_frames(&self) -> Vec<types::StackFrame> {
        let state = self.flow.state();
        let frames = state.stack_trace().unwrap_or_default();

        if !frames.is_empty() {
            return frames
                .iter()
                .rev()
                .enumerate()
                .map(|(i, frame)| types::StackFrame {
                    id: i as i64 + 1,
                    name: frame.name.clone(),
                    line: frame.line as i64,
                    column: 1,
                    source: self.source_for(frame.file.as_deref()),
                    ..Default::default()
                })
                .collect();
        }

        let location = state
            .paused_node()
            .and_then(|node| node.source_location())
            .or_else(|| state.exception().and_then(|e| e.location));

        match location {
            Some(location) => vec![types::StackFrame {
                id: 1,
                name: "main".to_string(),
                line: location.line as i64,
                column: 1,
                source: self.source_for(Some(location.file.as_path())),
                ..Default::default()
            }],
            None => vec![types::StackFrame {
                id: 0,
                name: "unknown".to_string(),
                line: 1,
                column: 1,
                source: self.source_for(None),
                ..Default::default()
            }],
        }
    }

    fn scopes(&self) -> Result<Vec<types::Scope>, AdapterError> {
        let state = self.flow.state();
        let Some(scope) = state.scope() else {
            return Ok(Vec::new());
        };

        let locals = state.cache_variable(Value::Hash(scope.local_variables()))?;
        let globals = state.cache_variable(Value::Hash(scope.global_variables()))?;

        Ok(vec![scope_entry("Local", locals), scope_entry("Global", globals)])
    }

    fn variables(&self, reference: i64) -> Result<Vec<types::Variable>, AdapterError> {
        let state = self.flow.state();
        let children = match state.cached_variable(reference)? {
            Value::Hash(entries) => entries,
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (format!("[{}]", i), item))
                .collect(),
            _ => Vec::new(),
        };

        children
            .into_iter()
            .map(|(name, value)| -> Result<types::Variable, AdapterError> {
                let variables_reference = if value.has_children() {
                    state.cache_variable(value.clone())?
                } else {
                    0
                };

                Ok(types::Variable {
                    value: value.to_string(),
                    type_field: Some(value.type_name().to_string()),
                    variables_reference,
                    named_variables: None,
                    indexed_variables: None,
                    presentation_hint: None,
                    evaluate_name: Some(name.clone()),
                    memory_reference: None,
                    name,
                })
            })
            .collect()
    }

    fn evaluate(&self, expression: &str) -> Result<(Value, i64), AdapterError> {
        if !self.flow.is_paused() {
            return Err(AdapterError::Debug(DebugError::NotPaused));
        }

        let state = self.flow.state();
        let scope = state.scope();
        let value = self
            .runner
            .evaluate(expression, scope.as_deref(), state.compilation_unit())
            .map_err(AdapterError::EvaluationError)?;

        let reference = if value.has_children() {
            state.cache_variable(value.clone())?
        } else {
            0
        };
        Ok((value, reference))
    }

    fn launch(&mut self, args: LaunchArgs) -> DynResult<()> {
        self.manifest = Some(PathBuf::from(&args.manifest));
        let runner = Arc::clone(&self.runner);
        let hooks = self.hooks.clone();
        let handle = thread::Builder::new()
            .name("evaluation".to_string())
            .spawn(move || executor::execute_manifest(runner, args, hooks))?;
        self.evaluation = Some(handle);
        Ok(())
    }

    /// Handle DAP request and send appropriate response
    pub fn handle_request(&mut self, req: Request, server: &mut Server<impl io::Read, impl io::Write>) -> DynResult<()> {
        match &req.command {
            Command::Launch(raw_args) => {
                if self.evaluation.is_some() {
                    server.respond(req.error("A manifest is already being evaluated"))?;
                    return Ok(());
                }

                let args = match raw_args
                    .additional_data
                    .as_ref()
                    .ok_or(AdapterError::MissingLaunchArguments)
                    .and_then(|data| {
                        serde_json::from_value::<LaunchArgs>(data.clone()).map_err(AdapterError::LaunchArgumentsError)
                    }) {
                    Ok(args) => args,
                    Err(e) => {
                        warn!(error = %e, "Rejected launch request");
                        server.respond(req.error(&e.to_string()))?;
                        return Ok(());
                    }
                };

                debug!(?args, "Received launch request");
                self.launch(args)?;
                server.respond(req.success(ResponseBody::Launch))?;
            }
            Command::SetBreakpoints(args) => {
                debug!(?args, "Received SetBreakpoints request");

                #[allow(deprecated)]
                let lines = match (&args.breakpoints, &args.lines) {
                    (Some(breakpoints), _) => breakpoints.iter().map(|bp| bp.line as usize).collect::<Vec<_>>(),
                    (None, Some(lines)) => lines.iter().map(|line| *line as usize).collect(),
                    (None, None) => Vec::new(),
                };

                let breakpoints = match args.source.path.as_ref() {
                    Some(path) => self
                        .flow
                        .breakpoints()
                        .set_line_breakpoints(Path::new(path), &lines)
                        .into_iter()
                        .map(|bp| types::Breakpoint {
                            verified: bp.verified,
                            line: bp.line.map(|line| line as i64),
                            column: None,
                            end_line: None,
                            end_column: None,
                            source: Some(args.source.clone()),
                            message: bp.message,
                            id: None,
                            instruction_reference: None,
                            offset: None,
                        })
                        .collect(),
                    None => {
                        warn!("SetBreakpoints request without a source path");
                        Vec::new()
                    }
                };

                let rsp = req.success(ResponseBody::SetBreakpoints(SetBreakpointsResponse { breakpoints }));
                server.respond(rsp)?;
            }
            Command::SetFunctionBreakpoints(args) => {
                debug!(?args, "Received SetFunctionBreakpoints request");

                let names = args.breakpoints.iter().map(|bp| bp.name.as_str()).collect::<Vec<_>>();
                let breakpoints = self
                    .flow
                    .breakpoints()
                    .set_function_breakpoints(&names)
                    .into_iter()
                    .map(|bp| types::Breakpoint {
                        verified: bp.verified,
                        line: None,
                        column: None,
                        end_line: None,
                        end_column: None,
                        source: None,
                        message: bp.message,
                        id: None,
                        instruction_reference: None,
                        offset: None,
                    })
                    .collect();

                let rsp = req.success(ResponseBody::SetFunctionBreakpoints(SetFunctionBreakpointsResponse {
                    breakpoints,
                }));
                server.respond(rsp)?;
            }
            Command::SetExceptionBreakpoints(_) => {
                debug!("Received SetExceptionBreakpoints request");
                let rsp = req.success(ResponseBody::SetExceptionBreakpoints(SetExceptionBreakpointsResponse {
                    breakpoints: None,
                }));
                server.respond(rsp)?;
            }
            Command::ConfigurationDone => {
                debug!("Received ConfigurationDone request");
                self.flow.assert_flag(Flag::ClientConfigured);
                server.respond(req.success(ResponseBody::ConfigurationDone))?;
            }
            Command::Threads => {
                debug!("Received Threads request");
                server.respond(req.success(ResponseBody::Threads(ThreadsResponse {
                    threads: vec![types::Thread {
                        id: self.flow.thread_id(),
                        name: "main".to_string(),
                    }],
                })))?;
            }
            Command::StackTrace(args) => {
                debug!(?args, "Received StackTrace request");
                let stack_frames = self.stack_frames();
                let rsp = req.success(ResponseBody::StackTrace(StackTraceResponse {
                    total_frames: Some(stack_frames.len() as i64),
                    stack_frames,
                }));
                server.respond(rsp)?;
            }
            Command::Scopes(args) => {
                debug!(?args, "Received Scopes request");
                let rsp = match self.scopes() {
                    Ok(scopes) => req.success(ResponseBody::Scopes(ScopesResponse { scopes })),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::Variables(args) => {
                debug!(?args, "Received Variables request");
                let rsp = match self.variables(args.variables_reference) {
                    Ok(variables) => req.success(ResponseBody::Variables(VariablesResponse { variables })),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::Evaluate(args) => {
                debug!(?args, "Received Evaluate request");
                let rsp = match self.evaluate(&args.expression) {
                    Ok((value, variables_reference)) => req.success(ResponseBody::Evaluate(EvaluateResponse {
                        result: value.to_string(),
                        type_field: Some(value.type_name().to_string()),
                        variables_reference,
                        named_variables: None,
                        indexed_variables: None,
                        presentation_hint: None,
                        memory_reference: None,
                    })),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::Continue(_) => {
                debug!("Received Continue request");
                let rsp = match self.flow.continue_() {
                    Ok(()) => req.success(ResponseBody::Continue(ContinueResponse {
                        all_threads_continued: Some(true),
                    })),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::Next(_) => {
                debug!("Received Next request");
                let rsp = match self.flow.next() {
                    Ok(()) => req.success(ResponseBody::Next),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::StepIn(_) => {
                debug!("Received StepIn request");
                let rsp = match self.flow.step_in() {
                    Ok(()) => req.success(ResponseBody::StepIn),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::StepOut(_) => {
                debug!("Received StepOut request");
                let rsp = match self.flow.step_out() {
                    Ok(()) => req.success(ResponseBody::StepOut),
                    Err(e) => req.error(&e.to_string()),
                };
                server.respond(rsp)?;
            }
            Command::Disconnect(_) => {
                debug!("Received Disconnect request");
                self.flow.disconnect();
                server.respond(req.success(ResponseBody::Disconnect))?;
                return Err(Box::new(AdapterError::Shutdown));
            }
            command => {
                return Err(Box::new(AdapterError::UnhandledCommand(command.clone())));
            }
        }
        Ok(())
    }
}

impl Drop for ManifestAdapter {
    fn drop(&mut self) {
        self.flow.disconnect();
    }
}

fn scope_entry(name: &str, variables_reference: i64) -> types::Scope {
    types::Scope {
        name: name.to_string(),
        variables_reference,
        expensive: false,
        named_variables: None,
        indexed_variables: None,
        source: None,
        line: None,
        column: None,
        end_line: None,
        end_column: None,
        presentation_hint: None,
    }
}

/// Translates an engine notification into the DAP event sent to the client.
pub fn debugger_event(message: DebuggerMessage) -> Event {
    match message {
        DebuggerMessage::Stopped {
            reason,
            description,
            text,
            thread_id,
        } => Event::Stopped(events::StoppedEventBody {
            reason: match reason {
                StopReason::Step => types::StoppedEventReason::Step,
                StopReason::Breakpoint => types::StoppedEventReason::Breakpoint,
                StopReason::FunctionBreakpoint => types::StoppedEventReason::Function,
                StopReason::Exception => types::StoppedEventReason::Exception,
            },
            description: Some(description),
            thread_id: Some(thread_id),
            preserve_focus_hint: None,
            text: Some(text),
            all_threads_stopped: Some(true),
            hit_breakpoint_ids: None,
        }),
        DebuggerMessage::Output { category, text } => Event::Output(events::OutputEventBody {
            output: text,
            category: Some(match category {
                OutputCategory::Console => types::OutputEventCategory::Console,
                OutputCategory::Stdout => types::OutputEventCategory::Stdout,
                OutputCategory::Stderr => types::OutputEventCategory::Stderr,
            }),
            group: None,
            variables_reference: None,
            source: None,
            line: None,
            column: None,
            data: None,
        }),
        DebuggerMessage::Exited { code } => Event::Exited(events::ExitedEventBody {
            exit_code: code as i64,
        }),
        DebuggerMessage::Terminated => Event::Terminated(Some(events::TerminatedEventBody {
            restart: Some(serde_json::Value::Bool(false)),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dap::server::Server;
    use pp_debug::{AstNode, Scope, SourceLocation, StackFrame};
    use rstest::rstest;
    use std::io::{BufReader, BufWriter, Cursor, Write};
    use std::time::Duration;
    use tempfile::NamedTempFile;

    type TestServer = Server<Cursor<Vec<u8>>, Cursor<Vec<u8>>>;

    #[derive(Debug)]
    struct ResourceNode {
        file: PathBuf,
        line: usize,
    }

    impl AstNode for ResourceNode {
        fn kind_name(&self) -> &str {
            "ResourceExpression"
        }

        fn source_location(&self) -> Option<SourceLocation> {
            Some(SourceLocation::new(&self.file, self.line, 0, 1))
        }

        fn line_for_offset(&self, _offset: usize) -> usize {
            self.line
        }
    }

    #[derive(Debug)]
    struct ClassScope;

    impl Scope for ClassScope {
        fn local_variables(&self) -> Vec<(String, Value)> {
            vec![
                ("port".to_string(), Value::Integer(8080)),
                (
                    "packages".to_string(),
                    Value::Array(vec![Value::String("nginx".to_string()), Value::String("curl".to_string())]),
                ),
            ]
        }

        fn global_variables(&self) -> Vec<(String, Value)> {
            vec![("osfamily".to_string(), Value::String("Debian".to_string()))]
        }

        fn stack_trace(&self) -> Vec<StackFrame> {
            vec![
                StackFrame::new("nginx::config", Some(PathBuf::from("/etc/nginx.pp")), 4),
                StackFrame::new("main", Some(PathBuf::from("/etc/site.pp")), 2),
            ]
        }
    }

    /// Evaluates a single resource on line 2 of the launched manifest.
    struct SingleResourceRunner;

    impl ManifestRunner for SingleResourceRunner {
        fn run(&self, launch: &LaunchArgs, hooks: &HookAdapter) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
            let node: Arc<dyn AstNode> = Arc::new(ResourceNode {
                file: PathBuf::from(&launch.manifest),
                line: 2,
            });
            let scope: Arc<dyn Scope> = Arc::new(ClassScope);
            hooks.before_evaluate(&node, &scope);
            hooks.after_evaluate(&node, &scope);
            Ok(0)
        }

        fn evaluate(
            &self,
            expression: &str,
            scope: Option<&dyn Scope>,
            _unit: Option<pp_debug::state::CompilationUnit>,
        ) -> Result<Value, String> {
            let scope = scope.ok_or("No scope")?;
            scope
                .local_variables()
                .into_iter()
                .find(|(name, _)| format!("${}", name) == expression)
                .map(|(_, value)| value)
                .ok_or_else(|| format!("Unknown variable '{}'", expression))
        }
    }

    fn server() -> TestServer {
        let input = BufReader::new(Cursor::new(Vec::new()));
        let output = BufWriter::new(Cursor::new(Vec::new()));
        Server::new(input, output)
    }

    fn adapter() -> ManifestAdapter {
        let config = DebugConfig {
            poll_interval_ms: 5,
            exit_grace_period_ms: 50,
            ..Default::default()
        };
        ManifestAdapter::new(Arc::new(SingleResourceRunner), config).with_hooks(|hooks| hooks.with_exit_action(|_| {}))
    }

    fn manifest() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".pp").unwrap();
        file.write_all(b"class { 'nginx': }\npackage { 'nginx': ensure => installed }\n")
            .unwrap();
        file
    }

    fn launch_request(manifest: &Path) -> Request {
        Request {
            seq: 1,
            command: Command::Launch(dap::requests::LaunchRequestArguments {
                no_debug: None,
                restart_data: None,
                additional_data: Some(serde_json::json!({ "manifest": manifest.to_string_lossy() })),
            }),
        }
    }

    fn set_breakpoints_request(path: &Path, lines: &[i64]) -> Request {
        #[allow(deprecated)]
        Request {
            seq: 2,
            command: Command::SetBreakpoints(dap::requests::SetBreakpointsArguments {
                source: types::Source {
                    name: path.file_name().map(|n| n.to_string_lossy().to_string()),
                    path: Some(path.to_string_lossy().to_string()),
                    adapter_data: None,
                    source_reference: None,
                    presentation_hint: None,
                    origin: None,
                    checksums: None,
                    sources: None,
                },
                breakpoints: Some(
                    lines
                        .iter()
                        .map(|line| types::SourceBreakpoint {
                            line: *line,
                            column: None,
                            condition: None,
                            hit_condition: None,
                            log_message: None,
                        })
                        .collect(),
                ),
                lines: None,
                source_modified: None,
            }),
        }
    }

    fn simple_request(command: Command) -> Request {
        Request { seq: 3, command }
    }

    /// Launches the manifest with a breakpoint on line 2 and waits for the pause.
    fn paused_session(adapter: &mut ManifestAdapter, server: &mut TestServer, manifest: &Path) -> Receiver<DebuggerMessage> {
        let rx = adapter.take_debugger_messages().unwrap();
        adapter
            .handle_request(set_breakpoints_request(manifest, &[2]), server)
            .unwrap();
        adapter.handle_request(launch_request(manifest), server).unwrap();
        adapter
            .handle_request(simple_request(Command::ConfigurationDone), server)
            .unwrap();

        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            message,
            DebuggerMessage::Stopped {
                reason: StopReason::Breakpoint,
                ..
            }
        ));
        rx
    }

    #[test]
    fn test_adapter_new() {
        let mut adapter = adapter();
        assert!(adapter.manifest.is_none());
        assert!(adapter.evaluation.is_none());
        assert!(adapter.take_debugger_messages().is_some());
        assert!(adapter.take_debugger_messages().is_none());
    }

    #[test]
    fn test_handle_request_threads() {
        let mut adapter = adapter();
        let mut server = server();
        let result = adapter.handle_request(simple_request(Command::Threads), &mut server);
        assert!(result.is_ok());
    }

    #[test]
    fn test_handle_request_configuration_done_sets_flag() {
        let mut adapter = adapter();
        let mut server = server();
        let result = adapter.handle_request(simple_request(Command::ConfigurationDone), &mut server);
        assert!(result.is_ok());
        assert!(adapter.flow().query_flag(Flag::ClientConfigured));
    }

    #[test]
    fn test_handle_request_set_breakpoints_registers_lines() {
        let manifest = manifest();
        let mut adapter = adapter();
        let mut server = server();

        let result = adapter.handle_request(set_breakpoints_request(manifest.path(), &[2, 3]), &mut server);
        assert!(result.is_ok());
        assert_eq!(
            adapter.flow().breakpoints().line_breakpoints(manifest.path()),
            std::collections::BTreeSet::from([2])
        );
    }

    #[test]
    fn test_handle_request_set_function_breakpoints() {
        let mut adapter = adapter();
        let mut server = server();

        let req = simple_request(Command::SetFunctionBreakpoints(
            dap::requests::SetFunctionBreakpointsArguments {
                breakpoints: vec![types::FunctionBreakpoint {
                    name: "mymodule::trace".to_string(),
                    condition: None,
                    hit_condition: None,
                }],
            },
        ));

        let result = adapter.handle_request(req, &mut server);
        assert!(result.is_ok());
        assert!(adapter.flow().breakpoints().is_function_breakpoint("mymodule::trace"));
    }

    #[rstest]
    #[case::continue_(Command::Continue(dap::requests::ContinueArguments { thread_id: 1, single_thread: None }))]
    #[case::next(Command::Next(dap::requests::NextArguments { thread_id: 1, single_thread: None, granularity: None }))]
    #[case::step_in(Command::StepIn(dap::requests::StepInArguments {
        thread_id: 1,
        single_thread: None,
        target_id: None,
        granularity: None,
    }))]
    #[case::step_out(Command::StepOut(dap::requests::StepOutArguments {
        thread_id: 1,
        single_thread: None,
        granularity: None,
    }))]
    fn test_resume_requests_while_running_are_answered(#[case] command: Command) {
        let mut adapter = adapter();
        let mut server = server();
        let result = adapter.handle_request(simple_request(command), &mut server);
        assert!(result.is_ok());
        assert!(!adapter.flow().is_paused());
    }

    #[test]
    fn test_handle_request_stack_trace_without_pause() {
        let adapter = adapter();
        let frames = adapter.stack_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "unknown");
        assert_eq!(frames[0].line, 1);
    }

    #[test]
    fn test_scopes_without_pause_are_empty() {
        let adapter = adapter();
        assert!(adapter.scopes().unwrap().is_empty());
    }

    #[test]
    fn test_variables_with_unknown_reference() {
        let adapter = adapter();
        assert!(matches!(
            adapter.variables(42),
            Err(AdapterError::Debug(pp_debug::DebugError::UnknownVariableReference(42)))
        ));
    }

    /// Answers every expression, paused or not.
    struct ConstantRunner;

    impl ManifestRunner for ConstantRunner {
        fn run(&self, _launch: &LaunchArgs, _hooks: &HookAdapter) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
            Ok(0)
        }

        fn evaluate(
            &self,
            _expression: &str,
            _scope: Option<&dyn Scope>,
            _unit: Option<pp_debug::state::CompilationUnit>,
        ) -> Result<Value, String> {
            Ok(Value::Integer(42))
        }
    }

    #[test]
    fn test_evaluate_without_pause() {
        let adapter = adapter();
        let result = adapter.evaluate("$port");
        assert!(matches!(result, Err(AdapterError::Debug(DebugError::NotPaused))));
    }

    #[test]
    fn test_evaluate_while_running_is_rejected() {
        let adapter = ManifestAdapter::new(Arc::new(ConstantRunner), DebugConfig::default());
        let result = adapter.evaluate("$x");
        assert!(matches!(result, Err(AdapterError::Debug(DebugError::NotPaused))));
    }

    #[test]
    fn test_handle_request_evaluate_while_running_responds_with_error() {
        let mut adapter = ManifestAdapter::new(Arc::new(ConstantRunner), DebugConfig::default());
        let mut server = server();
        let req = simple_request(Command::Evaluate(dap::requests::EvaluateArguments {
            expression: "$x".to_string(),
            frame_id: None,
            context: None,
            format: None,
        }));
        assert!(adapter.handle_request(req, &mut server).is_ok());
    }

    fn launch_with(additional_data: Option<serde_json::Value>) -> Request {
        simple_request(Command::Launch(dap::requests::LaunchRequestArguments {
            no_debug: None,
            restart_data: None,
            additional_data,
        }))
    }

    #[rstest]
    #[case::missing(None)]
    #[case::malformed(Some(serde_json::json!({ "manifest": 42 })))]
    fn test_handle_request_launch_invalid_arguments_responds_with_error(#[case] data: Option<serde_json::Value>) {
        let mut adapter = adapter();
        let mut server = server();

        let result = adapter.handle_request(launch_with(data), &mut server);
        assert!(result.is_ok());
        assert!(adapter.evaluation.is_none());
        assert!(adapter.manifest.is_none());
    }

    #[test]
    fn test_paused_session_inspection() {
        let manifest = manifest();
        let mut adapter = adapter();
        let mut server = server();
        let rx = paused_session(&mut adapter, &mut server, manifest.path());

        let frames = adapter.stack_frames();
        assert_eq!(
            frames.iter().map(|f| (f.name.as_str(), f.line)).collect::<Vec<_>>(),
            vec![("nginx::config", 4), ("main", 2)]
        );

        let scopes = adapter.scopes().unwrap();
        assert_eq!(scopes.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["Local", "Global"]);

        let locals = adapter.variables(scopes[0].variables_reference).unwrap();
        assert_eq!(locals[0].name, "port");
        assert_eq!(locals[0].value, "8080");
        assert_eq!(locals[0].variables_reference, 0);
        assert_eq!(locals[1].name, "packages");
        assert_eq!(locals[1].value, "['nginx', 'curl']");
        assert_ne!(locals[1].variables_reference, 0);

        let items = adapter.variables(locals[1].variables_reference).unwrap();
        assert_eq!(
            items.iter().map(|v| (v.name.as_str(), v.value.as_str())).collect::<Vec<_>>(),
            vec![("[0]", "'nginx'"), ("[1]", "'curl'")]
        );

        let globals = adapter.variables(scopes[1].variables_reference).unwrap();
        assert_eq!(globals[0].value, "'Debian'");

        let (value, reference) = adapter.evaluate("$packages").unwrap();
        assert_eq!(value.type_name(), "Array");
        assert_ne!(reference, 0);

        let result = adapter.handle_request(
            simple_request(Command::Continue(dap::requests::ContinueArguments {
                thread_id: 1,
                single_thread: None,
            })),
            &mut server,
        );
        assert!(result.is_ok());
        assert!(adapter.variables(locals[1].variables_reference).is_err());

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), DebuggerMessage::Exited { code: 0 });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), DebuggerMessage::Terminated);
    }

    #[test]
    fn test_handle_request_launch_twice() {
        let manifest = manifest();
        let mut adapter = adapter();
        let mut server = server();
        let _rx = paused_session(&mut adapter, &mut server, manifest.path());

        let result = adapter.handle_request(launch_request(manifest.path()), &mut server);
        assert!(result.is_ok());
        assert!(adapter.flow().is_paused());
    }

    #[test]
    fn test_handle_request_disconnect() {
        let mut adapter = adapter();
        let mut server = server();

        let req = simple_request(Command::Disconnect(dap::requests::DisconnectArguments {
            restart: None,
            terminate_debuggee: None,
            suspend_debuggee: None,
        }));

        let result = adapter.handle_request(req, &mut server);
        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<AdapterError>(), Some(AdapterError::Shutdown)));
        assert!(adapter.flow().is_terminated());
    }

    #[test]
    fn test_handle_request_unhandled_command() {
        let mut adapter = adapter();
        let mut server = server();
        let req = simple_request(Command::Pause(dap::requests::PauseArguments { thread_id: 1 }));
        let result = adapter.handle_request(req, &mut server);
        assert!(result.is_err());
    }

    #[rstest]
    #[case::breakpoint(StopReason::Breakpoint)]
    #[case::function(StopReason::FunctionBreakpoint)]
    #[case::step(StopReason::Step)]
    #[case::exception(StopReason::Exception)]
    fn test_debugger_event_stopped(#[case] reason: StopReason) {
        let event = debugger_event(DebuggerMessage::Stopped {
            reason,
            description: "Breakpoint hit at site.pp:2".to_string(),
            text: "Line 2".to_string(),
            thread_id: 1,
        });

        match event {
            Event::Stopped(body) => {
                assert_eq!(body.thread_id, Some(1));
                assert_eq!(body.description.as_deref(), Some("Breakpoint hit at site.pp:2"));
                let matched = match body.reason {
                    types::StoppedEventReason::Step => reason == StopReason::Step,
                    types::StoppedEventReason::Breakpoint => reason == StopReason::Breakpoint,
                    types::StoppedEventReason::Function => reason == StopReason::FunctionBreakpoint,
                    types::StoppedEventReason::Exception => reason == StopReason::Exception,
                    _ => false,
                };
                assert!(matched);
            }
            _ => panic!("expected stopped event"),
        }
    }

    #[test]
    fn test_debugger_event_output() {
        let event = debugger_event(DebuggerMessage::Output {
            category: OutputCategory::Stderr,
            text: "err: failed\n".to_string(),
        });
        match event {
            Event::Output(body) => {
                assert_eq!(body.output, "err: failed\n");
                assert!(matches!(body.category, Some(types::OutputEventCategory::Stderr)));
            }
            _ => panic!("expected output event"),
        }
    }

    #[test]
    fn test_debugger_event_exited_and_terminated() {
        assert!(matches!(
            debugger_event(DebuggerMessage::Exited { code: 2 }),
            Event::Exited(events::ExitedEventBody { exit_code: 2 })
        ));
        assert!(matches!(
            debugger_event(DebuggerMessage::Terminated),
            Event::Terminated(Some(_))
        ));
    }
}

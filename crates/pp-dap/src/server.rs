use dap::prelude::*;
use pp_debug::DebugConfig;
use std::io::{self, BufReader, BufWriter};
use std::sync::{Arc, PoisonError};
use std::thread;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::adapter::{ManifestAdapter, debugger_event};
use crate::error::AdapterError;
use crate::executor::ManifestRunner;
use crate::log::DebugConsoleWriter;

type DynResult<T> = miette::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Runs a debug adapter over stdio until the client disconnects.
pub fn start(runner: Arc<dyn ManifestRunner>, config: DebugConfig) -> DynResult<()> {
    let adapter = ManifestAdapter::new(runner, config);

    #[cfg(debug_assertions)]
    let default_filter = "pp_dap=debug,pp_debug=debug";
    #[cfg(not(debug_assertions))]
    let default_filter = "pp_dap=info,pp_debug=info";

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_ansi(false)
        .with_writer(DebugConsoleWriter::new(adapter.message_sender()))
        .init();

    info!("Starting pp-dap debug adapter");
    serve(adapter, io::stdin(), io::stdout())
}

/// Serves DAP requests from `reader`, writing responses and events to `writer`.
pub fn serve<R, W>(mut adapter: ManifestAdapter, reader: R, writer: W) -> DynResult<()>
where
    R: io::Read,
    W: io::Write + Send + 'static,
{
    let mut server = Server::new(BufReader::new(reader), BufWriter::new(writer));

    // First, the client sends an initialize request
    let req = match server.poll_request()? {
        Some(req) => req,
        None => {
            return Err(Box::new(AdapterError::ProtocolError(
                "Missing initialize request".to_string(),
            )));
        }
    };

    if let Command::Initialize(_) = &req.command {
        let capabilities = types::Capabilities {
            supports_configuration_done_request: Some(true),
            supports_function_breakpoints: Some(true),
            supports_evaluate_for_hovers: Some(true),
            supports_exception_options: Some(false),
            supports_exception_filter_options: Some(false),
            ..Default::default()
        };
        let rsp = req.success(ResponseBody::Initialize(capabilities));
        server.respond(rsp)?;
        server.send_event(Event::Initialized)?;
    } else {
        return Err(Box::new(AdapterError::ProtocolError(
            "Expected initialize request".to_string(),
        )));
    }

    let messages = adapter
        .take_debugger_messages()
        .ok_or_else(|| AdapterError::ProtocolError("Debugger messages are already consumed".to_string()))?;
    // Engine messages are written as events as they arrive. Runs until every
    // sender is gone and must not log per message, since log lines travel
    // through the same channel.
    let output = Arc::clone(&server.output);
    thread::Builder::new().name("dap-events".to_string()).spawn(move || {
        for message in messages {
            let event = debugger_event(message);
            let mut output = output.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = output.send_event(event) {
                eprintln!("Failed to send event to client: {}", e);
                break;
            }
        }
    })?;

    loop {
        match server.poll_request()? {
            Some(req) => {
                if let Err(e) = adapter.handle_request(req, &mut server) {
                    if let Some(AdapterError::Shutdown) = e.downcast_ref::<AdapterError>() {
                        debug!("Client requested shutdown");
                        break;
                    }
                    error!(error = %e, "Failed to handle DAP request");
                }
            }
            None => {
                info!("Client disconnected or stream ended");
                break;
            }
        }
    }

    Ok(())
}

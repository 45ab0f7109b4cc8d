use std::io::{self, Write};

use crossbeam_channel::Sender;
use pp_debug::OutputCategory;
use tracing_subscriber::fmt::MakeWriter;

use crate::protocol::DebuggerMessage;

/// Writes formatted log lines to the client's debug console.
#[derive(Clone)]
pub struct DebugConsoleWriter {
    sender: Sender<DebuggerMessage>,
}

impl DebugConsoleWriter {
    pub fn new(sender: Sender<DebuggerMessage>) -> Self {
        Self { sender }
    }
}

impl Write for DebugConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = String::from_utf8_lossy(buf);
        let sent = self.sender.send(DebuggerMessage::Output {
            category: OutputCategory::Console,
            text: message.to_string(),
        });
        if sent.is_err() {
            // Keep logging alive once the client is gone.
            eprintln!("Warning: Log channel is closed, message dropped: {}", message);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for DebugConsoleWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

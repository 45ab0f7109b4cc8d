use crossbeam_channel::Sender;
use pp_debug::{ClientSink, OutputCategory, StopReason};
use tracing::error;

use crate::protocol::DebuggerMessage;

/// Client sink that hands engine notifications to the DAP server loop
pub struct DapClientSink {
    message_tx: Sender<DebuggerMessage>,
}

impl std::fmt::Debug for DapClientSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DapClientSink")
            .field("pending", &self.message_tx.len())
            .finish()
    }
}

impl DapClientSink {
    pub fn new(message_tx: Sender<DebuggerMessage>) -> Self {
        Self { message_tx }
    }

    fn send(&self, message: DebuggerMessage) {
        if let Err(e) = self.message_tx.send(message) {
            error!(error = %e, "Failed to send debugger message to DAP server");
        }
    }
}

impl ClientSink for DapClientSink {
    fn send_stopped(&self, reason: StopReason, description: &str, text: &str, thread_id: i64) {
        self.send(DebuggerMessage::Stopped {
            reason,
            description: description.to_string(),
            text: text.to_string(),
            thread_id,
        });
    }

    fn send_exited(&self, code: i32) {
        self.send(DebuggerMessage::Exited { code });
    }

    fn send_output(&self, category: OutputCategory, text: &str) {
        self.send(DebuggerMessage::Output {
            category,
            text: text.to_string(),
        });
    }

    fn send_terminated(&self) {
        self.send(DebuggerMessage::Terminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_are_forwarded_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = DapClientSink::new(tx);

        sink.send_stopped(StopReason::Breakpoint, "Breakpoint hit at site.pp:5", "Line 5", 1);
        sink.send_output(OutputCategory::Stdout, "notice: applied\n");
        sink.send_exited(0);
        sink.send_terminated();

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                DebuggerMessage::Stopped {
                    reason: StopReason::Breakpoint,
                    description: "Breakpoint hit at site.pp:5".to_string(),
                    text: "Line 5".to_string(),
                    thread_id: 1,
                },
                DebuggerMessage::Output {
                    category: OutputCategory::Stdout,
                    text: "notice: applied\n".to_string(),
                },
                DebuggerMessage::Exited { code: 0 },
                DebuggerMessage::Terminated,
            ]
        );
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let sink = DapClientSink::new(tx);
        sink.send_exited(1);
    }
}

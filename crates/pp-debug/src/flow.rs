//! Pause/resume coordination between the evaluation thread and request threads.
//!
//! The evaluation thread parks inside [`FlowControl::raise_stopped_event_and_wait`]
//! on a single-slot resume channel. Request threads change the run mode, clear
//! the saved snapshot and then hand over a resume token. Termination is
//! mirrored in an atomic so parked and waiting threads can notice it between
//! bounded waits even if no token arrives.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::breakpoints::BreakpointRegistry;
use crate::config::DebugConfig;
use crate::error::DebugError;
use crate::run_mode::RunMode;
use crate::sink::{ClientSink, StopReason};
use crate::state::{PausedState, SessionState};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Flag {
    StartRequested,
    Started,
    Paused,
    ClientConfigured,
    SessionReady,
    /// Once asserted it stays asserted.
    Terminate,
    SuppressLogs,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
struct Flags {
    start_requested: bool,
    started: bool,
    paused: bool,
    client_configured: bool,
    session_ready: bool,
    terminate: bool,
    suppress_logs: bool,
}

impl Flags {
    fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::StartRequested => self.start_requested,
            Flag::Started => self.started,
            Flag::Paused => self.paused,
            Flag::ClientConfigured => self.client_configured,
            Flag::SessionReady => self.session_ready,
            Flag::Terminate => self.terminate,
            Flag::SuppressLogs => self.suppress_logs,
        }
    }

    fn slot(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::StartRequested => &mut self.start_requested,
            Flag::Started => &mut self.started,
            Flag::Paused => &mut self.paused,
            Flag::ClientConfigured => &mut self.client_configured,
            Flag::SessionReady => &mut self.session_ready,
            Flag::Terminate => &mut self.terminate,
            Flag::SuppressLogs => &mut self.suppress_logs,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionPhase {
    Idle,
    Ready,
    Running,
    Paused,
    Terminated,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Ready => "ready",
            SessionPhase::Running => "running",
            SessionPhase::Paused => "paused",
            SessionPhase::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

/// A one-slot wake-up signal.
#[derive(Debug)]
struct Signal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Signal {
    fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    fn notify(&self) {
        // A full slot already wakes the waiter.
        let _ = self.tx.try_send(());
    }

    fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

pub struct FlowControl {
    flags: Mutex<Flags>,
    terminated: AtomicBool,
    run_mode: Mutex<RunMode>,
    state: SessionState,
    breakpoints: BreakpointRegistry,
    sink: Arc<dyn ClientSink>,
    config: DebugConfig,
    resume: Signal,
    start: Signal,
    disconnect: Signal,
}

impl fmt::Debug for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowControl")
            .field("flags", &*self.flags())
            .field("run_mode", &self.run_mode())
            .field("state", &self.state)
            .finish()
    }
}

impl FlowControl {
    pub fn new(config: DebugConfig, sink: Arc<dyn ClientSink>) -> Self {
        Self {
            flags: Mutex::new(Flags::default()),
            terminated: AtomicBool::new(false),
            run_mode: Mutex::new(RunMode::Run),
            state: SessionState::new(),
            breakpoints: BreakpointRegistry::new(config.sentinel_function.clone()),
            sink,
            config,
            resume: Signal::new(),
            start: Signal::new(),
            disconnect: Signal::new(),
        }
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_mode_slot(&self) -> MutexGuard<'_, RunMode> {
        self.run_mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    pub fn sink(&self) -> &dyn ClientSink {
        self.sink.as_ref()
    }

    pub fn thread_id(&self) -> i64 {
        self.config.thread_id
    }

    pub fn run_mode(&self) -> RunMode {
        *self.run_mode_slot()
    }

    pub fn set_run_mode(&self, mode: RunMode) {
        debug!(mode = %mode, "Setting run mode");
        *self.run_mode_slot() = mode;
    }

    pub fn query_flag(&self, flag: Flag) -> bool {
        if flag == Flag::Terminate && self.is_terminated() {
            return true;
        }
        self.flags().get(flag)
    }

    pub fn assert_flag(&self, flag: Flag) {
        if flag == Flag::Terminate {
            self.terminate();
            return;
        }

        let mut flags = self.flags();
        *flags.slot(flag) = true;
        if matches!(flag, Flag::SessionReady | Flag::ClientConfigured) {
            self.check_start(&mut flags);
        }
    }

    pub fn unassert_flag(&self, flag: Flag) {
        if flag == Flag::Terminate {
            warn!("Ignoring attempt to clear the terminate flag");
            return;
        }
        *self.flags().slot(flag) = false;
    }

    fn check_start(&self, flags: &mut Flags) {
        if flags.session_ready && flags.client_configured && !flags.start_requested {
            info!("Session ready and client configured, requesting start");
            flags.start_requested = true;
            self.start.notify();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.flags().paused
    }

    /// Fast unsynchronized check used by wait loops.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> SessionPhase {
        let flags = *self.flags();
        if flags.terminate || self.is_terminated() {
            SessionPhase::Terminated
        } else if flags.paused {
            SessionPhase::Paused
        } else if flags.started {
            SessionPhase::Running
        } else if flags.start_requested {
            SessionPhase::Ready
        } else {
            SessionPhase::Idle
        }
    }

    /// Blocks until evaluation may start. Returns `false` if the session was
    /// terminated first.
    pub fn wait_for_start(&self) -> bool {
        loop {
            if self.is_terminated() {
                return false;
            }
            if self.flags().start_requested {
                return true;
            }
            if let Err(RecvTimeoutError::Disconnected) = self.start.rx.recv_timeout(self.config.poll_interval()) {
                return false;
            }
        }
    }

    /// Marks evaluation as running and resets the live depth.
    pub fn begin_evaluation(&self) {
        self.state.reset();
        self.set_run_mode(RunMode::Run);
        self.flags().started = true;
        info!("Evaluation started");
    }

    /// Saves `state`, notifies the client and parks the calling evaluation
    /// thread until a resume operation or termination.
    ///
    /// A no-op when the session is already paused or terminated.
    pub fn raise_stopped_event_and_wait(&self, reason: StopReason, description: &str, text: &str, state: PausedState) {
        {
            let flags = self.flags();
            if flags.paused || flags.terminate || self.is_terminated() {
                return;
            }
        }

        self.resume.drain();
        self.state.save(state);
        self.flags().paused = true;

        debug!(reason = %reason, description, "Evaluation paused");
        self.sink.send_stopped(reason, description, text, self.thread_id());

        self.wait_for_resume();
    }

    fn wait_for_resume(&self) {
        loop {
            match self.resume.rx.recv_timeout(self.config.poll_interval()) {
                Ok(()) => return,
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_terminated() {
                        debug!("Session terminated while paused");
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn resume_with(&self, name: &str, next_mode: impl FnOnce(usize) -> RunMode) -> Result<(), DebugError> {
        let mut flags = self.flags();
        if flags.terminate {
            warn!(command = name, "Ignoring resume request after termination");
            return Err(DebugError::Terminated);
        }
        if !flags.paused {
            warn!(command = name, "Ignoring resume request while not paused");
            return Err(DebugError::NotPaused);
        }

        // The paused depth has to be read before the snapshot is cleared.
        let depth = self.state.saved_depth().unwrap_or_else(|| self.state.depth());
        let mode = next_mode(depth);
        self.set_run_mode(mode);
        self.state.clear();
        flags.paused = false;
        drop(flags);

        debug!(command = name, mode = %mode, "Resuming evaluation");
        self.resume.notify();
        Ok(())
    }

    pub fn continue_(&self) -> Result<(), DebugError> {
        self.resume_with("continue", |_| RunMode::Run)
    }

    pub fn next(&self) -> Result<(), DebugError> {
        self.resume_with("next", |depth| RunMode::Next { depth })
    }

    pub fn step_in(&self) -> Result<(), DebugError> {
        self.resume_with("stepIn", |_| RunMode::StepIn)
    }

    pub fn step_out(&self) -> Result<(), DebugError> {
        self.resume_with("stepOut", |depth| RunMode::StepOut { depth })
    }

    /// Irreversibly ends the session and wakes a parked evaluation.
    pub fn terminate(&self) {
        let mut flags = self.flags();
        if !flags.terminate {
            info!("Terminating debug session");
        }
        flags.terminate = true;
        self.terminated.store(true, Ordering::Relaxed);
        drop(flags);

        self.resume.notify();
        self.start.notify();
    }

    /// Client went away. Terminates and releases the process exit wait.
    pub fn disconnect(&self) {
        self.terminate();
        self.disconnect.notify();
    }

    /// Waits up to `timeout` for the client to disconnect.
    pub fn wait_for_disconnect(&self, timeout: Duration) -> bool {
        self.disconnect.rx.recv_timeout(timeout).is_ok()
    }
}

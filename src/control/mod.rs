pub mod listener;
pub mod server;

use log::info;
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const PAUSE_POLL: Duration = Duration::from_millis(500);
const MAX_STATUS_LOGS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Proceed,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Starting,
    Running,
    Paused,
    Stopping,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run_id: String,
    pub state: RunState,
    pub page: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    pub current_company: String,
    pub logs: Vec<String>,
}

impl RunStatus {
    fn new() -> Self {
        RunStatus {
            run_id: Uuid::new_v4().to_string(),
            state: RunState::Starting,
            page: 0,
            inserted: 0,
            duplicates: 0,
            skipped: 0,
            failed: 0,
            current_company: String::new(),
            logs: Vec::new(),
        }
    }

    pub fn log(&mut self, msg: String) {
        self.logs.push(msg);
        if self.logs.len() > MAX_STATUS_LOGS {
            self.logs.remove(0);
        }
    }
}

struct Inner {
    stop: AtomicBool,
    paused: AtomicBool,
    status: Mutex<RunStatus>,
}

/// Cloneable handle shared by the crawl and every signal source.
#[derive(Clone)]
pub struct RunControl {
    inner: Arc<Inner>,
}

impl RunControl {
    pub fn new() -> Self {
        RunControl {
            inner: Arc::new(Inner {
                stop: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                status: Mutex::new(RunStatus::new()),
            }),
        }
    }

    /// One-way: once set it stays set for the rest of the run.
    pub fn request_stop(&self) {
        if !self.inner.stop.swap(true, Ordering::SeqCst) {
            info!("Stop requested; finishing the current company.");
            self.update_status(|s| {
                s.state = RunState::Stopping;
                s.log("Stop requested.".to_string());
            });
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        let was = self.inner.paused.swap(paused, Ordering::SeqCst);
        if was != paused {
            info!("{}", if paused { "Paused." } else { "Resumed." });
            self.update_status(|s| s.log(if paused { "Paused." } else { "Resumed." }.to_string()));
        }
    }

    /// Returns the new pause state.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.is_paused();
        self.set_paused(paused);
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Blocks while paused. Stop wins over pause.
    pub fn checkpoint(&self) -> Checkpoint {
        let mut reported = false;
        loop {
            if self.is_stop_requested() {
                return Checkpoint::Stop;
            }
            if !self.is_paused() {
                if reported {
                    self.update_status(|s| s.state = RunState::Running);
                }
                return Checkpoint::Proceed;
            }
            if !reported {
                self.update_status(|s| s.state = RunState::Paused);
                reported = true;
            }
            thread::sleep(PAUSE_POLL);
        }
    }

    pub fn status(&self) -> RunStatus {
        self.lock_status().clone()
    }

    pub fn update_status(&self, f: impl FnOnce(&mut RunStatus)) {
        f(&mut self.lock_status());
    }

    fn lock_status(&self) -> MutexGuard<'_, RunStatus> {
        self.inner.status.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for RunControl {
    fn default() -> Self {
        RunControl::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    TogglePause,
    Pause,
    Resume,
    Stop,
    /// The operator finished authenticating in the capture browser.
    AuthReady,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "p" | "pause" => Ok(ControlCommand::TogglePause),
            "resume" | "r" => Ok(ControlCommand::Resume),
            "s" | "stop" | "q" | "quit" => Ok(ControlCommand::Stop),
            "" | "ok" | "done" => Ok(ControlCommand::AuthReady),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Receiving end of the "authenticated" signal.
pub struct AuthSignal {
    rx: Receiver<()>,
}

impl AuthSignal {
    /// Blocks until the operator confirms or a stop is requested. Returns
    /// `false` on stop. Confirmations sent before this call are discarded.
    pub fn wait(&self, control: &RunControl) -> bool {
        while self.rx.try_recv().is_ok() {}
        loop {
            if control.is_stop_requested() {
                return false;
            }
            match self.rx.recv_timeout(PAUSE_POLL) {
                Ok(()) => return true,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

/// Routes operator commands onto the run flags and the auth signal.
#[derive(Clone)]
pub struct ControlChannel {
    control: RunControl,
    auth_tx: Arc<Mutex<Sender<()>>>,
}

impl ControlChannel {
    pub fn new(control: RunControl) -> (Self, AuthSignal) {
        let (tx, rx) = mpsc::channel();
        (
            ControlChannel {
                control,
                auth_tx: Arc::new(Mutex::new(tx)),
            },
            AuthSignal { rx },
        )
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn dispatch(&self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::TogglePause => {
                self.control.toggle_pause();
            }
            ControlCommand::Pause => self.control.set_paused(true),
            ControlCommand::Resume => self.control.set_paused(false),
            ControlCommand::Stop => self.control.request_stop(),
            ControlCommand::AuthReady => {
                let tx = self.auth_tx.lock().unwrap_or_else(|p| p.into_inner());
                // Nobody waiting is fine: the signal is only meaningful during capture.
                let _ = tx.send(());
            }
        }
    }
}

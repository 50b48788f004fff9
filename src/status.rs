//! Device status state machine.
//!
//! [`StatusRegister`] is the single owner of the server's observable health: the raw
//! [`ToolStatus`], the orthogonal `simulated` flag, the last error text and the tool
//! identifier. Command handlers never touch these fields; the dispatcher and the
//! configuration manager go through the register's transition calls.
//!
//! The simulated flag and the raw status are stored separately and only combined at
//! the read boundary ([`StatusRegister::status`], [`StatusRegister::is_ready`],
//! [`StatusRegister::snapshot`]), so a server can never be "simulated and busy" in the
//! stored state.
//!
//! ```text
//!   NOT_CONFIGURED ──Configure──▶ READY | FAILED
//!   READY ──ExecuteCommand──▶ BUSY ──▶ READY
//!   (the simulated flag may be set by Configure at any time)
//! ```
//!
//! All accessors take a short, non-async lock and never wait on I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Identifier reported until a configuration payload supplies one.
pub const UNDEFINED_TOOL_ID: &str = "undefined";

/// Externally observable health of an instrument server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolStatus {
    /// No configuration has been applied yet
    NotConfigured,
    /// Configured and idle
    Ready,
    /// A command is executing on the hardware
    Busy,
    /// The last configuration attempt failed
    Failed,
    /// Commands are answered from duration estimates
    Simulated,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolStatus::NotConfigured => "NOT_CONFIGURED",
            ToolStatus::Ready => "READY",
            ToolStatus::Busy => "BUSY",
            ToolStatus::Failed => "FAILED",
            ToolStatus::Simulated => "SIMULATED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
struct ServerState {
    status: ToolStatus,
    simulated: bool,
    last_error: Option<String>,
    tool_id: String,
    connected: bool,
}

impl ServerState {
    fn effective_status(&self) -> ToolStatus {
        if self.simulated {
            ToolStatus::Simulated
        } else {
            self.status
        }
    }
}

/// Point-in-time copy of the register, as reported by `GetStatus`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Effective status (`Simulated` overrides the raw value)
    pub status: ToolStatus,
    /// Raw status as last set by a transition
    pub raw_status: ToolStatus,
    /// Whether simulated execution is active
    pub simulated: bool,
    /// Time since the register was created (process start)
    pub uptime: Duration,
    /// Most recent failure text, cleared by the next success
    pub error: Option<String>,
    /// Opaque tool identifier
    pub tool_id: String,
    /// Whether a hardware driver is currently connected
    pub connected: bool,
}

/// Synchronized owner of [`ToolStatus`] and last-error text.
#[derive(Debug)]
pub struct StatusRegister {
    state: Mutex<ServerState>,
    started: Instant,
    changes: watch::Sender<ToolStatus>,
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRegister {
    /// Create a register in `NOT_CONFIGURED`, with uptime starting now.
    pub fn new() -> Self {
        let (changes, _) = watch::channel(ToolStatus::NotConfigured);
        Self {
            state: Mutex::new(ServerState {
                status: ToolStatus::NotConfigured,
                simulated: false,
                last_error: None,
                tool_id: UNDEFINED_TOOL_ID.to_string(),
                connected: false,
            }),
            started: Instant::now(),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        // State is plain data; a panic mid-update cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut ServerState) -> R) -> R {
        let mut state = self.lock();
        let before = state.effective_status();
        let result = f(&mut state);
        let after = state.effective_status();
        if before != after {
            tracing::debug!(from = %before, to = %after, "status transition");
        }
        self.changes.send_if_modified(|current| {
            if *current == after {
                false
            } else {
                *current = after;
                true
            }
        });
        result
    }

    /// Set the raw status.
    ///
    /// `Simulated` is not a raw status; passing it turns the simulated flag on instead.
    pub fn set_status(&self, status: ToolStatus) {
        self.update(|state| {
            if status == ToolStatus::Simulated {
                state.simulated = true;
            } else {
                state.status = status;
            }
        });
    }

    /// Record the most recent failure text.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| {
            state.last_error = if message.is_empty() {
                None
            } else {
                Some(message)
            };
        });
    }

    /// Clear the last error (after a success).
    pub fn clear_error(&self) {
        self.update(|state| state.last_error = None);
    }

    /// Toggle simulated execution.
    pub fn set_simulated(&self, simulated: bool) {
        self.update(|state| state.simulated = simulated);
    }

    /// Whether simulated execution is active.
    pub fn is_simulated(&self) -> bool {
        self.lock().simulated
    }

    /// Mark whether a hardware driver is connected.
    pub fn set_connected(&self, connected: bool) {
        self.update(|state| state.connected = connected);
    }

    /// Overwrite the tool identifier. Empty identifiers are ignored.
    pub fn set_tool_id(&self, tool_id: &str) {
        if tool_id.is_empty() {
            return;
        }
        self.update(|state| state.tool_id = tool_id.to_string());
    }

    /// Current tool identifier.
    pub fn tool_id(&self) -> String {
        self.lock().tool_id.clone()
    }

    /// Effective status (`Simulated` when the simulated flag is set).
    pub fn status(&self) -> ToolStatus {
        self.lock().effective_status()
    }

    /// Raw status, ignoring the simulated flag.
    pub fn raw_status(&self) -> ToolStatus {
        self.lock().status
    }

    /// Whether commands may be dispatched.
    ///
    /// Simulated servers are always ready; otherwise only `READY` is.
    pub fn is_ready(&self) -> bool {
        let state = self.lock();
        state.simulated || state.status == ToolStatus::Ready
    }

    /// Consistent copy of every field.
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.lock();
        StatusSnapshot {
            status: state.effective_status(),
            raw_status: state.status,
            simulated: state.simulated,
            uptime: self.started.elapsed(),
            error: state.last_error.clone(),
            tool_id: state.tool_id.clone(),
            connected: state.connected,
        }
    }

    /// Subscribe to effective status changes.
    pub fn subscribe(&self) -> watch::Receiver<ToolStatus> {
        self.changes.subscribe()
    }

    /// Enter the BUSY window for one command.
    ///
    /// The returned guard restores `READY` when dropped unless
    /// [`BusyGuard::release`] chose a different status first.
    pub fn begin_busy(&self) -> BusyGuard<'_> {
        self.set_status(ToolStatus::Busy);
        BusyGuard {
            register: self,
            released: false,
        }
    }
}

/// Holds a server in `BUSY` for the lifetime of one command.
#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the BUSY window"]
pub struct BusyGuard<'a> {
    register: &'a StatusRegister,
    released: bool,
}

impl BusyGuard<'_> {
    /// Leave the BUSY window with an explicit status.
    pub fn release(mut self, next: ToolStatus) {
        self.register.set_status(next);
        self.released = true;
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.register.set_status(ToolStatus::Ready);
        }
    }
}

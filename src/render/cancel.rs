//! Signal-driven cancellation of a render.
//!
//! The controller owns a [`CancellationToken`] for the duration of one
//! render. Interrupt and termination signals are forwarded into a bounded
//! channel; the first one received cancels the token and prints a notice.
//! The render itself is never aborted, it observes the token and stops on
//! its own. OS signal handlers are only installed while [`run`] is in
//! progress, so a signal sent before or after the render keeps its default
//! behaviour.
//!
//! [`run`]: CancellationController::run

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::warning;

/// Capacity of the signal channel.
pub const SIGNAL_BUFFER: usize = 2;

/// Signals that cancel a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// Waiting for the render or a signal.
    Armed = 0,
    /// A signal arrived and the token is cancelled.
    Cancelling = 1,
    /// The render returned after a cancellation.
    Cancelled = 2,
    /// The render returned without a cancellation.
    Completed = 3,
}

impl ControllerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Cancelling,
            2 => Self::Cancelled,
            3 => Self::Completed,
            _ => Self::Armed,
        }
    }
}

/// Notice printed when a render is cancelled.
#[must_use]
pub fn cancellation_notice(release: &str) -> String {
    format!("Release {release} has been cancelled.")
}

/// Handle for delivering signals to a controller without the OS.
#[derive(Debug, Clone)]
pub struct SignalSender {
    sender: mpsc::Sender<Signal>,
}

impl SignalSender {
    /// Delivers a signal. Returns false when the channel is full or the
    /// controller is no longer listening.
    pub fn send(&self, signal: Signal) -> bool {
        self.sender.try_send(signal).is_ok()
    }
}

/// Cancels a render when a signal arrives.
pub struct CancellationController {
    release: String,
    token: CancellationToken,
    sender: mpsc::Sender<Signal>,
    receiver: Option<mpsc::Receiver<Signal>>,
    state: Arc<AtomicU8>,
    os_signals: bool,
    os_listener: Option<JoinHandle<()>>,
}

impl CancellationController {
    /// Creates a controller for the named release.
    #[must_use]
    pub fn new(release: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::channel(SIGNAL_BUFFER);
        Self {
            release: release.into(),
            token: CancellationToken::new(),
            sender,
            receiver: Some(receiver),
            state: Arc::new(AtomicU8::new(ControllerState::Armed as u8)),
            os_signals: false,
            os_listener: None,
        }
    }

    /// Forwards SIGINT and SIGTERM from the OS into the controller.
    ///
    /// The handlers are installed when [`run`](Self::run) starts the
    /// operation and removed when it returns.
    #[must_use]
    pub fn with_os_signals(mut self) -> Self {
        self.os_signals = true;
        self
    }

    /// Returns a handle for injecting signals.
    #[must_use]
    pub fn signal_sender(&self) -> SignalSender {
        SignalSender {
            sender: self.sender.clone(),
        }
    }

    /// Returns a clone of the render token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        ControllerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Runs `operation` with the token, cancelling it on the first signal.
    ///
    /// The listener tasks are stopped once the operation returns.
    pub async fn run<F, Fut, T>(&mut self, operation: F) -> T
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let listener = self.receiver.take().map(|mut receiver| {
            let token = self.token.clone();
            let state = Arc::clone(&self.state);
            let release = self.release.clone();
            tokio::spawn(async move {
                if let Some(signal) = receiver.recv().await {
                    debug!("Received {:?} while rendering {}", signal, release);
                    state.store(ControllerState::Cancelling as u8, Ordering::SeqCst);
                    warning(&cancellation_notice(&release));
                    token.cancel();
                }
                // Later signals are drained and ignored.
                while receiver.recv().await.is_some() {}
            })
        });

        if self.os_signals {
            match forward_os_signals(self.sender.clone()) {
                Ok(os_listener) => self.os_listener = Some(os_listener),
                Err(e) => warn!("Failed to listen for signals: {}", e),
            }
        }

        let output = operation(self.token.clone()).await;

        if let Some(listener) = listener {
            listener.abort();
        }
        if let Some(os_listener) = self.os_listener.take() {
            os_listener.abort();
        }

        let final_state = if self.token.is_cancelled() {
            ControllerState::Cancelled
        } else {
            ControllerState::Completed
        };
        self.state.store(final_state as u8, Ordering::SeqCst);
        debug!("Render of {} finished: {:?}", self.release, final_state);

        output
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        if let Some(os_listener) = self.os_listener.take() {
            os_listener.abort();
        }
    }
}

/// Installs the OS handlers and spawns the task forwarding them.
#[cfg(unix)]
fn forward_os_signals(sender: mpsc::Sender<Signal>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::Interrupt,
                Some(()) = terminate.recv() => Signal::Terminate,
                else => return,
            };
            if sender.try_send(received).is_err() {
                debug!("Dropped {:?}: signal buffer full", received);
            }
        }
    }))
}

/// Spawns the task forwarding Ctrl-C.
#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn forward_os_signals(sender: mpsc::Sender<Signal>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if sender.try_send(Signal::Interrupt).is_err() {
                debug!("Dropped interrupt: signal buffer full");
            }
        }
    }))
}

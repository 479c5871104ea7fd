//! Shutdown signalling: OS termination requests forwarded into an explicit
//! cancellation context that the writer loop waits on.
//!
//! SIGINT, SIGHUP and SIGTERM are intercepted. The first one to arrive is
//! recorded and never cleared; later arrivals are ignored. Every other signal
//! keeps its default disposition.
use nix::sys::signal::Signal;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Signals that request a graceful shutdown.
pub const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGHUP, Signal::SIGTERM];

/// Write side of the shutdown context.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<Option<Signal>>>,
}

/// Read side of the shutdown context, owned by the writer loop.
#[derive(Debug)]
pub struct Shutdown {
    rx: watch::Receiver<Option<Signal>>,
}

/// Create a linked trigger/receiver pair with no shutdown recorded.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(None);
    (ShutdownTrigger { tx: Arc::new(tx) }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Record `signal` as the shutdown cause.
    ///
    /// Returns `false` if a signal was already recorded, in which case the
    /// stored cause is left untouched.
    pub fn request(&self, signal: Signal) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(signal);
            true
        })
    }
}

impl Shutdown {
    /// The recorded shutdown cause, if any.
    pub fn requested(&self) -> Option<Signal> {
        *self.rx.borrow()
    }

    /// Wait until a shutdown cause is recorded.
    ///
    /// Resolves immediately if one already is. Never resolves if every
    /// trigger is dropped without recording anything.
    pub async fn wait(&mut self) -> Signal {
        loop {
            if let Some(signal) = *self.rx.borrow_and_update() {
                return signal;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Register observers for the termination signals and spawn the task that
/// forwards the first arrival to `trigger`.
///
/// Registration happens before this returns, so any termination signal
/// delivered afterwards is observed rather than killing the process.
pub fn install(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tracing::debug!(
        signals = ?TERMINATION_SIGNALS.map(Signal::as_str),
        "termination signal observers installed"
    );

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            Some(()) = interrupt.recv() => Signal::SIGINT,
            Some(()) = hangup.recv() => Signal::SIGHUP,
            Some(()) = terminate.recv() => Signal::SIGTERM,
            else => return,
        };
        tracing::info!(signal = received.as_str(), "termination signal received");
        if !trigger.request(received) {
            tracing::debug!(signal = received.as_str(), "shutdown already requested");
        }
    }))
}

/// The single diagnostic line printed when a signal ends the process.
pub fn shutdown_message(signal: Signal) -> String {
    format!(
        "received {} (signal {}), shutting down",
        signal.as_str(),
        signal as i32
    )
}

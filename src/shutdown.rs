//! Cooperative cancellation for the control loop.
//!
//! A [`watch`] channel carries a single "stop requested" flag. The loop
//! checks it between cycles and while waiting out a stall, never while a
//! dispatch is in flight.

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Sending half; dropping it does not cancel
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!("shutdown requested");
        let _ = self.tx.send(true);
    }
}

pub fn channel() -> (ShutdownHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, rx)
}

/// Exit status after a forced stop, as a shell reports SIGINT
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, PartialEq, Eq)]
enum Relay {
    /// A second signal arrived while the loop was still winding down
    Forced,
    /// The signal source went away
    Closed,
}

/// First signal requests a cooperative stop, the second one forces exit
async fn relay(handle: ShutdownHandle, mut signals: mpsc::UnboundedReceiver<&'static str>) -> Relay {
    let Some(name) = signals.recv().await else {
        return Relay::Closed;
    };
    info!(signal = name, "stopping after current cycle; signal again to exit now");
    handle.shutdown();

    match signals.recv().await {
        Some(name) => {
            warn!(signal = name, "exiting without waiting for in-flight dispatches");
            Relay::Forced
        }
        None => Relay::Closed,
    }
}

async fn forward_signals(tx: mpsc::UnboundedSender<&'static str>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(err), _) | (_, Err(err)) => {
                    warn!(error = %err, "failed to install signal handlers");
                    return;
                }
            };

        loop {
            let name = tokio::select! {
                Some(()) = sigterm.recv() => "SIGTERM",
                Some(()) = sigint.recv() => "SIGINT",
                else => return,
            };
            if tx.send(name).is_err() {
                return;
            }
        }
    }

    #[cfg(not(unix))]
    loop {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            return;
        }
        if tx.send("Ctrl+C").is_err() {
            return;
        }
    }
}

/// Install SIGINT/SIGTERM handlers that request shutdown
///
/// A second signal exits the process at once; tasks it leaves
/// `in_progress` are requeued by the next run. Must be called inside a
/// tokio runtime.
pub fn install_signal_handlers() -> watch::Receiver<bool> {
    let (handle, rx) = channel();
    let (tx, signals) = mpsc::unbounded_channel();

    tokio::spawn(forward_signals(tx));
    tokio::spawn(async move {
        if relay(handle, signals).await == Relay::Forced {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    rx
}

pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_flips_flag() {
        let (handle, rx) = channel();
        assert!(!is_cancelled(&rx));
        handle.shutdown();
        assert!(is_cancelled(&rx));
    }

    #[tokio::test]
    async fn second_signal_forces_exit() {
        let (handle, rx) = channel();
        let (tx, signals) = mpsc::unbounded_channel();
        tx.send("SIGINT").unwrap();
        tx.send("SIGINT").unwrap();

        assert_eq!(relay(handle, signals).await, Relay::Forced);
        assert!(is_cancelled(&rx));
    }

    #[tokio::test]
    async fn single_signal_only_requests_stop() {
        let (handle, rx) = channel();
        let (tx, signals) = mpsc::unbounded_channel();
        tx.send("SIGTERM").unwrap();
        drop(tx);

        assert_eq!(relay(handle, signals).await, Relay::Closed);
        assert!(is_cancelled(&rx));
    }
}

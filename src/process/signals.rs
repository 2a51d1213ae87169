//! Termination requests delivered to lightrun
//!
//! Handlers are installed once per invocation, before any temporary state
//! exists, so a signal never takes the default action and skips cleanup.
//! Requests are queued until someone asks for them.

use crate::error::{LightrunError, LightrunResult};
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Ctrl-C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Queue of termination requests for the current invocation
pub struct Signals {
    rx: mpsc::UnboundedReceiver<Shutdown>,
    listener: Option<JoinHandle<()>>,
}

impl Signals {
    /// Install handlers for Ctrl-C, and SIGTERM on unix
    pub fn install() -> LightrunResult<Self> {
        let (tx, mut signals) = Self::queue();
        signals.listener = Some(listen(tx)?);
        debug!("Signal handlers installed");
        Ok(signals)
    }

    /// Signals fed by hand instead of by the OS
    #[cfg(test)]
    pub(crate) fn channel() -> (mpsc::UnboundedSender<Shutdown>, Self) {
        Self::queue()
    }

    fn queue() -> (mpsc::UnboundedSender<Shutdown>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, listener: None })
    }

    /// Next termination request; never resolves once the source is gone
    pub async fn recv(&mut self) -> Shutdown {
        match self.rx.recv().await {
            Some(signal) => signal,
            None => std::future::pending().await,
        }
    }

    /// Run `work`, abandoning it with [`LightrunError::Cancelled`] on a signal
    ///
    /// A request already queued wins over work that is ready at the same time.
    /// Dropping `work` releases whatever it holds.
    pub async fn cancellable<T, F>(&mut self, work: F) -> LightrunResult<T>
    where
        F: Future<Output = LightrunResult<T>>,
    {
        tokio::select! {
            biased;
            signal = self.recv() => {
                warn!("{} received, aborting", signal);
                Err(LightrunError::Cancelled)
            }
            result = work => result,
        }
    }
}

impl Drop for Signals {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(unix)]
fn listen(tx: mpsc::UnboundedSender<Shutdown>) -> LightrunResult<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())
        .map_err(|e| LightrunError::io("installing SIGINT handler", e))?;
    let mut terminate = signal(SignalKind::terminate())
        .map_err(|e| LightrunError::io("installing SIGTERM handler", e))?;

    Ok(tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                Some(()) = interrupt.recv() => Shutdown::Interrupt,
                Some(()) = terminate.recv() => Shutdown::Terminate,
                else => break,
            };
            if tx.send(signal).is_err() {
                break;
            }
        }
    }))
}

#[cfg(windows)]
fn listen(tx: mpsc::UnboundedSender<Shutdown>) -> LightrunResult<JoinHandle<()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()
        .map_err(|e| LightrunError::io("installing Ctrl-C handler", e))?;

    Ok(tokio::spawn(async move {
        while ctrl_c.recv().await.is_some() {
            if tx.send(Shutdown::Interrupt).is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(any(unix, windows)))]
fn listen(_tx: mpsc::UnboundedSender<Shutdown>) -> LightrunResult<JoinHandle<()>> {
    Ok(tokio::spawn(async {}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn queued_signal_cancels_ready_work() {
        let (tx, mut signals) = Signals::channel();
        tx.send(Shutdown::Terminate).unwrap();

        let result = signals.cancellable(async { Ok(1) }).await;
        assert!(matches!(result, Err(LightrunError::Cancelled)));
    }

    #[tokio::test]
    async fn work_finishes_without_signal() {
        let (_tx, mut signals) = Signals::channel();
        let value = signals.cancellable(async { Ok(5) }).await.unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn signal_drops_pending_work() {
        let (tx, mut signals) = Signals::channel();
        let guard = tempfile::TempDir::new().unwrap();
        let path = guard.path().to_path_buf();

        let work = async move {
            let _held = guard;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        };
        let send = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(Shutdown::Interrupt).unwrap();
        };

        let (result, ()) = tokio::join!(signals.cancellable(work), send);
        assert!(matches!(result, Err(LightrunError::Cancelled)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn closed_source_never_cancels() {
        let (tx, mut signals) = Signals::channel();
        drop(tx);
        let value = signals.cancellable(async { Ok("done") }).await.unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn display_names_the_signal() {
        assert_eq!(Shutdown::Interrupt.to_string(), "SIGINT");
        assert_eq!(Shutdown::Terminate.to_string(), "SIGTERM");
    }
}

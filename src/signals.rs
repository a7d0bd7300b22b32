//! OS signal handling.

/// Listens for process termination signals.
///
/// On Unix both SIGINT (Ctrl-C) and SIGTERM (what the supervisor sends on
/// add-on stop) are handled; elsewhere only Ctrl-C.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Install the signal handlers. Must run inside the runtime; failure
    /// to install is a startup error.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the first termination signal.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.sigint.recv() => {}
            _ = self.sigterm.recv() => {}
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(self) {
        let _ = tokio::signal::ctrl_c().await;
    }
}

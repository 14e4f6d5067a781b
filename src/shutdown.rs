//! Signal forwarding and SIGTERM → SIGKILL escalation for the server process.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{info, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::signal::unix::{signal as unix_signal, SignalKind};
#[cfg(unix)]
use tokio::time::timeout;

/// The signals the launcher relays to the server.
/// Install before spawning so a signal can never leave the server orphaned.
#[cfg(unix)]
pub struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(unix)]
impl Signals {
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: unix_signal(SignalKind::interrupt())?,
            terminate: unix_signal(SignalKind::terminate())?,
            hangup: unix_signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.interrupt.recv() => Signal::SIGINT,
            _ = self.terminate.recv() => Signal::SIGTERM,
            _ = self.hangup.recv() => Signal::SIGHUP,
        }
    }
}

/// Wait for the server to exit, relaying termination signals.
///
/// The first signal is forwarded to the server's process group. If the server
/// is still running after `grace`, or another signal arrives, it is killed.
/// The child is always reaped before returning.
#[cfg(unix)]
pub async fn wait_with_signals(
    child: &mut Child,
    signals: &mut Signals,
    grace: Duration,
) -> io::Result<ExitStatus> {
    let received = tokio::select! {
        status = child.wait() => return status,
        sig = signals.recv() => sig,
    };
    info!(signal = received.as_str(), "forwarding signal to server");
    forward_signal(child, received)?;

    let second = tokio::select! {
        status = wait_or_kill(child, grace) => return status,
        sig = signals.recv() => sig,
    };
    warn!(signal = second.as_str(), "second signal received, killing server");
    kill_group(child).await
}

#[cfg(not(unix))]
pub async fn wait_with_signals(
    child: &mut Child,
    _signals: &mut Signals,
    _grace: Duration,
) -> io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping server");
            child.kill().await?;
            child.wait().await
        }
    }
}

/// Send `sig` to the server's process group.
/// A server that has already exited is not an error.
#[cfg(unix)]
pub fn forward_signal(child: &Child, sig: Signal) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    match signal::killpg(Pid::from_raw(pid as i32), sig) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::other(e)),
    }
}

/// Give the server `grace` to exit on its own, then kill it
#[cfg(unix)]
pub async fn wait_or_kill(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    match timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("server did not stop within {:?}, killing", grace);
            kill_group(child).await
        }
    }
}

/// SIGKILL the server's whole process group and reap the server.
/// Anything it started must die too, or it keeps the output pipe open.
#[cfg(unix)]
async fn kill_group(child: &mut Child) -> io::Result<ExitStatus> {
    forward_signal(child, Signal::SIGKILL)?;
    child.wait().await
}

/// Serialises tests that install signal handlers, since a raised signal
/// reaches every handler in the test process.
#[cfg(all(test, unix))]
pub(crate) fn signal_test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

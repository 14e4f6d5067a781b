use std::fs::File;
use std::io::{self, Write};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::LaunchError;
use crate::launch::LaunchPlan;
use crate::shutdown::{wait_with_signals, Signals};
use crate::tee::{Tee, TeeSummary};

/// How the server process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled(i32),
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signo) = status.signal() {
                return ExitOutcome::Signaled(signo);
            }
        }
        ExitOutcome::Exited(1)
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }

    /// Exit code for the launcher itself, following shell conventions
    pub fn exit_code(&self) -> u8 {
        match *self {
            ExitOutcome::Exited(code) => (code & 0xff) as u8,
            ExitOutcome::Signaled(signo) => 128u8.saturating_add((signo & 0x7f) as u8),
        }
    }
}

/// Run the server described by `plan` in the foreground.
///
/// stdout and stderr share one pipe, so the log sees the server's writes in
/// the order they were made. The pipe is drained by a single blocking reader
/// that copies every chunk to `console` and `log_file`.
///
/// The server runs outside the terminal's foreground group, so its stdin is
/// `/dev/null`; reading the terminal from there would stop it with SIGTTIN.
pub async fn run<C>(plan: &LaunchPlan, log_file: File, console: C) -> Result<ExitOutcome, LaunchError>
where
    C: Write + Send + 'static,
{
    let (reader, writer) = io::pipe().map_err(LaunchError::Pipe)?;
    let mut signals = Signals::install().map_err(LaunchError::Signals)?;
    let program = plan.program.display().to_string();

    let mut child = {
        let stderr = writer.try_clone().map_err(LaunchError::Pipe)?;
        let mut cmd = Command::new(&plan.program);
        cmd.args(&plan.args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr)
            .kill_on_drop(true);
        // Terminal signals reach the launcher only; it relays them exactly once.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?
        // `cmd` drops here, closing the parent's copies of the write end
    };

    info!(
        program = %program,
        pid = ?child.id(),
        log_path = %plan.log_path.display(),
        "started server"
    );

    let copier = tokio::task::spawn_blocking(move || {
        let mut tee = Tee::new(console, log_file);
        let copied = tee.copy_from(reader);
        (copied, tee.finish())
    });

    let status = wait_with_signals(&mut child, &mut signals, plan.shutdown_grace)
        .await
        .map_err(|source| LaunchError::Wait {
            program: program.clone(),
            source,
        })?;
    let outcome = ExitOutcome::from_status(status);

    let (copied, summary) = copier
        .await
        .map_err(|e| LaunchError::Stream(io::Error::other(e)))?;
    copied.map_err(LaunchError::Stream)?;

    finish(plan, outcome, summary)
}

fn finish(plan: &LaunchPlan, outcome: ExitOutcome, summary: TeeSummary) -> Result<ExitOutcome, LaunchError> {
    debug!(bytes = summary.bytes, "server output drained");

    match outcome {
        ExitOutcome::Exited(code) => info!(code, "server exited"),
        ExitOutcome::Signaled(signo) => info!(signal = signo, "server terminated by signal"),
    }

    if let Some(source) = summary.file_error {
        if outcome.success() {
            return Err(LaunchError::LogWrite {
                path: plan.log_path.clone(),
                source,
            });
        }
        error!(
            log_path = %plan.log_path.display(),
            error = %source,
            "log file is incomplete"
        );
    }
    Ok(outcome)
}

//! Bounded execution of external probe programs.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use super::ProbeError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What a finished child left behind.
#[derive(Debug)]
pub(crate) struct ChildOutput {
    pub status: ExitStatus,
    pub stdout: String,
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Runs `cmd` to completion or kills it once `timeout` has elapsed.
///
/// Stdout is drained on a helper thread so a chatty child cannot stall on a
/// full pipe. Stderr is discarded. The deadline also covers draining stdout:
/// a grandchild that keeps the pipe open past it turns the run into a timeout.
pub(crate) fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
) -> Result<ChildOutput, ProbeError> {
    let program = program_name(cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ProbeError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut out) = stdout {
            let _ = out.read_to_string(&mut buf);
        }
        let _ = tx.send(buf);
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Timeout {
                    program,
                    after: timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProbeError::Spawn { program, source });
            }
        }
    };

    // The reader thread is left detached if the pipe outlives the deadline.
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(stdout) => Ok(ChildOutput { status, stdout }),
        Err(_) => Err(ProbeError::Timeout {
            program,
            after: timeout,
        }),
    }
}

//! Component L: the "system" probe backend. Runs `argument` through a shell, the
//! same way the original collector's `system()` call did, and captures stdout.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use collector_core::error::CollectorError;
use collector_core::probe::{ProbeDescriptor, ProbeOutcome};

/// Runs `descriptor.argument` with a timeout. A timed-out or non-zero-exit command
/// is treated as an empty raw value — per the evaluator's rule, that produces no
/// taint, it simply emits nothing for this tick.
pub fn run(descriptor: &ProbeDescriptor, timeout: Duration) -> Result<ProbeOutcome, CollectorError> {
    let argument = descriptor.argument.clone();

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&argument)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| CollectorError::Transport {
            argument: argument.clone(),
            source: anyhow::anyhow!("spawning system probe: {err}"),
        })?;

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = rx.recv_timeout(Duration::from_millis(200)).unwrap_or_default();
                if status.success() {
                    let raw = String::from_utf8_lossy(&stdout).trim().to_string();
                    return Ok(ProbeOutcome::from_raw(raw));
                }
                return Ok(ProbeOutcome::from_raw(""));
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(ProbeOutcome::from_raw(""));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                return Err(CollectorError::Transport {
                    argument,
                    source: anyhow::anyhow!("system probe I/O error: {err}"),
                })
            }
        }
    }
}

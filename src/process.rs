use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `cmd` to completion, capturing both output streams. The child is
/// killed once `timeout` elapses.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Captured, RunError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Drain pipes on their own threads so a chatty child can't block on a full pipe.
    let (tx, rx) = mpsc::channel();
    drain(Stream::Stdout, child.stdout.take(), tx.clone());
    drain(Stream::Stderr, child.stderr.take(), tx);

    let deadline = Instant::now() + timeout;
    let timed_out = |program: String| {
        debug!("gave up on {program} after {}s", timeout.as_secs());
        RunError::Timeout {
            program,
            secs: timeout.as_secs(),
        }
    };

    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(timed_out(program));
        }
        Err(source) => {
            let _ = child.kill();
            return Err(RunError::Wait { program, source });
        }
    };

    // A background grandchild can keep the pipes open after the child exits.
    match collect_output(&rx, deadline) {
        Some((stdout, stderr)) => Ok(Captured {
            status,
            stdout,
            stderr,
        }),
        None => Err(timed_out(program)),
    }
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Both streams' output, or `None` if they are still open at `deadline`.
fn collect_output(rx: &Receiver<(Stream, String)>, deadline: Instant) -> Option<(String, String)> {
    let (mut stdout, mut stderr) = (String::new(), String::new());
    for _ in 0..2 {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok((Stream::Stdout, text)) => stdout = text,
            Ok((Stream::Stderr, text)) => stderr = text,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Some((stdout, stderr))
}

fn drain<R: Read + Send + 'static>(
    stream: Stream,
    pipe: Option<R>,
    tx: mpsc::Sender<(Stream, String)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
}

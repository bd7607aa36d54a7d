//! Spawning and line-streaming one external process
//!
//! A `ProcessHandle` owns exactly one child process. Its stdout and stderr
//! are pumped line by line into a single channel by reader tasks, so partial
//! lines are assembled across read boundaries and a trailing unterminated
//! line is still delivered at EOF. `next_event` yields the lines as they
//! arrive and then exactly one exit event; if the deadline passes first the
//! handle kills the process itself and reports a timeout. `terminate`
//! consumes the handle, which is what guarantees no further events can be
//! observed after a run is torn down.

use crate::catalog::CommandSpec;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};


/// Which stream a line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// One complete line of process output, line ending stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub source: StreamSource,
    pub text: String,
}

/// Terminal outcome of a run's process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited on its own with status zero
    Success,
    /// Exited on its own with a non-zero status
    Failed { code: i32 },
    /// Killed by a signal (including our own termination)
    Signaled { signal: i32 },
    /// Deadline elapsed; the handle killed the process itself
    TimedOut,
}

/// Event stream of a running process: lines, then exactly one exit
#[derive(Debug)]
pub enum ProcessEvent {
    Line(OutputLine),
    Exited(ExitOutcome),
}

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("failed to spawn {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Handle to one spawned process and its output streams
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    lines: mpsc::Receiver<OutputLine>,
    readers: Vec<JoinHandle<()>>,
    deadline: Instant,
    streams_closed: bool,
}

impl ProcessHandle {
    /// Spawn the command with piped output and its own process group.
    ///
    /// The process group is what lets termination take down any children the
    /// tool forks (dig and nslookup both do).
    pub fn spawn(spec: &CommandSpec) -> Result<Self, SpawnError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SpawnError::NotFound(spec.program.clone())
            } else {
                SpawnError::Io {
                    program: spec.program.clone(),
                    source,
                }
            }
        })?;

        let stdout = child.stdout.take().ok_or_else(|| SpawnError::Io {
            program: spec.program.clone(),
            source: std::io::Error::other("stdout was not captured"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| SpawnError::Io {
            program: spec.program.clone(),
            source: std::io::Error::other("stderr was not captured"),
        })?;

        let pid = child.id();
        debug!(program = %spec.program, ?pid, timeout = ?spec.timeout, "spawned process");

        let (tx, rx) = mpsc::channel(64);
        let readers = vec![
            tokio::spawn(pump_lines(stdout, StreamSource::Stdout, tx.clone())),
            tokio::spawn(pump_lines(stderr, StreamSource::Stderr, tx)),
        ];

        Ok(Self {
            child,
            pid,
            lines: rx,
            readers,
            deadline: Instant::now() + spec.timeout,
            streams_closed: false,
        })
    }

    /// OS process id, if the child has not already been reaped
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Next event from the process.
    ///
    /// Yields `Line` events while output is flowing, then exactly one
    /// `Exited` event once both streams have closed and the child has been
    /// reaped. Callers must stop calling this after the `Exited` event;
    /// the session drops the handle at that point.
    pub async fn next_event(&mut self) -> ProcessEvent {
        loop {
            if self.streams_closed {
                tokio::select! {
                    status = self.child.wait() => {
                        return ProcessEvent::Exited(outcome_of(status));
                    }
                    _ = tokio::time::sleep_until(self.deadline) => {
                        return ProcessEvent::Exited(self.kill_for_timeout().await);
                    }
                }
            } else {
                tokio::select! {
                    line = self.lines.recv() => match line {
                        Some(line) => {
                            trace!(source = ?line.source, "line: {}", line.text);
                            return ProcessEvent::Line(line);
                        }
                        // both reader tasks finished; the child is at EOF
                        None => self.streams_closed = true,
                    },
                    _ = tokio::time::sleep_until(self.deadline) => {
                        return ProcessEvent::Exited(self.kill_for_timeout().await);
                    }
                }
            }
        }
    }

    /// Kill the process immediately and release everything.
    ///
    /// Consuming `self` is what makes the no-events-after-termination
    /// guarantee structural: buffered output has nowhere to go once the
    /// receiver is dropped.
    pub async fn terminate(mut self) {
        debug!(pid = ?self.pid, "terminating process");
        self.kill_group();
        for reader in &self.readers {
            reader.abort();
        }
        // tokio's kill also reaps the child
        let _ = self.child.kill().await;
    }

    async fn kill_for_timeout(&mut self) -> ExitOutcome {
        debug!(pid = ?self.pid, "deadline elapsed, killing process");
        self.kill_group();
        let _ = self.child.kill().await;
        ExitOutcome::TimedOut
    }

    /// SIGKILL the whole process group so forked children die with the tool
    fn kill_group(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pgid = Pid::from_raw(-(pid as i32));
            let _ = signal::kill(pgid, Signal::SIGKILL);
        }
    }
}

fn outcome_of(status: std::io::Result<std::process::ExitStatus>) -> ExitOutcome {
    match status {
        Ok(status) if status.success() => ExitOutcome::Success,
        Ok(status) => match status.code() {
            Some(code) => ExitOutcome::Failed { code },
            None => {
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    ExitOutcome::Signaled {
                        signal: status.signal().unwrap_or(0),
                    }
                }
                #[cfg(not(unix))]
                {
                    ExitOutcome::Failed { code: -1 }
                }
            }
        },
        Err(_) => ExitOutcome::Failed { code: -1 },
    }
}

/// Read one stream line by line into the shared channel.
///
/// `read_line` assembles partial lines across read boundaries and returns a
/// trailing unterminated line at EOF, so nothing the process wrote is lost.
async fn pump_lines<R>(stream: R, source: StreamSource, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buffer = String::new();
    loop {
        buffer.clear();
        match reader.read_line(&mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let text = buffer.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(OutputLine { source, text }).await.is_err() {
                    break;
                }
            }
            Err(error) => {
                debug!(?source, "stream read error: {error}");
                break;
            }
        }
    }
}

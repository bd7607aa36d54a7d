//! Per-connection command execution session
//!
//! One `Session` exists per WebSocket connection. It is an actor: a single
//! task consuming client requests from a channel and driving at most one
//! running process at a time. Starting a tool silently pre-empts whatever is
//! already running; stop and disconnection kill it immediately. Every way a
//! run can end funnels into the same return-to-idle path so the client's
//! controls always get their reset signal.

use crate::catalog::{self, ClientRequest, RunPlan, StderrPolicy, ToolKind};
use crate::classify::{self, Color, LineAnnotation};
use crate::process::{ExitOutcome, OutputLine, ProcessEvent, ProcessHandle, StreamSource};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;


/// Footer sent when the user stops a run by hand
const STOPPED_BY_USER: &str = "^C\nOperation stopped by user.\n";

/// Outbound event delivered to the client, tagged on `event`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once when the connection is established
    ClientInfo { ip: String, location: String },
    /// Preamble describing the invocation, sent before any output
    Header { text: String, tool: ToolKind },
    /// One classified output line
    Line {
        text: String,
        tool: ToolKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
    },
    /// Free-text footer after a run ends, however it ended
    Completion { text: String },
    /// Explicit failure text (bad parameters, unrunnable command)
    Error { message: String },
    /// Tells the client to return its controls to the idle state
    Reset,
}

impl From<LineAnnotation> for ServerEvent {
    fn from(annotation: LineAnnotation) -> Self {
        ServerEvent::Line {
            text: annotation.text,
            tool: annotation.tool,
            color: annotation.color,
            value: annotation.value,
        }
    }
}

/// One execution of a diagnostic tool, from start request to terminal state
struct Run {
    tool: ToolKind,
    footer: &'static str,
    stderr: StderrPolicy,
    process: ProcessHandle,
    started_at: Instant,
}

/// What the actor loop woke up for
enum Input {
    Request(Option<ClientRequest>),
    Process(ProcessEvent),
}

/// Per-connection session actor
pub struct Session {
    id: Uuid,
    requests: mpsc::Receiver<ClientRequest>,
    events: mpsc::Sender<ServerEvent>,
}

impl Session {
    pub fn new(
        id: Uuid,
        requests: mpsc::Receiver<ClientRequest>,
        events: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            id,
            requests,
            events,
        }
    }

    /// Drive the session until the request channel closes.
    ///
    /// Handlers run to completion one at a time, so no two events for the
    /// same session can interleave and ownership transfer on pre-emption is
    /// atomic with respect to this loop.
    pub async fn run(mut self) {
        let mut active: Option<Run> = None;

        loop {
            let input = match active.as_mut() {
                Some(run) => {
                    tokio::select! {
                        request = self.requests.recv() => Input::Request(request),
                        event = run.process.next_event() => Input::Process(event),
                    }
                }
                None => Input::Request(self.requests.recv().await),
            };

            match input {
                Input::Request(Some(ClientRequest::Stop)) => self.handle_stop(&mut active).await,
                Input::Request(Some(request)) => self.handle_start(request, &mut active).await,
                Input::Request(None) => {
                    self.teardown(&mut active).await;
                    return;
                }
                Input::Process(event) => self.handle_process_event(event, &mut active).await,
            }
        }
    }

    /// Start a tool, pre-empting any run already in flight.
    ///
    /// Pre-emption is silent: the displaced run gets no completion or reset
    /// of its own, the new run's header is simply the next thing the client
    /// sees.
    async fn handle_start(&mut self, request: ClientRequest, active: &mut Option<Run>) {
        if let Some(prior) = active.take() {
            debug!(session = %self.id, tool = %prior.tool, "pre-empting active run");
            prior.process.terminate().await;
        }

        let plan = match catalog::plan(&request) {
            Ok(plan) => plan,
            Err(error) => {
                warn!(session = %self.id, "rejected start request: {error}");
                self.emit(ServerEvent::Error {
                    message: error.to_string(),
                })
                .await;
                self.emit(ServerEvent::Reset).await;
                return;
            }
        };

        self.launch(plan, active).await;
    }

    /// Spawn a planned command and install it as the active run
    async fn launch(&mut self, plan: RunPlan, active: &mut Option<Run>) {
        info!(
            session = %self.id,
            tool = %plan.tool,
            "starting {} {}",
            plan.command.program,
            plan.command.args.join(" ")
        );

        match ProcessHandle::spawn(&plan.command) {
            Ok(process) => {
                self.emit(ServerEvent::Header {
                    text: plan.header,
                    tool: plan.tool,
                })
                .await;
                *active = Some(Run {
                    tool: plan.tool,
                    footer: plan.footer,
                    stderr: plan.stderr,
                    process,
                    started_at: Instant::now(),
                });
            }
            Err(error) => {
                warn!(session = %self.id, tool = %plan.tool, "spawn failed: {error}");
                self.emit(ServerEvent::Error {
                    message: format!("failed to start {}: {error}", plan.tool),
                })
                .await;
                self.emit(ServerEvent::Reset).await;
            }
        }
    }

    /// Connection went away: take any running process with us, emit nothing.
    /// Idempotent, and a no-op when the session is already idle.
    async fn teardown(&mut self, active: &mut Option<Run>) {
        if let Some(run) = active.take() {
            debug!(session = %self.id, tool = %run.tool, "teardown with active run");
            run.process.terminate().await;
        }
        debug!(session = %self.id, "session closed");
    }

    /// Stop the active run. With nothing running this is a no-op, not an
    /// error, and emits nothing.
    async fn handle_stop(&mut self, active: &mut Option<Run>) {
        let Some(run) = active.take() else {
            debug!(session = %self.id, "stop with no active run");
            return;
        };

        info!(session = %self.id, tool = %run.tool, "stopped by user");
        run.process.terminate().await;
        self.emit(ServerEvent::Completion {
            text: STOPPED_BY_USER.to_string(),
        })
        .await;
        self.emit(ServerEvent::Reset).await;
    }

    async fn handle_process_event(&mut self, event: ProcessEvent, active: &mut Option<Run>) {
        match event {
            ProcessEvent::Line(line) => {
                if let Some(run) = active.as_ref() {
                    if let Some(annotation) = annotate(run, line) {
                        self.emit(annotation.into()).await;
                    }
                }
            }
            ProcessEvent::Exited(outcome) => {
                if let Some(run) = active.take() {
                    self.finish(run, outcome).await;
                }
            }
        }
    }

    /// Natural exit and timeout share the same client-visible footer; the
    /// distinction only reaches the logs.
    async fn finish(&mut self, run: Run, outcome: ExitOutcome) {
        let elapsed = run.started_at.elapsed();
        match outcome {
            ExitOutcome::TimedOut => {
                warn!(session = %self.id, tool = %run.tool, ?elapsed, "run timed out")
            }
            outcome => {
                info!(session = %self.id, tool = %run.tool, ?elapsed, ?outcome, "run finished")
            }
        }

        self.emit(ServerEvent::Completion {
            text: run.footer.to_string(),
        })
        .await;
        self.emit(ServerEvent::Reset).await;
    }

    /// Send one event to the client. A failed send means the client is
    /// gone; the request channel is about to close, so just log it.
    async fn emit(&self, event: ServerEvent) {
        if self.events.send(event).await.is_err() {
            debug!(session = %self.id, "event channel closed");
        }
    }
}

/// Apply the run's stderr policy, then classify
fn annotate(run: &Run, line: OutputLine) -> Option<LineAnnotation> {
    match (line.source, run.stderr) {
        (StreamSource::Stderr, StderrPolicy::ErrorColor) => {
            if line.text.trim().is_empty() {
                None
            } else {
                Some(LineAnnotation {
                    text: line.text,
                    tool: run.tool,
                    color: Some(Color::Red),
                    value: None,
                })
            }
        }
        _ => classify::classify(run.tool, &line.text),
    }
}

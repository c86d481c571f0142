//! Events on the application bus.

use crate::command::Command;
use crate::orchestrator::RunInput;
use connector_core::SessionEvent;

/// Everything the application loop consumes, in arrival order.
#[derive(Debug)]
pub enum AppEvent {
    /// Published by the user data session.
    Session(SessionEvent),
    /// From the command source.
    Command(Command),
    /// Completion of a timer or REST call started for the orchestrator.
    Run(RunInput),
    /// The restart delay after a session closure has elapsed.
    RestartSession,
}

impl AppEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session(SessionEvent::Started) => "stream_started",
            Self::Session(SessionEvent::Data { .. }) => "stream_data",
            Self::Session(SessionEvent::Error(_)) => "stream_error",
            Self::Session(SessionEvent::Closed(_)) => "stream_closed",
            Self::Command(_) => "command",
            Self::Run(_) => "run",
            Self::RestartSession => "restart_session",
        }
    }
}

impl From<SessionEvent> for AppEvent {
    fn from(event: SessionEvent) -> Self {
        Self::Session(event)
    }
}

impl From<Command> for AppEvent {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<RunInput> for AppEvent {
    fn from(input: RunInput) -> Self {
        Self::Run(input)
    }
}

//! Application loop: one consumer for stream events, commands and completions.

use crate::command::Command;
use crate::error::DelayCheckError;
use crate::event::AppEvent;
use crate::exchange::{ExchangeApi, FilterSource};
use crate::executor::Executor;
use crate::notice::{Notice, NoticeSender};
use crate::orchestrator::{DelayCheck, DelayCheckConfig, RunInput};
use common::ExponentialBackoff;
use connector_binance::{ListenKeyApi, SessionSupervisor};
use connector_core::{
    create_event_channel, CloseReason, EventReceiver, EventSender, SessionConfig, SessionControl,
    SessionEvent,
};
use execution_core::UserDataMessage;
use metrics::SharedMetrics;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Application settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub delay_check: DelayCheckConfig,
    /// First wait before reopening a closed session.
    pub restart_base: Duration,
    pub restart_max: Duration,
    /// Consecutive failed sessions before giving up.
    pub max_session_restarts: u32,
    /// How long shutdown waits for in-flight REST calls.
    pub drain_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            delay_check: DelayCheckConfig::default(),
            restart_base: Duration::from_secs(1),
            restart_max: Duration::from_secs(30),
            max_session_restarts: 5,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Owns the event bus, the session and the orchestrator.
pub struct App {
    config: AppConfig,
    machine: DelayCheck,
    executor: Executor,
    listen_keys: Arc<dyn ListenKeyApi>,
    metrics: SharedMetrics,
    events_tx: EventSender<AppEvent>,
    events_rx: EventReceiver<AppEvent>,
    session: Option<SessionSupervisor>,
    restart_backoff: ExponentialBackoff,
    failed_sessions: u32,
    shutting_down: bool,
}

impl App {
    pub fn new(
        config: AppConfig,
        exchange: Arc<dyn ExchangeApi>,
        filters: Arc<dyn FilterSource>,
        listen_keys: Arc<dyn ListenKeyApi>,
        metrics: SharedMetrics,
        notices: NoticeSender,
    ) -> Self {
        let (events_tx, events_rx) = create_event_channel();
        let executor = Executor::new(exchange, filters, events_tx.clone(), notices);

        Self {
            machine: DelayCheck::new(config.delay_check.clone()),
            restart_backoff: ExponentialBackoff::new(config.restart_base, config.restart_max, 0.1),
            config,
            executor,
            listen_keys,
            metrics,
            events_tx,
            events_rx,
            session: None,
            failed_sessions: 0,
            shutting_down: false,
        }
    }

    /// Sender for commands and anything else that should reach the loop.
    pub fn event_sender(&self) -> EventSender<AppEvent> {
        self.events_tx.clone()
    }

    /// Run until `done` has closed the session, or the session cannot be kept up.
    pub async fn run(mut self) -> Result<(), DelayCheckError> {
        info!("Starting delay-check application");
        self.start_session();

        let result = loop {
            let Some(event) = self.events_rx.recv().await else {
                break Err(DelayCheckError::ChannelClosed);
            };
            trace!(kind = event.kind(), "Event");

            if let ControlFlow::Break(result) = self.dispatch(event) {
                break result;
            }
        };

        if let Some(session) = self.session.take() {
            session.request_close();
            session.join().await;
        }
        self.executor.drain(self.config.drain_timeout).await;

        info!(ok = result.is_ok(), "Delay-check application stopped");
        result
    }

    fn dispatch(&mut self, event: AppEvent) -> ControlFlow<Result<(), DelayCheckError>> {
        match event {
            AppEvent::Session(event) => return self.on_session_event(event),
            AppEvent::Command(command) => return self.on_command(command),
            AppEvent::Run(input) => self.drive(input),
            AppEvent::RestartSession => {
                if !self.shutting_down && self.session.is_none() {
                    self.start_session();
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_session_event(
        &mut self,
        event: SessionEvent,
    ) -> ControlFlow<Result<(), DelayCheckError>> {
        match event {
            SessionEvent::Started => {
                info!("User data stream open");
                self.restart_backoff.reset();
                self.failed_sessions = 0;
                self.drive(RunInput::StreamStarted);
            }
            SessionEvent::Data {
                message,
                received_at_ms,
            } => match message {
                UserDataMessage::ExecutionReport(report) => self.drive(RunInput::Execution {
                    report,
                    received_at_ms,
                }),
                UserDataMessage::AccountUpdate(update) => {
                    debug!(balances = update.balances.len(), "Account update");
                }
                UserDataMessage::ListenKeyExpired { event_time_ms } => {
                    warn!(event_time_ms, "Listen key expired");
                }
                UserDataMessage::Unknown(event_type) => {
                    trace!(event_type = %event_type, "Unhandled user data event");
                }
            },
            SessionEvent::Error(e) => warn!(error = %e, "User data stream error"),
            SessionEvent::Closed(reason) => return self.on_session_closed(reason),
        }
        ControlFlow::Continue(())
    }

    fn on_session_closed(
        &mut self,
        reason: CloseReason,
    ) -> ControlFlow<Result<(), DelayCheckError>> {
        self.session = None;
        self.drive(RunInput::StreamClosed);

        if self.shutting_down {
            info!(reason = %reason, "User data stream closed, shutting down");
            return ControlFlow::Break(Ok(()));
        }

        if reason.is_clean() {
            info!(reason = %reason, "User data stream closed by the server, reopening");
        } else {
            warn!(reason = %reason, "User data stream lost, reopening");
        }

        self.failed_sessions += 1;
        if self.failed_sessions > self.config.max_session_restarts {
            error!(
                attempts = self.failed_sessions,
                reason = %reason,
                "Giving up on the user data stream"
            );
            self.executor
                .notify(Notice::Error(format!("user data stream unavailable: {reason}")));
            return ControlFlow::Break(Err(DelayCheckError::SessionUnavailable(
                reason.to_string(),
            )));
        }

        let delay = self.restart_backoff.next_delay();
        info!(
            attempt = self.failed_sessions,
            delay_ms = delay.as_millis() as u64,
            "Scheduling session restart"
        );
        self.executor.schedule(delay, AppEvent::RestartSession);
        ControlFlow::Continue(())
    }

    fn on_command(&mut self, command: Command) -> ControlFlow<Result<(), DelayCheckError>> {
        info!(action = command.action(), "Command received");

        match command {
            Command::DelayCheck(request) => {
                if self.shutting_down {
                    self.executor
                        .notify(Notice::Error("shutting down, delay check ignored".into()));
                } else {
                    self.drive(RunInput::Start(request));
                }
            }
            Command::Balances => self.executor.balances(),
            Command::GetOpenOrders(symbol) => self.executor.open_orders(symbol),
            Command::CancelOrder(symbol) => self.executor.cancel_orders(symbol),
            Command::Done => {
                if self.shutting_down {
                    return ControlFlow::Continue(());
                }
                self.shutting_down = true;
                self.drive(RunInput::Shutdown);

                match &self.session {
                    Some(session) => session.request_close(),
                    None => return ControlFlow::Break(Ok(())),
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn start_session(&mut self) {
        let supervisor = SessionSupervisor::start(
            self.listen_keys.clone(),
            self.config.session.clone(),
            self.events_tx.clone(),
            self.metrics.clone(),
        );
        self.session = Some(supervisor);
    }

    fn drive(&mut self, input: RunInput) {
        let (machine, actions) = std::mem::take(&mut self.machine).handle(input);
        self.machine = machine;
        for action in actions {
            self.executor.execute(action);
        }
    }
}

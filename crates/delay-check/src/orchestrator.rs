//! Delay-check state machine.
//!
//! [`DelayCheck`] owns the run state and reacts to one [`RunInput`] at a time.
//! Each call to [`DelayCheck::handle`] consumes the machine and returns the
//! next machine plus the side effects to perform. Nothing here touches the
//! network or the clock; the caller executes the returned [`Action`]s and
//! feeds their completions back as inputs.
//!
//! ```text
//! Idle -> AwaitingStreamReady -> LimitSubmitted -> AwaitingFills -> MarketSubmitted -> Idle
//!   \__________________________________/                \______________________________/
//!         (stream already open)                           (limit ended without a fill)
//! ```

use crate::command::DelayCheckRequest;
use crate::error::DelayCheckError;
use crate::stats::{DelaySample, RunOutcome, RunReport};
use common::ExponentialBackoff;
use execution_core::{
    generate_client_order_id, ExecutionReport, OrderIntent, OrderRequest, OrderStatus,
};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct DelayCheckConfig {
    /// Threshold used when a command carries none.
    pub default_delay_threshold_ms: i64,
    /// First wait while the stream is not open yet.
    pub stream_retry_base: Duration,
    /// Longest single wait while the stream is not open yet.
    pub stream_retry_max: Duration,
    /// Total wait for the stream before the run fails.
    pub stream_ready_max_wait: Duration,
    /// How long a run may wait for its orders to finish.
    pub fill_timeout: Duration,
    /// Delay of the cancel-all that follows the offsetting order.
    pub safety_cancel_delay: Duration,
    pub client_order_id_prefix: String,
}

impl Default for DelayCheckConfig {
    fn default() -> Self {
        Self {
            default_delay_threshold_ms: 10_000,
            stream_retry_base: Duration::from_millis(300),
            stream_retry_max: Duration::from_secs(2),
            stream_ready_max_wait: Duration::from_secs(30),
            fill_timeout: Duration::from_secs(60),
            safety_cancel_delay: Duration::from_secs(2),
            client_order_id_prefix: "dc".to_string(),
        }
    }
}

/// Acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub client_order_id: String,
    pub order_id: u64,
}

/// Everything the state machine reacts to.
#[derive(Debug)]
pub enum RunInput {
    Start(DelayCheckRequest),
    StreamStarted,
    StreamClosed,
    Execution {
        report: ExecutionReport,
        received_at_ms: i64,
    },
    StreamRetry {
        run_id: u64,
    },
    FillTimeout {
        run_id: u64,
    },
    LimitPlaced {
        run_id: u64,
        result: Result<PlacedOrder, DelayCheckError>,
    },
    MarketPlaced {
        run_id: u64,
        result: Result<PlacedOrder, DelayCheckError>,
    },
    Shutdown,
}

/// Side effects requested by the state machine.
#[derive(Debug)]
pub enum Action {
    /// Feed `RunInput::StreamRetry` back after `after`.
    ScheduleStreamRetry { run_id: u64, after: Duration },
    /// Price, transform and place the LIMIT leg; answer with `RunInput::LimitPlaced`.
    SubmitLimit {
        run_id: u64,
        intent: OrderIntent,
        client_order_id: String,
    },
    /// Place the offsetting leg; answer with `RunInput::MarketPlaced`.
    SubmitMarket { run_id: u64, request: OrderRequest },
    /// Feed `RunInput::FillTimeout` back after `after`.
    ScheduleFillTimeout { run_id: u64, after: Duration },
    /// Cancel whatever still rests on `symbol` after `after`.
    ScheduleSafetyCancel { symbol: String, after: Duration },
    CancelOpenOrders { symbol: String },
    Emit(RunReport),
    Reject(DelayCheckError),
}

/// Which order of a run a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Limit,
    Market,
}

/// State of the run in progress.
#[derive(Debug, Clone)]
struct Run {
    id: u64,
    intent: OrderIntent,
    threshold_ms: i64,
    limit_id: String,
    market_id: Option<String>,
    samples: Vec<DelaySample>,
    filled_qty: Decimal,
}

impl Run {
    fn leg_of(&self, client_order_id: &str) -> Option<Leg> {
        if client_order_id == self.limit_id {
            Some(Leg::Limit)
        } else if self.market_id.as_deref() == Some(client_order_id) {
            Some(Leg::Market)
        } else {
            None
        }
    }

    fn record(&mut self, report: &ExecutionReport, received_at_ms: i64) {
        let sample = DelaySample {
            client_order_id: report.client_order_id.clone(),
            execution_type: report.execution_type,
            order_status: report.order_status,
            delay_ms: report.delay_ms(received_at_ms),
        };
        debug!(
            run_id = self.id,
            client_order_id = %sample.client_order_id,
            execution_type = %sample.execution_type,
            delay_ms = sample.delay_ms,
            "Delay sample"
        );
        self.samples.push(sample);
    }

    fn into_report(self, outcome: RunOutcome) -> RunReport {
        RunReport::new(
            self.id,
            self.intent.symbol,
            outcome,
            self.threshold_ms,
            self.samples,
        )
    }
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    AwaitingStreamReady {
        run: Run,
        backoff: ExponentialBackoff,
    },
    LimitSubmitted(Run),
    AwaitingFills(Run),
    MarketSubmitted(Run),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingStreamReady { .. } => "awaiting_stream_ready",
            Self::LimitSubmitted(_) => "limit_submitted",
            Self::AwaitingFills(_) => "awaiting_fills",
            Self::MarketSubmitted(_) => "market_submitted",
        }
    }

    fn run(&self) -> Option<&Run> {
        match self {
            Self::Idle => None,
            Self::AwaitingStreamReady { run, .. }
            | Self::LimitSubmitted(run)
            | Self::AwaitingFills(run)
            | Self::MarketSubmitted(run) => Some(run),
        }
    }
}

/// The single-flight delay-check orchestrator.
#[derive(Debug, Default)]
pub struct DelayCheck {
    config: DelayCheckConfig,
    stream_open: bool,
    next_run_id: u64,
    phase: Phase,
}

impl DelayCheck {
    pub fn new(config: DelayCheckConfig) -> Self {
        Self {
            config,
            stream_open: false,
            next_run_id: 0,
            phase: Phase::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    pub fn active_run_id(&self) -> Option<u64> {
        self.phase.run().map(|run| run.id)
    }

    pub fn stream_open(&self) -> bool {
        self.stream_open
    }

    /// Advance the machine by one input.
    pub fn handle(mut self, input: RunInput) -> (Self, Vec<Action>) {
        let mut actions = Vec::new();
        let phase = std::mem::take(&mut self.phase);

        self.phase = match input {
            RunInput::Start(request) => self.start(phase, request, &mut actions),
            RunInput::StreamStarted => {
                self.stream_open = true;
                match phase {
                    Phase::AwaitingStreamReady { run, .. } => self.submit(run, &mut actions),
                    other => other,
                }
            }
            RunInput::StreamClosed => {
                self.stream_open = false;
                match phase {
                    Phase::LimitSubmitted(_)
                    | Phase::AwaitingFills(_)
                    | Phase::MarketSubmitted(_) => {
                        abort(phase, "user data stream closed", &mut actions)
                    }
                    other => other,
                }
            }
            RunInput::Execution {
                report,
                received_at_ms,
            } => self.on_execution(phase, &report, received_at_ms, &mut actions),
            RunInput::StreamRetry { run_id } => self.on_stream_retry(phase, run_id, &mut actions),
            RunInput::FillTimeout { run_id } => {
                let placed = !matches!(phase, Phase::AwaitingStreamReady { .. });
                if placed && phase.run().is_some_and(|run| run.id == run_id) {
                    abort(phase, "fill timeout", &mut actions)
                } else {
                    phase
                }
            }
            RunInput::LimitPlaced { run_id, result } => {
                on_limit_placed(phase, run_id, result, &mut actions)
            }
            RunInput::MarketPlaced { run_id, result } => {
                on_market_placed(phase, run_id, result, &mut actions)
            }
            RunInput::Shutdown => abort(phase, "shutdown", &mut actions),
        };

        (self, actions)
    }

    fn start(
        &mut self,
        phase: Phase,
        request: DelayCheckRequest,
        actions: &mut Vec<Action>,
    ) -> Phase {
        if let Some(run) = phase.run() {
            warn!(
                run_id = run.id,
                symbol = %run.intent.symbol,
                "Rejecting delay check, a run is in progress"
            );
            actions.push(Action::Reject(DelayCheckError::RunInProgress {
                symbol: run.intent.symbol.clone(),
            }));
            return phase;
        }

        self.next_run_id += 1;
        let run = Run {
            id: self.next_run_id,
            threshold_ms: request
                .delay_threshold_ms
                .unwrap_or(self.config.default_delay_threshold_ms),
            limit_id: generate_client_order_id(&self.config.client_order_id_prefix),
            market_id: None,
            intent: request.intent,
            samples: Vec::new(),
            filled_qty: Decimal::ZERO,
        };
        info!(
            run_id = run.id,
            symbol = %run.intent.symbol,
            side = %run.intent.side,
            quantity = %run.intent.quantity,
            threshold_ms = run.threshold_ms,
            "Delay check started"
        );

        if self.stream_open {
            return self.submit(run, actions);
        }

        let mut backoff = ExponentialBackoff::new(
            self.config.stream_retry_base,
            self.config.stream_retry_max,
            0.0,
        )
        .with_max_total(self.config.stream_ready_max_wait);
        match self.wait_for_stream(run, &mut backoff, actions) {
            Some(run) => Phase::AwaitingStreamReady { run, backoff },
            None => Phase::Idle,
        }
    }

    fn wait_for_stream(
        &self,
        run: Run,
        backoff: &mut ExponentialBackoff,
        actions: &mut Vec<Action>,
    ) -> Option<Run> {
        match backoff.try_next_delay() {
            Some(after) => {
                debug!(
                    run_id = run.id,
                    after_ms = after.as_millis() as u64,
                    "Stream not open, retrying"
                );
                actions.push(Action::ScheduleStreamRetry {
                    run_id: run.id,
                    after,
                });
                Some(run)
            }
            None => {
                let err = DelayCheckError::StreamNotReady(backoff.total_waited());
                warn!(run_id = run.id, error = %err, "Giving up on the delay check");
                actions.push(Action::Emit(
                    run.into_report(RunOutcome::Failed(err.to_string())),
                ));
                None
            }
        }
    }

    fn on_stream_retry(&self, phase: Phase, run_id: u64, actions: &mut Vec<Action>) -> Phase {
        match phase {
            Phase::AwaitingStreamReady { run, mut backoff } if run.id == run_id => {
                if self.stream_open {
                    return self.submit(run, actions);
                }
                match self.wait_for_stream(run, &mut backoff, actions) {
                    Some(run) => Phase::AwaitingStreamReady { run, backoff },
                    None => Phase::Idle,
                }
            }
            other => other,
        }
    }

    fn submit(&self, run: Run, actions: &mut Vec<Action>) -> Phase {
        info!(
            run_id = run.id,
            client_order_id = %run.limit_id,
            "Submitting LIMIT order"
        );
        actions.push(Action::SubmitLimit {
            run_id: run.id,
            intent: run.intent.clone(),
            client_order_id: run.limit_id.clone(),
        });
        actions.push(Action::ScheduleFillTimeout {
            run_id: run.id,
            after: self.config.fill_timeout,
        });
        Phase::LimitSubmitted(run)
    }

    fn on_execution(
        &self,
        phase: Phase,
        report: &ExecutionReport,
        received_at_ms: i64,
        actions: &mut Vec<Action>,
    ) -> Phase {
        let leg = match &phase {
            Phase::LimitSubmitted(run) | Phase::AwaitingFills(run) | Phase::MarketSubmitted(run) => {
                run.leg_of(&report.client_order_id)
            }
            _ => None,
        };
        let Some(leg) = leg else {
            debug!(
                client_order_id = %report.client_order_id,
                phase = phase.name(),
                "Ignoring execution report outside the current run"
            );
            return phase;
        };

        let mut run = match phase {
            Phase::LimitSubmitted(run) | Phase::AwaitingFills(run) | Phase::MarketSubmitted(run) => {
                run
            }
            other => return other,
        };
        run.record(report, received_at_ms);

        match leg {
            Leg::Limit => self.on_limit_report(run, report, actions),
            Leg::Market => on_market_report(run, report, actions),
        }
    }

    fn on_limit_report(
        &self,
        mut run: Run,
        report: &ExecutionReport,
        actions: &mut Vec<Action>,
    ) -> Phase {
        if run.market_id.is_some() {
            // Late limit-leg event after the offset went out.
            return Phase::MarketSubmitted(run);
        }
        run.filled_qty = run.filled_qty.max(report.cumulative_filled_qty);

        if report.is_full_fill() {
            info!(
                run_id = run.id,
                filled_qty = %run.filled_qty,
                "LIMIT order filled, offsetting"
            );
            actions.push(Action::ScheduleSafetyCancel {
                symbol: run.intent.symbol.clone(),
                after: self.config.safety_cancel_delay,
            });
            return self.offset(run, actions);
        }

        if report.execution_type.ends_without_fill() || report.is_terminal() {
            if run.filled_qty > Decimal::ZERO {
                info!(
                    run_id = run.id,
                    execution_type = %report.execution_type,
                    filled_qty = %run.filled_qty,
                    "LIMIT order ended after a partial fill, offsetting the filled part"
                );
                return self.offset(run, actions);
            }
            info!(
                run_id = run.id,
                execution_type = %report.execution_type,
                "LIMIT order ended without a fill"
            );
            return finish(
                run,
                RunOutcome::LimitEnded(report.execution_type),
                actions,
            );
        }

        if report.is_partial_fill() {
            debug!(
                run_id = run.id,
                last_qty = %report.last_executed_qty,
                remaining_qty = %report.remaining_qty(),
                "LIMIT order partially filled"
            );
        }
        Phase::AwaitingFills(run)
    }

    fn offset(&self, mut run: Run, actions: &mut Vec<Action>) -> Phase {
        let market_id = generate_client_order_id(&self.config.client_order_id_prefix);
        let request = run
            .intent
            .offsetting(run.filled_qty)
            .with_client_order_id(market_id.clone());
        run.market_id = Some(market_id);
        actions.push(Action::SubmitMarket {
            run_id: run.id,
            request,
        });
        Phase::MarketSubmitted(run)
    }
}

fn on_market_report(run: Run, report: &ExecutionReport, actions: &mut Vec<Action>) -> Phase {
    if !report.is_terminal() {
        return Phase::MarketSubmitted(run);
    }
    let outcome = if report.order_status == OrderStatus::Filled {
        RunOutcome::Completed
    } else {
        RunOutcome::Aborted(format!("offsetting order ended {}", report.order_status))
    };
    finish(run, outcome, actions)
}

fn on_limit_placed(
    phase: Phase,
    run_id: u64,
    result: Result<PlacedOrder, DelayCheckError>,
    actions: &mut Vec<Action>,
) -> Phase {
    match (phase, result) {
        (Phase::LimitSubmitted(run), Ok(placed)) if run.id == run_id => {
            info!(run_id, order_id = placed.order_id, "LIMIT order accepted");
            Phase::AwaitingFills(run)
        }
        (Phase::LimitSubmitted(run), Err(err)) if run.id == run_id => {
            warn!(run_id, error = %err, "LIMIT order submission failed");
            if matches!(&err, DelayCheckError::RestApi(e) if e.is_transport()) {
                // The order may have reached the exchange anyway.
                actions.push(Action::CancelOpenOrders {
                    symbol: run.intent.symbol.clone(),
                });
            }
            finish(run, RunOutcome::Failed(err.to_string()), actions)
        }
        (phase, Ok(placed)) => {
            debug!(
                run_id,
                order_id = placed.order_id,
                phase = phase.name(),
                "Late LIMIT acknowledgement"
            );
            phase
        }
        (phase, Err(err)) => {
            warn!(
                run_id,
                error = %err,
                phase = phase.name(),
                "LIMIT submission failed after the run moved on"
            );
            phase
        }
    }
}

fn on_market_placed(
    phase: Phase,
    run_id: u64,
    result: Result<PlacedOrder, DelayCheckError>,
    actions: &mut Vec<Action>,
) -> Phase {
    match (phase, result) {
        (Phase::MarketSubmitted(run), Err(err)) if run.id == run_id => {
            warn!(run_id, error = %err, "Offsetting order submission failed");
            finish(
                run,
                RunOutcome::Aborted(format!("offsetting order failed: {err}")),
                actions,
            )
        }
        (phase, Ok(placed)) => {
            debug!(run_id, order_id = placed.order_id, "MARKET order accepted");
            phase
        }
        (phase, Err(err)) => {
            warn!(run_id, error = %err, "Offsetting order failed after the run ended");
            phase
        }
    }
}

/// Cut the run short: clear resting orders, flatten any filled quantity, report.
fn abort(phase: Phase, reason: &str, actions: &mut Vec<Action>) -> Phase {
    let run = match phase {
        Phase::Idle => return Phase::Idle,
        Phase::AwaitingStreamReady { run, .. } => run,
        Phase::LimitSubmitted(run) | Phase::AwaitingFills(run) => {
            actions.push(Action::CancelOpenOrders {
                symbol: run.intent.symbol.clone(),
            });
            if run.filled_qty > Decimal::ZERO {
                actions.push(Action::SubmitMarket {
                    run_id: run.id,
                    request: run.intent.offsetting(run.filled_qty),
                });
            }
            run
        }
        Phase::MarketSubmitted(run) => run,
    };
    warn!(run_id = run.id, reason, "Delay check aborted");
    finish(run, RunOutcome::Aborted(reason.to_string()), actions)
}

fn finish(run: Run, outcome: RunOutcome, actions: &mut Vec<Action>) -> Phase {
    let report = run.into_report(outcome);
    info!(
        run_id = report.run_id,
        outcome = %report.outcome,
        samples = report.samples.len(),
        "Delay check finished"
    );
    actions.push(Action::Emit(report));
    Phase::Idle
}

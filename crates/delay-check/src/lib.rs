//! Execution-delay check over the private user data stream.
//!
//! A run places a LIMIT order, waits for its execution reports, offsets any
//! fill with a MARKET order on the opposite side and reports how late each
//! report arrived relative to the exchange transaction time.
//!
//! - **Commands**: [`Command`] parsed from JSON or plain words
//! - **Orchestrator**: [`DelayCheck`], a pure state machine producing [`Action`]s
//! - **Executor**: performs actions on tasks and feeds results back as [`AppEvent`]s
//! - **App**: the single event loop tying the session, commands and orchestrator together
//! - **Report**: [`RunReport`] with min/max/avg delay and threshold breaches
//!
//! All state changes happen on the [`App`] loop, one event at a time, in
//! arrival order.

mod app;
mod command;
mod error;
mod event;
mod exchange;
mod executor;
mod notice;
mod orchestrator;
mod stats;

pub use app::{App, AppConfig};
pub use command::{Command, DelayCheckRequest};
pub use error::DelayCheckError;
pub use event::AppEvent;
pub use exchange::{ExchangeApi, FilterSource};
pub use executor::Executor;
pub use notice::{create_notice_channel, Notice, NoticeReceiver, NoticeSender};
pub use orchestrator::{Action, DelayCheck, DelayCheckConfig, PlacedOrder, RunInput};
pub use stats::{DelaySample, DelayStats, RunOutcome, RunReport};

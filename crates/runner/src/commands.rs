//! Command source: one command per line from a reader.

use connector_core::EventSender;
use delay_check::{AppEvent, Command, Notice, NoticeSender};
use std::io::BufRead;
use tracing::{debug, warn};

pub const USAGE: &str = "\
Commands (one per line):
  delayCheck SYMBOL SIDE QUANTITY PRICE_MODIFIER [DELAY_MS]
  {\"action\":\"delayCheck\",\"payload\":{\"orderParams\":{...},\"delay\":10000}}
  balances
  getOpenOrders [SYMBOL]
  cancelOrder SYMBOL
  done";

/// Forward parsed lines to the application until `done`, end of input, or
/// until the application stops listening.
///
/// Blocking; run it on a dedicated thread. End of input counts as `done`.
pub fn forward_commands<R: BufRead>(
    reader: R,
    events: &EventSender<AppEvent>,
    notices: &NoticeSender,
    default_recv_window: u64,
) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read command input");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse_with_recv_window(line, default_recv_window) {
            Ok(command) => {
                let done = command == Command::Done;
                if events.send(AppEvent::Command(command)).is_err() {
                    debug!("Application stopped, no longer reading commands");
                    return;
                }
                if done {
                    return;
                }
            }
            Err(e) => {
                let _ = notices.send(Notice::Error(e.to_string()));
            }
        }
    }

    debug!("Command input ended");
    let _ = events.send(AppEvent::Command(Command::Done));
}

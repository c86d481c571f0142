//! User-facing output of the application.

use crate::stats::RunReport;
use binance_rest::{Balance, CanceledOrder, OpenOrder};
use std::fmt;
use tokio::sync::mpsc;

/// Something to show the user.
#[derive(Debug, Clone)]
pub enum Notice {
    Report(RunReport),
    Balances(Vec<Balance>),
    OpenOrders {
        symbol: Option<String>,
        orders: Vec<OpenOrder>,
    },
    Canceled {
        symbol: String,
        orders: Vec<CanceledOrder>,
    },
    Info(String),
    Error(String),
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn create_notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report(report) => write!(f, "{report}"),
            Self::Balances(balances) if balances.is_empty() => write!(f, "No free balances"),
            Self::Balances(balances) => {
                writeln!(f, "=== Balances ===")?;
                for balance in balances {
                    writeln!(
                        f,
                        "{:<8} free: {}  locked: {}",
                        balance.asset, balance.free, balance.locked
                    )?;
                }
                Ok(())
            }
            Self::OpenOrders { symbol, orders } => {
                let scope = symbol.as_deref().unwrap_or("all symbols");
                if orders.is_empty() {
                    return write!(f, "No open orders on {scope}");
                }
                writeln!(f, "=== Open orders on {scope} ===")?;
                for order in orders {
                    writeln!(
                        f,
                        "{} {} {} {} {} @ {} ({}, filled {})",
                        order.symbol,
                        order.client_order_id,
                        order.side,
                        order.order_type,
                        order.orig_qty,
                        order.price,
                        order.status,
                        order.executed_qty
                    )?;
                }
                Ok(())
            }
            Self::Canceled { symbol, orders } if orders.is_empty() => {
                write!(f, "No open orders on {symbol}")
            }
            Self::Canceled { symbol, orders } => {
                write!(f, "Canceled {} order(s) on {symbol}", orders.len())
            }
            Self::Info(message) => write!(f, "{message}"),
            Self::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

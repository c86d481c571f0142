//! Command-line arguments.

use clap::Parser;
use common::BinanceEnvironment;
use execution_core::DEFAULT_RECV_WINDOW_MS;
use std::path::PathBuf;
use std::time::Duration;

/// Measures how late order events arrive on the Binance user data stream.
///
/// Commands are read from stdin, one per line. Credentials come from
/// `BINANCE_API_KEY` and `BINANCE_PRIVATE_KEY_PATH` (or `BINANCE_SECRET_KEY`),
/// optionally via a `.env` file.
#[derive(Parser, Debug)]
#[command(name = "delay-monitor", version, about, long_about = None)]
pub struct Args {
    /// Exchange environment: testnet or production
    #[arg(long, env = "BINANCE_ENVIRONMENT", default_value = "testnet")]
    pub environment: BinanceEnvironment,

    /// Default delay threshold in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub delay: i64,

    /// recvWindow for orders that do not set one, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RECV_WINDOW_MS)]
    pub recv_window: u64,

    /// Seconds a run may wait for its orders to finish
    #[arg(long, default_value_t = 60)]
    pub fill_timeout_secs: u64,

    /// Exchange metadata cache file
    #[arg(long, default_value = "exchange_info.json")]
    pub cache_path: PathBuf,

    /// Hours before the metadata cache is considered stale
    #[arg(long, default_value_t = 24)]
    pub cache_max_age_hours: u64,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl Args {
    pub fn fill_timeout(&self) -> Duration {
        Duration::from_secs(self.fill_timeout_secs)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_hours * 60 * 60)
    }
}

//! Delay samples and the end-of-run report.

use execution_core::{ExecutionType, OrderStatus};
use std::fmt;

/// One measured delay: local receipt time minus the exchange transaction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelaySample {
    pub client_order_id: String,
    pub execution_type: ExecutionType,
    pub order_status: OrderStatus,
    pub delay_ms: i64,
}

impl DelaySample {
    /// Samples of order acceptance or trades, the ones the statistics cover.
    pub fn is_new_or_trade(&self) -> bool {
        matches!(
            self.execution_type,
            ExecutionType::New | ExecutionType::Trade
        )
    }
}

/// Aggregate over a non-empty set of delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayStats {
    pub count: usize,
    pub min_ms: i64,
    pub max_ms: i64,
    pub avg_ms: f64,
}

impl DelayStats {
    /// `None` for an empty input.
    pub fn from_delays(delays: &[i64]) -> Option<Self> {
        let min_ms = *delays.iter().min()?;
        let max_ms = *delays.iter().max()?;
        let sum: i128 = delays.iter().map(|d| i128::from(*d)).sum();

        Some(Self {
            count: delays.len(),
            min_ms,
            max_ms,
            avg_ms: sum as f64 / delays.len() as f64,
        })
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The LIMIT leg filled and the offsetting MARKET leg finished.
    Completed,
    /// The LIMIT leg left the book without a fill; nothing was offset.
    LimitEnded(ExecutionType),
    /// Fill timeout, stream closure or shutdown cut the run short.
    Aborted(String),
    /// Submission failed before any fill.
    Failed(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::LimitEnded(execution_type) => {
                write!(f, "limit order ended with {execution_type}, no offset")
            }
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// The human-readable result of one delay-check run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: u64,
    pub symbol: String,
    pub outcome: RunOutcome,
    pub threshold_ms: i64,
    pub samples: Vec<DelaySample>,
    /// Over NEW and TRADE samples, or over every sample when there are none.
    pub stats: Option<DelayStats>,
    pub over_threshold: Vec<DelaySample>,
}

impl RunReport {
    pub fn new(
        run_id: u64,
        symbol: impl Into<String>,
        outcome: RunOutcome,
        threshold_ms: i64,
        samples: Vec<DelaySample>,
    ) -> Self {
        let mut counted: Vec<&DelaySample> =
            samples.iter().filter(|s| s.is_new_or_trade()).collect();
        if counted.is_empty() {
            counted = samples.iter().collect();
        }

        let delays: Vec<i64> = counted.iter().map(|s| s.delay_ms).collect();
        let stats = DelayStats::from_delays(&delays);
        let over_threshold = counted
            .into_iter()
            .filter(|s| s.delay_ms > threshold_ms)
            .cloned()
            .collect();

        Self {
            run_id,
            symbol: symbol.into(),
            outcome,
            threshold_ms,
            samples,
            stats,
            over_threshold,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Completed | RunOutcome::LimitEnded(_)
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Delay check #{} on {} ===", self.run_id, self.symbol)?;
        writeln!(f, "Outcome:     {}", self.outcome)?;
        writeln!(f, "Samples:     {}", self.samples.len())?;
        match &self.stats {
            Some(stats) => {
                writeln!(f, "Min delay:   {} ms", stats.min_ms)?;
                writeln!(f, "Max delay:   {} ms", stats.max_ms)?;
                writeln!(f, "Avg delay:   {:.1} ms", stats.avg_ms)?;
            }
            None => writeln!(f, "No delay samples collected")?,
        }
        writeln!(
            f,
            "Over {} ms:  {}",
            self.threshold_ms,
            self.over_threshold.len()
        )?;
        for sample in &self.over_threshold {
            writeln!(
                f,
                "  {} {} {}: {} ms",
                sample.client_order_id, sample.execution_type, sample.order_status, sample.delay_ms
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, execution_type: ExecutionType, delay_ms: i64) -> DelaySample {
        DelaySample {
            client_order_id: id.into(),
            execution_type,
            order_status: OrderStatus::New,
            delay_ms,
        }
    }

    #[test]
    fn test_empty_delays_have_no_stats() {
        assert_eq!(DelayStats::from_delays(&[]), None);
    }

    #[test]
    fn test_stats_bounds() {
        let stats = DelayStats::from_delays(&[12, 40, 5, 19]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min_ms, 5);
        assert_eq!(stats.max_ms, 40);
        assert_eq!(stats.avg_ms, 19.0);
    }

    #[test]
    fn test_min_avg_max_ordering_holds() {
        let mut seed: i64 = 17;
        for len in 1..40 {
            let delays: Vec<i64> = (0..len)
                .map(|_| {
                    seed = (seed * 1103515245 + 12345) % 2147483648;
                    seed % 5000 - 200
                })
                .collect();
            let stats = DelayStats::from_delays(&delays).unwrap();
            assert!(stats.min_ms as f64 <= stats.avg_ms, "{delays:?}");
            assert!(stats.avg_ms <= stats.max_ms as f64, "{delays:?}");
        }
    }

    #[test]
    fn test_report_counts_new_and_trade_only() {
        let report = RunReport::new(
            1,
            "BNBUSDT",
            RunOutcome::Completed,
            100,
            vec![
                sample("a", ExecutionType::New, 40),
                sample("a", ExecutionType::Trade, 150),
                sample("b", ExecutionType::Canceled, 900),
            ],
        );

        let stats = report.stats.unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max_ms, 150);
        assert_eq!(report.over_threshold.len(), 1);
        assert_eq!(report.over_threshold[0].delay_ms, 150);
        assert_eq!(report.samples.len(), 3);
    }

    #[test]
    fn test_expired_only_run_reports_its_single_sample() {
        let report = RunReport::new(
            2,
            "BNBUSDT",
            RunOutcome::LimitEnded(ExecutionType::Expired),
            10_000,
            vec![sample("a", ExecutionType::Expired, 33)],
        );

        let stats = report.stats.unwrap();
        assert_eq!((stats.min_ms, stats.max_ms, stats.count), (33, 33, 1));
        assert!(report.over_threshold.is_empty());
        assert!(report.is_success());
    }

    #[test]
    fn test_display() {
        let report = RunReport::new(
            3,
            "BNBUSDT",
            RunOutcome::Aborted("fill timeout".into()),
            10,
            vec![sample("dc_x", ExecutionType::New, 25)],
        );
        let text = report.to_string();

        assert!(text.starts_with("=== Delay check #3 on BNBUSDT ==="));
        assert!(text.contains("Outcome:     aborted: fill timeout"));
        assert!(text.contains("Avg delay:   25.0 ms"));
        assert!(text.contains("Over 10 ms:  1"));
        assert!(text.contains("  dc_x NEW NEW: 25 ms"));
        assert!(!report.is_success());

        let empty = RunReport::new(4, "BNBUSDT", RunOutcome::Failed("x".into()), 10, vec![]);
        assert!(empty.to_string().contains("No delay samples collected"));
    }
}

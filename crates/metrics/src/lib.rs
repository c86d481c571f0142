use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for the user data stream session.
#[derive(Debug)]
pub struct SessionMetrics {
    // Counters
    sessions_started: AtomicU64,
    frames_received: AtomicU64,
    parse_errors: AtomicU64,
    websocket_errors: AtomicU64,
    pings_answered: AtomicU64,
    liveness_sent: AtomicU64,
    renewals: AtomicU64,
    renewal_failures: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_frame_time: Option<Instant>,
    last_error_time: Option<Instant>,
    last_renewal_time: Option<Instant>,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            websocket_errors: AtomicU64::new(0),
            pings_answered: AtomicU64::new(0),
            liveness_sent: AtomicU64::new(0),
            renewals: AtomicU64::new(0),
            renewal_failures: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_frame_time: None,
                last_error_time: None,
                last_renewal_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_sessions_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_frames_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_frame_time = Some(Instant::now());
    }

    pub fn inc_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_websocket_errors(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_pings_answered(&self) {
        self.pings_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_liveness_sent(&self) {
        self.liveness_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_renewals(&self) {
        self.renewals.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_renewal_time = Some(Instant::now());
    }

    pub fn inc_renewal_failures(&self) {
        self.renewal_failures.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn websocket_errors(&self) -> u64 {
        self.websocket_errors.load(Ordering::Relaxed)
    }

    pub fn pings_answered(&self) -> u64 {
        self.pings_answered.load(Ordering::Relaxed)
    }

    pub fn liveness_sent(&self) -> u64 {
        self.liveness_sent.load(Ordering::Relaxed)
    }

    pub fn renewals(&self) -> u64 {
        self.renewals.load(Ordering::Relaxed)
    }

    pub fn renewal_failures(&self) -> u64 {
        self.renewal_failures.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_frame(&self) -> Option<f64> {
        self.inner
            .read()
            .last_frame_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_renewal(&self) -> Option<f64> {
        self.inner
            .read()
            .last_renewal_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started(),
            frames_received: self.frames_received(),
            parse_errors: self.parse_errors(),
            websocket_errors: self.websocket_errors(),
            pings_answered: self.pings_answered(),
            liveness_sent: self.liveness_sent(),
            renewals: self.renewals(),
            renewal_failures: self.renewal_failures(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_frame: self.secs_since_last_frame(),
            secs_since_last_error: self.secs_since_last_error(),
            secs_since_last_renewal: self.secs_since_last_renewal(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub frames_received: u64,
    pub parse_errors: u64,
    pub websocket_errors: u64,
    pub pings_answered: u64,
    pub liveness_sent: u64,
    pub renewals: u64,
    pub renewal_failures: u64,
    pub uptime_secs: f64,
    pub secs_since_last_frame: Option<f64>,
    pub secs_since_last_error: Option<f64>,
    pub secs_since_last_renewal: Option<f64>,
}

impl MetricsSnapshot {
    /// Share of received frames that could not be parsed.
    pub fn parse_error_ratio(&self) -> f64 {
        if self.frames_received == 0 {
            0.0
        } else {
            self.parse_errors as f64 / self.frames_received as f64
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Session Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Sessions started:    {}", self.sessions_started)?;
        writeln!(f, "Frames received:     {}", self.frames_received)?;
        writeln!(f, "Parse errors:        {}", self.parse_errors)?;
        writeln!(f, "WebSocket errors:    {}", self.websocket_errors)?;
        writeln!(f, "Pings answered:      {}", self.pings_answered)?;
        writeln!(f, "Liveness sent:       {}", self.liveness_sent)?;
        writeln!(f, "Token renewals:      {}", self.renewals)?;
        writeln!(f, "Renewal failures:    {}", self.renewal_failures)?;
        if let Some(secs) = self.secs_since_last_frame {
            writeln!(f, "Since last frame:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_renewal {
            writeln!(f, "Since last renewal:  {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<SessionMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(SessionMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = SessionMetrics::new();

        metrics.inc_frames_received();
        metrics.inc_frames_received();
        metrics.inc_pings_answered();
        metrics.inc_parse_errors();

        assert_eq!(metrics.frames_received(), 2);
        assert_eq!(metrics.pings_answered(), 1);
        assert_eq!(metrics.parse_errors(), 1);
        assert_eq!(metrics.renewals(), 0);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = SessionMetrics::new();

        metrics.inc_sessions_started();
        metrics.inc_renewals();
        metrics.inc_renewal_failures();
        metrics.inc_websocket_errors();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sessions_started, 1);
        assert_eq!(snapshot.renewals, 1);
        assert_eq!(snapshot.renewal_failures, 1);
        assert_eq!(snapshot.websocket_errors, 1);
        assert!(snapshot.uptime_secs >= 0.0);
        assert!(snapshot.secs_since_last_renewal.is_some());
    }

    #[test]
    fn test_last_frame_time() {
        let metrics = SessionMetrics::new();

        assert!(metrics.secs_since_last_frame().is_none());

        metrics.inc_frames_received();

        let secs = metrics.secs_since_last_frame();
        assert!(secs.is_some());
        assert!(secs.unwrap() < 1.0);
    }

    #[test]
    fn test_parse_error_ratio() {
        let metrics = SessionMetrics::new();
        assert_eq!(metrics.snapshot().parse_error_ratio(), 0.0);

        for _ in 0..4 {
            metrics.inc_frames_received();
        }
        metrics.inc_parse_errors();
        assert_eq!(metrics.snapshot().parse_error_ratio(), 0.25);
    }

    #[test]
    fn test_display_lists_counters() {
        let metrics = SessionMetrics::new();
        metrics.inc_liveness_sent();

        let text = metrics.snapshot().to_string();
        assert!(text.starts_with("=== Session Metrics ==="));
        assert!(text.contains("Liveness sent:       1"));
        assert!(!text.contains("Since last frame"));
    }
}

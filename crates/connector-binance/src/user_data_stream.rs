//! User data stream session.
//!
//! One call to [`run_user_data_session`] drives one session from token
//! acquisition to closure:
//!
//! 1. Creates a listen key via REST
//! 2. Connects to the combined stream endpoint with the key in the URL
//! 3. Sends a liveness frame on every keepalive tick and renews the key
//!    once it is older than the renewal interval
//! 4. Answers server pings immediately
//! 5. Republishes parsed frames as [`SessionEvent::Data`]
//! 6. Publishes [`SessionEvent::Closed`] exactly once, as the last event
//!
//! The session does not reconnect by itself. The owner decides what to do with
//! an unexpected close.

use crate::user_data_parser::parse_stream_frame;
use async_trait::async_trait;
use binance_rest::{BinanceRestClient, BinanceRestError};
use common::now_ms;
use connector_core::{
    classify_close, CloseReason, ConnectorError, EventSender, SessionConfig, SessionEvent,
    SessionHandle, SessionState, CLOSE_CODE_NO_STATUS,
};
use execution_core::UserDataMessage;
use futures_util::{SinkExt, StreamExt};
use metrics::SharedMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

/// How long to wait for the server's close frame after sending ours.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Listen key lifecycle calls the session needs.
#[async_trait]
pub trait ListenKeyApi: Send + Sync {
    async fn create_listen_key(&self) -> Result<String, BinanceRestError>;
    async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), BinanceRestError>;
    async fn close_listen_key(&self, listen_key: &str) -> Result<(), BinanceRestError>;
}

#[async_trait]
impl ListenKeyApi for BinanceRestClient {
    async fn create_listen_key(&self) -> Result<String, BinanceRestError> {
        BinanceRestClient::create_listen_key(self).await
    }

    async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), BinanceRestError> {
        BinanceRestClient::keepalive_listen_key(self, listen_key).await
    }

    async fn close_listen_key(&self, listen_key: &str) -> Result<(), BinanceRestError> {
        BinanceRestClient::close_listen_key(self, listen_key).await
    }
}

/// What a keepalive tick has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    SendLiveness,
    /// Start a token renewal, then send the liveness frame.
    RenewAndSendLiveness,
}

impl TickPlan {
    pub fn renews(&self) -> bool {
        matches!(self, Self::RenewAndSendLiveness)
    }
}

/// Decides on each keepalive tick whether the listen key needs renewing.
///
/// At most one renewal is in flight at a time. A failed renewal leaves the
/// token age untouched, so the next tick tries again.
#[derive(Debug, Clone)]
pub struct KeepaliveSchedule {
    renewal_interval: Duration,
    renewal_in_flight: bool,
}

impl KeepaliveSchedule {
    pub fn new(renewal_interval: Duration) -> Self {
        Self {
            renewal_interval,
            renewal_in_flight: false,
        }
    }

    pub fn on_tick(&mut self, token_age: Duration) -> TickPlan {
        if !self.renewal_in_flight && token_age >= self.renewal_interval {
            self.renewal_in_flight = true;
            TickPlan::RenewAndSendLiveness
        } else {
            TickPlan::SendLiveness
        }
    }

    pub fn on_renewal_finished(&mut self) {
        self.renewal_in_flight = false;
    }

    pub fn renewal_in_flight(&self) -> bool {
        self.renewal_in_flight
    }
}

/// The live listen key and when it was last issued or renewed.
#[derive(Debug)]
struct SessionToken {
    listen_key: String,
    refreshed_at: Instant,
}

impl SessionToken {
    fn new(listen_key: String) -> Self {
        Self {
            listen_key,
            refreshed_at: Instant::now(),
        }
    }

    fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }
}

fn publish<E: From<SessionEvent>>(events: &EventSender<E>, event: SessionEvent) {
    if events.send(E::from(event)).is_err() {
        debug!("Event receiver dropped, discarding session event");
    }
}

fn finish<E: From<SessionEvent>>(
    handle: &SessionHandle,
    events: &EventSender<E>,
    reason: CloseReason,
) -> CloseReason {
    handle.set_state(SessionState::Closed);
    publish(events, SessionEvent::Closed(reason.clone()));
    reason
}

// Errors after which the socket is gone.
fn is_transport_closure(e: &tungstenite::Error) -> bool {
    matches!(
        e,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
            | tungstenite::Error::Protocol(_)
    )
}

/// Run a single user data stream session.
///
/// Returns the same [`CloseReason`] that was published with
/// [`SessionEvent::Closed`].
pub async fn run_user_data_session<E>(
    api: Arc<dyn ListenKeyApi>,
    config: SessionConfig,
    handle: SessionHandle,
    events: EventSender<E>,
    metrics: SharedMetrics,
) -> CloseReason
where
    E: From<SessionEvent> + Send + 'static,
{
    let mut close_rx = handle.close_signal();
    if handle.close_requested() {
        return finish(&handle, &events, CloseReason::Clean);
    }
    handle.set_state(SessionState::Connecting);

    let listen_key = match api.create_listen_key().await {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Failed to create listen key");
            return finish(&handle, &events, CloseReason::ConnectFailed(e.to_string()));
        }
    };
    let mut token = SessionToken::new(listen_key);

    let url = config.stream_url(&token.listen_key);
    let ws_stream = match tokio::time::timeout(config.connect_timeout, connect_async(url.as_str()))
        .await
    {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            let err = ConnectorError::WebSocket(e.to_string());
            warn!(error = %err, "Failed to connect to user data stream");
            delete_listen_key(api.as_ref(), &token.listen_key).await;
            return finish(&handle, &events, CloseReason::ConnectFailed(err.to_string()));
        }
        Err(_) => {
            let err = ConnectorError::ConnectTimeout(config.connect_timeout);
            warn!(error = %err, "Failed to connect to user data stream");
            delete_listen_key(api.as_ref(), &token.listen_key).await;
            return finish(&handle, &events, CloseReason::ConnectFailed(err.to_string()));
        }
    };

    info!("Connected to user data stream");
    metrics.inc_sessions_started();
    handle.set_state(SessionState::Open);
    publish(&events, SessionEvent::Started);

    let (mut write, mut read) = ws_stream.split();

    let mut keepalive = tokio::time::interval(config.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut schedule = KeepaliveSchedule::new(config.renewal_interval);
    let (renewal_tx, mut renewal_rx) = mpsc::unbounded_channel::<Result<(), BinanceRestError>>();

    let mut locally_initiated = false;
    let reason = loop {
        tokio::select! {
            biased;

            changed = close_rx.changed() => {
                // A dropped sender means the owner is gone: close as well.
                if changed.is_err() || *close_rx.borrow() {
                    info!("Close requested, closing user data stream");
                    handle.set_state(SessionState::Closing);
                    locally_initiated = true;
                    let _ = write.close().await;

                    let drain = async {
                        while let Some(msg) = read.next().await {
                            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                                break;
                            }
                        }
                    };
                    if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, drain).await.is_err() {
                        debug!("Server did not acknowledge close in time");
                    }
                    break classify_close(None, "", true);
                }
            }

            Some(result) = renewal_rx.recv() => {
                schedule.on_renewal_finished();
                match result {
                    Ok(()) => {
                        token.refreshed_at = Instant::now();
                        metrics.inc_renewals();
                        debug!("Listen key renewed");
                    }
                    Err(e) => {
                        // The old key stays in use until the server rejects it.
                        metrics.inc_renewal_failures();
                        warn!(error = %e, "Failed to renew listen key, keeping current key");
                        if e.is_listen_key_invalid() {
                            publish(
                                &events,
                                SessionEvent::Error(ConnectorError::ListenKey(e.to_string())),
                            );
                        }
                    }
                }
            }

            _ = keepalive.tick() => {
                let plan = schedule.on_tick(token.age());
                if plan.renews() {
                    info!(token_age_secs = token.age().as_secs(), "Renewing listen key");
                    let api = Arc::clone(&api);
                    let listen_key = token.listen_key.clone();
                    let renewal_tx = renewal_tx.clone();
                    tokio::spawn(async move {
                        let result = api.keepalive_listen_key(&listen_key).await;
                        // Receiver is gone once the session closed; the result is moot then.
                        let _ = renewal_tx.send(result);
                    });
                }

                match write.send(Message::Pong(Vec::new())).await {
                    Ok(()) => metrics.inc_liveness_sent(),
                    Err(e) => {
                        warn!(error = %e, "Failed to send liveness frame");
                        metrics.inc_websocket_errors();
                        let err = ConnectorError::WebSocket(e.to_string());
                        publish(&events, SessionEvent::Error(err));
                    }
                }
            }

            msg_opt = read.next() => {
                match msg_opt {
                    Some(Ok(Message::Text(text))) => {
                        let received_at_ms = now_ms();
                        metrics.inc_frames_received();

                        match parse_stream_frame(&text) {
                            Ok(message) => {
                                match &message {
                                    UserDataMessage::ExecutionReport(report) => debug!(
                                        client_order_id = %report.client_order_id,
                                        execution_type = %report.execution_type,
                                        status = ?report.order_status,
                                        "Received execution report"
                                    ),
                                    UserDataMessage::ListenKeyExpired { event_time_ms } => warn!(
                                        event_time_ms,
                                        "Listen key expired, server will close the stream"
                                    ),
                                    _ => {}
                                }
                                publish(&events, SessionEvent::Data { message, received_at_ms });
                            }
                            Err(e) => {
                                metrics.inc_parse_errors();
                                warn!(error = %e, text = %text, "Failed to parse user data message");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received Ping, sending Pong");
                        match write.send(Message::Pong(data)).await {
                            Ok(()) => metrics.inc_pings_answered(),
                            Err(e) => {
                                warn!(error = %e, "Failed to send Pong");
                                metrics.inc_websocket_errors();
                                let err = ConnectorError::WebSocket(e.to_string());
                                publish(&events, SessionEvent::Error(err));
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        // A close frame without a status reads as 1005.
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                            None => (CLOSE_CODE_NO_STATUS, String::new()),
                        };
                        handle.set_state(SessionState::Closing);
                        // Flush the close reply queued by the protocol layer.
                        let _ = write.close().await;
                        break classify_close(Some(code), &reason, false);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) if is_transport_closure(&e) => {
                        error!(error = %e, "WebSocket transport closed");
                        metrics.inc_websocket_errors();
                        handle.set_state(SessionState::Closing);
                        break classify_close(None, &e.to_string(), false);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        metrics.inc_websocket_errors();
                        let err = ConnectorError::WebSocket(e.to_string());
                        publish(&events, SessionEvent::Error(err));
                    }
                    None => {
                        info!("WebSocket stream ended");
                        handle.set_state(SessionState::Closing);
                        break classify_close(None, "", false);
                    }
                }
            }
        }
    };

    match &reason {
        CloseReason::Clean => info!("User data stream closed OK"),
        other => error!(reason = %other, "Unexpected user data stream close"),
    }

    if locally_initiated {
        delete_listen_key(api.as_ref(), &token.listen_key).await;
    }

    finish(&handle, &events, reason)
}

async fn delete_listen_key(api: &dyn ListenKeyApi, listen_key: &str) {
    if let Err(e) = api.close_listen_key(listen_key).await {
        warn!(error = %e, "Failed to close listen key");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_no_renewal_before_interval() {
        let mut schedule = KeepaliveSchedule::new(secs(1800));
        for t in (0..1800).step_by(60) {
            assert_eq!(schedule.on_tick(secs(t)), TickPlan::SendLiveness, "t={t}");
        }
    }

    #[test]
    fn test_renewal_issued_once_when_token_is_old() {
        let mut schedule = KeepaliveSchedule::new(secs(1800));

        let plans: Vec<TickPlan> = (0..=1860)
            .step_by(60)
            .map(|t| schedule.on_tick(secs(t)))
            .collect();

        let renewals = plans.iter().filter(|p| p.renews()).count();
        assert_eq!(renewals, 1);
        assert_eq!(plans[30], TickPlan::RenewAndSendLiveness);
        assert_eq!(plans[31], TickPlan::SendLiveness);
        assert!(schedule.renewal_in_flight());
    }

    #[test]
    fn test_failed_renewal_is_retried_on_next_tick() {
        let mut schedule = KeepaliveSchedule::new(secs(1800));
        assert!(schedule.on_tick(secs(1810)).renews());

        // Failure: the token age keeps growing.
        schedule.on_renewal_finished();
        assert!(schedule.on_tick(secs(1870)).renews());

        // Success: the age restarts from zero.
        schedule.on_renewal_finished();
        assert!(!schedule.on_tick(secs(60)).renews());
    }

    #[test]
    fn test_transport_closure_errors() {
        assert!(is_transport_closure(&tungstenite::Error::ConnectionClosed));
        assert!(is_transport_closure(&tungstenite::Error::AlreadyClosed));
        assert!(!is_transport_closure(&tungstenite::Error::Utf8));
    }
}

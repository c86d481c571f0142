//! Owner-side handle of a session task.

use crate::user_data_stream::{run_user_data_session, ListenKeyApi};
use connector_core::{
    CloseReason, EventSender, SessionConfig, SessionControl, SessionEvent, SessionHandle,
    SessionState,
};
use metrics::SharedMetrics;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// A user data session running on its own task.
pub struct SessionSupervisor {
    handle: SessionHandle,
    task: JoinHandle<CloseReason>,
}

impl SessionSupervisor {
    /// Spawn a new session publishing onto `events`.
    pub fn start<E>(
        api: Arc<dyn ListenKeyApi>,
        config: SessionConfig,
        events: EventSender<E>,
        metrics: SharedMetrics,
    ) -> Self
    where
        E: From<SessionEvent> + Send + 'static,
    {
        let handle = SessionHandle::new();
        let task = tokio::spawn(run_user_data_session(
            api,
            config,
            handle.clone(),
            events,
            metrics,
        ));
        Self { handle, task }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Wait for the session task to end.
    ///
    /// `None` if the task panicked or was aborted.
    pub async fn join(self) -> Option<CloseReason> {
        match self.task.await {
            Ok(reason) => Some(reason),
            Err(e) => {
                warn!(error = %e, "Session task did not complete");
                None
            }
        }
    }
}

impl SessionControl for SessionSupervisor {
    fn state(&self) -> SessionState {
        self.handle.state()
    }

    fn request_close(&self) {
        self.handle.request_close();
    }
}

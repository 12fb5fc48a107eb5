mod actor;
mod messages;

use crate::backend::SchedulerBackend;
use crate::events::WatchState;
use crate::monitor::WatchConfig;
use crate::types::JobId;
use actor::Actor;
use messages::WatcherMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Watches one job in the background.
///
/// This struct is an actor handle: the polling runs in tasks spawned by
/// `WatcherHandle::spawn`, the handle only sends messages to them and can be
/// cloned freely. Dropping every handle stops the watch. Neither cancelling
/// nor dropping kills the job on the scheduler.
#[derive(Clone)]
pub struct WatcherHandle {
    sender: mpsc::UnboundedSender<WatcherMessage>,
}

impl WatcherHandle {
    pub fn spawn(backend: Arc<dyn SchedulerBackend>, job_id: JobId, config: WatchConfig) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, backend, job_id, config);
        Self { sender }
    }

    /// Current state without waiting.
    pub async fn state(&self) -> WatchState {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.send(WatcherMessage::GetState { response: tx });
        rx.await.unwrap_or(WatchState::Cancelled)
    }

    /// Wait until the watch reaches a terminal state.
    pub async fn wait(&self) -> WatchState {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.send(WatcherMessage::Wait { response: tx });
        rx.await.unwrap_or(WatchState::Cancelled)
    }

    /// Stop polling. Returns `false` if the watch had already stopped.
    pub async fn cancel(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.send(WatcherMessage::Cancel { response: tx });
        rx.await.unwrap_or(false)
    }
}

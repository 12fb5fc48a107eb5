use super::messages::WatcherMessage;
use crate::backend::SchedulerBackend;
use crate::events::WatchState;
use crate::monitor::{self, WatchConfig};
use crate::types::JobId;

use futures::future::FutureExt;
use std::sync::Arc;
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<WatcherMessage>,
    cancel_tx: Option<oneshot::Sender<()>>,
    state: WatchState,
    waiters: Vec<oneshot::Sender<WatchState>>,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<WatcherMessage>,
        backend: Arc<dyn SchedulerBackend>,
        job_id: JobId,
        config: WatchConfig,
    ) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        // poll the scheduler until the job is terminal or we are told to stop
        tokio::spawn(async move {
            let mut cancel_rx = cancel_rx.fuse();
            let state = select! {
                // a cancel that was accepted must win over a watch finishing in the same poll
                biased;
                _ = &mut cancel_rx => {
                    debug!(job_id, "watch cancelled");
                    WatchState::Cancelled
                }
                result = monitor::watch(backend.as_ref(), job_id, &config) => match result {
                    Ok(outcome) => WatchState::Finished(outcome),
                    Err(e) => {
                        warn!(job_id, error = %e, "watch aborted");
                        WatchState::Failed(e.to_string())
                    }
                },
            };
            let _ = done_tx.send(state);
        });

        tokio::spawn(async move {
            let mut actor = Self {
                inbox,
                cancel_tx: Some(cancel_tx),
                state: WatchState::Watching,
                waiters: Vec::new(),
            };
            actor.handle_messages(done_rx).await;
        });
    }

    async fn handle_messages(&mut self, done_rx: oneshot::Receiver<WatchState>) {
        use WatcherMessage::*;
        let mut done_rx = done_rx.fuse();
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    if let Some(msg) = maybe_msg {
                        match msg {
                            GetState { response } => {
                                let _ = response.send(self.state.clone());
                            }
                            Wait { response } => {
                                if self.state.is_terminal() {
                                    let _ = response.send(self.state.clone());
                                } else {
                                    self.waiters.push(response);
                                }
                            }
                            Cancel { response } => {
                                match (&self.state, self.cancel_tx.take()) {
                                    (WatchState::Watching, Some(cancel_tx)) => {
                                        // fails when the watch already finished
                                        let _ = response.send(cancel_tx.send(()).is_ok());
                                    }
                                    _ => {
                                        let _ = response.send(false);
                                    }
                                }
                            }
                        }
                    } else {
                        // every handle dropped, stop polling before we exit
                        if let Some(cancel_tx) = self.cancel_tx.take() {
                            let _ = cancel_tx.send(());
                        }
                        return;
                    }
                }
                state = &mut done_rx => {
                    self.state = state
                        .unwrap_or_else(|_| WatchState::Failed("watch task exited".into()));
                    for waiter in self.waiters.drain(..) {
                        let _ = waiter.send(self.state.clone());
                    }
                }
            }
        }
    }
}

use crate::events::WatchState;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum WatcherMessage {
    GetState {
        response: oneshot::Sender<WatchState>,
    },
    Wait {
        response: oneshot::Sender<WatchState>,
    },
    Cancel {
        response: oneshot::Sender<bool>,
    },
}

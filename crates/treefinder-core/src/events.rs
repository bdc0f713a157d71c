/// Change notifications sent from a browser to whoever renders it.
///
/// Messages carry only paths and counters; the current state is always in the
/// shared tree. The channel is bounded and sends never block an operation:
/// when the consumer falls behind, events are dropped and logged.
use crate::model::{DriveId, ResourcePath};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;

/// Maximum number of undelivered events.
///
/// A front end drains the channel after every command, so a few hundred
/// events cover even a large paste.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// A directory listing was fetched and merged.
    Listed {
        drive: DriveId,
        path: ResourcePath,
        entries: usize,
    },
    /// A cached listing was dropped and will be fetched again on demand.
    Invalidated { drive: DriveId, path: ResourcePath },
    Created { drive: DriveId, path: ResourcePath },
    Renamed {
        drive: DriveId,
        from: ResourcePath,
        to: ResourcePath,
    },
    RenameStarted { drive: DriveId, path: ResourcePath },
    Pasted {
        drive: DriveId,
        target: ResourcePath,
        succeeded: usize,
        failed: usize,
    },
    Deleted {
        drive: DriveId,
        succeeded: usize,
        failed: usize,
    },
    Downloaded {
        drive: DriveId,
        completed: usize,
        failed: usize,
    },
}

pub fn channel() -> (Sender<BrowserEvent>, Receiver<BrowserEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}

/// Deliver `event` if a sender is attached, never blocking.
pub(crate) fn emit(sender: Option<&Sender<BrowserEvent>>, event: BrowserEvent) {
    let Some(sender) = sender else {
        return;
    };
    match sender.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => warn!("event channel full, dropping {:?}", event),
        // Nobody is listening any more; that is fine.
        Err(TrySendError::Disconnected(_)) => {}
    }
}

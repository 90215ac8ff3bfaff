//! Notifications published by the sync core over `tokio::sync::broadcast`.
//!
//! [`SyncEvent`]s report the progress of a run. [`PhotoEvent`]s tell caches
//! outside the core that a stored photo changed, or that the store's owning
//! process was restarted and anything it served is stale.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PhotoEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Photo(PhotoEvent::Changed {
//!     contact_id: 7,
//!     full_fidelity: true,
//! }))
//! .ok();
//!
//! assert!(rx.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::SendError, Receiver};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Photo(PhotoEvent),
}

impl CoreEvent {
    /// Run identifier for sync events.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Sync(
                SyncEvent::Started { run_id, .. }
                | SyncEvent::ContactProcessed { run_id, .. }
                | SyncEvent::Completed { run_id, .. }
                | SyncEvent::Failed { run_id, .. }
                | SyncEvent::Cancelled { run_id, .. },
            ) => Some(run_id),
            CoreEvent::Photo(_) => None,
        }
    }
}

/// Direction chosen for a single contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactAction {
    Push,
    Pull,
    None,
}

/// Events describing one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        run_id: String,
        /// Contacts about to be processed.
        contacts: u64,
    },
    /// A contact finished, successfully or not.
    ContactProcessed {
        run_id: String,
        contact_id: i64,
        action: ContactAction,
        /// `false` when the contact was skipped or failed.
        applied: bool,
    },
    Completed {
        run_id: String,
        inserted: u64,
        updated: u64,
        deleted: u64,
        skipped: u64,
        io_errors: u64,
        duration_secs: u64,
    },
    /// The run stopped on a run-level error.
    Failed {
        run_id: String,
        message: String,
        /// The token was rejected; the host should re-authenticate.
        auth: bool,
    },
    Cancelled {
        run_id: String,
        contacts_processed: u64,
    },
}

/// Notifications for caches that hold decoded contact photos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PhotoEvent {
    /// The stored photo for a contact was replaced.
    Changed {
        contact_id: i64,
        /// `false` when only the recompressed copy could be stored.
        full_fidelity: bool,
    },
    /// The store's owning process was signalled to restart.
    ConsumerRestarted { pid: u32 },
}

/// Cloneable handle to the broadcast channel.
///
/// Emitting with no subscribers is not an error worth reporting; callers
/// discard the result with `.ok()`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Subscribers more than `capacity` events behind see `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        EventBus {
            tx: broadcast::channel(capacity).0,
        }
    }

    /// Number of receivers the event was delivered to.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.tx.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus({} subscribers)", self.subscriber_count())
    }
}

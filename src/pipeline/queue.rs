// relaycard/src/pipeline/queue.rs
//
// Request and result queues between the front end, the switcher and the
// display loop. Both are bounded FIFO channels.

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::io::RelayFlags;

/// How long a worker waits on its queue before re-checking the interrupt flag.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// What `RequestQueue::submit` does when the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Wait until the switcher frees a slot
    #[default]
    Block,
    /// Fail immediately with `QueueFull`
    Reject,
}

/// A state the card should be switched to, and how long to wait afterwards
/// before the next request is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub target: RelayFlags,
    pub settle_delay: Duration,
}

impl PendingRequest {
    pub fn new(target: RelayFlags) -> Self {
        Self {
            target,
            settle_delay: Duration::ZERO,
        }
    }

    pub fn with_delay_ms(target: RelayFlags, settle_delay_ms: u64) -> Self {
        Self {
            target,
            settle_delay: Duration::from_millis(settle_delay_ms),
        }
    }
}

/// Producer side of the request queue. Cheap to clone.
#[derive(Clone)]
pub struct RequestQueue {
    tx: std_mpsc::SyncSender<PendingRequest>,
    policy: Backpressure,
}

pub type RequestReceiver = std_mpsc::Receiver<PendingRequest>;

pub type ResultSender = std_mpsc::SyncSender<RelayFlags>;

pub type ResultReceiver = std_mpsc::Receiver<RelayFlags>;

impl RequestQueue {
    pub fn submit(&self, request: PendingRequest) -> Result<()> {
        match self.policy {
            Backpressure::Block => self
                .tx
                .send(request)
                .map_err(|_| RelayError::QueueClosed),
            Backpressure::Reject => self.tx.try_send(request).map_err(|e| match e {
                std_mpsc::TrySendError::Full(_) => RelayError::QueueFull,
                std_mpsc::TrySendError::Disconnected(_) => RelayError::QueueClosed,
            }),
        }
    }

    pub fn policy(&self) -> Backpressure {
        self.policy
    }
}

/// Bounded request queue. A capacity of 0 is raised to 1.
pub fn request_queue(capacity: usize, policy: Backpressure) -> (RequestQueue, RequestReceiver) {
    let (tx, rx) = std_mpsc::sync_channel(capacity.max(1));
    (RequestQueue { tx, policy }, rx)
}

/// Bounded queue of confirmed states. A capacity of 0 is raised to 1.
pub fn result_queue(capacity: usize) -> (ResultSender, ResultReceiver) {
    std_mpsc::sync_channel(capacity.max(1))
}

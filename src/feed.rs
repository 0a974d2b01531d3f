//! Settlement update feed.
//!
//! Services publish every payment, withdrawal and refund state transition
//! here. Subscribers get a lazy stream of the updates published after they
//! subscribed; dropping the subscription unsubscribes.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Updates buffered per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Payment,
    Withdrawal,
    Refund,
}

/// One state transition visible to the event's organizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementUpdate {
    pub organizer_id: Uuid,
    pub event_id: Uuid,
    pub kind: SettlementKind,
    /// Id of the payment, withdrawal or refund record.
    pub id: Uuid,
    /// New status, lowercase as stored.
    pub status: String,
    pub amount_minor: i64,
}

#[derive(Debug, Clone)]
pub struct SettlementFeed {
    sender: broadcast::Sender<SettlementUpdate>,
}

impl Default for SettlementFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SettlementFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Publish an update. Having no subscribers is not an error.
    pub fn publish(&self, update: SettlementUpdate) {
        let _ = self.sender.send(update);
    }

    /// Subscribe to updates for one organizer, or to everything (`None`).
    pub fn subscribe(&self, organizer_id: Option<Uuid>) -> SettlementSubscription {
        SettlementSubscription {
            receiver: self.sender.subscribe(),
            organizer_id,
        }
    }
}

pub struct SettlementSubscription {
    receiver: broadcast::Receiver<SettlementUpdate>,
    organizer_id: Option<Uuid>,
}

impl SettlementSubscription {
    /// Wait for the next matching update. `None` once the feed is gone.
    ///
    /// A subscriber that fell behind skips the updates it missed.
    pub async fn next(&mut self) -> Option<SettlementUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => {
                    if self.organizer_id.is_none_or(|id| id == update.organizer_id) {
                        return Some(update);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "settlement subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

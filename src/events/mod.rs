use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after each committed lifecycle transition.
///
/// Consumers (webhooks, sync jobs, dashboards) subscribe downstream; the
/// engine only guarantees an event is sent after the write landed, never
/// before.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    UnitReceived {
        unit_id: Uuid,
        code: String,
        location_id: Uuid,
    },
    TransferDrafted {
        transfer_id: Uuid,
        unit_id: Uuid,
    },
    TransferApproved(Uuid),
    TransferDispatched {
        transfer_id: Uuid,
        unit_id: Uuid,
        source_location_id: Uuid,
        destination_location_id: Uuid,
    },
    TransferCompleted {
        transfer_id: Uuid,
        unit_id: Uuid,
        destination_location_id: Uuid,
    },
    TransferCancelled(Uuid),
    UnitDamaged {
        unit_id: Uuid,
        reason: String,
    },
    UnitAudited {
        unit_id: Uuid,
        variance: Decimal,
    },
    LabelReprinted(Uuid),
    UnitSplit {
        parent_id: Uuid,
        tier_id: Uuid,
        child_count: u32,
    },
    /// Generic event for custom messages.
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Builds a bounded event channel; pass the receiver to [`process_events`]
/// or a custom consumer.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Default drain: logs every event until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::UnitReceived { unit_id, code, .. } => {
                info!(unit_id = %unit_id, code = %code, "Unit received");
            }
            Event::TransferDispatched {
                transfer_id,
                unit_id,
                ..
            } => {
                info!(transfer_id = %transfer_id, unit_id = %unit_id, "Transfer dispatched");
            }
            Event::TransferCompleted {
                transfer_id,
                unit_id,
                ..
            } => {
                info!(transfer_id = %transfer_id, unit_id = %unit_id, "Transfer completed");
            }
            Event::UnitDamaged { unit_id, reason } => {
                warn!(unit_id = %unit_id, reason = %reason, "Unit damaged");
            }
            Event::UnitSplit {
                parent_id,
                child_count,
                ..
            } => {
                info!(parent_id = %parent_id, child_count = %child_count, "Unit split");
            }
            other => {
                info!(event = ?other, "Event processed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_once_the_receiver_is_gone() {
        let (sender, rx) = channel(4);
        drop(rx);
        let result = sender
            .send(Event::TransferApproved(Uuid::new_v4()))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (sender, mut rx) = channel(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        sender.send(Event::TransferApproved(a)).await.unwrap();
        sender.send(Event::TransferCancelled(b)).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Event::TransferApproved(id)) if id == a));
        assert!(matches!(rx.recv().await, Some(Event::TransferCancelled(id)) if id == b));
    }
}

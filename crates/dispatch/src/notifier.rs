/*!
 * Live-Session Notifier
 *
 * Pushes workflow progress to the emitting user's live session over
 * per-owner in-memory broadcast channels. Delivery here is best-effort;
 * durable state always lives in the subscription store. The admin API
 * exposes an owner's channel as an SSE stream.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffered messages per owner channel before slow consumers lag.
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Message shapes pushed to a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowMessage {
    /// An event matched a subscription and a job was enqueued
    #[serde(rename = "workflow_triggered")]
    Triggered {
        job_id: Uuid,
        webhook_id: Uuid,
        event_type: String,
        timestamp: i64,
    },

    /// An attempt settled without finishing the job (a retry was scheduled)
    #[serde(rename = "workflow_execution_update")]
    ExecutionUpdate {
        job_id: Uuid,
        webhook_id: Uuid,
        attempt_number: i32,
        status: String,
        next_retry_at: Option<i64>,
        timestamp: i64,
    },

    /// The job reached a terminal status
    #[serde(rename = "workflow_execution_complete")]
    ExecutionComplete {
        job_id: Uuid,
        webhook_id: Uuid,
        success: bool,
        attempts: i32,
        timestamp: i64,
    },
}

/// Per-owner broadcast hub.
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<WorkflowMessage>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a message to the owner's live session.
    ///
    /// A send with no subscribers is not an error; the message is simply
    /// dropped.
    pub fn notify(&self, owner_id: &str, message: WorkflowMessage) {
        let channels = self.channels.lock().expect("notifier lock poisoned");
        if let Some(tx) = channels.get(owner_id) {
            let _ = tx.send(message);
        }
    }

    /// Subscribe to an owner's channel, creating it on first use.
    pub fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<WorkflowMessage> {
        let mut channels = self.channels.lock().expect("notifier lock poisoned");
        channels
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER_SIZE).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_messages() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe("owner-1");

        notifier.notify(
            "owner-1",
            WorkflowMessage::Triggered {
                job_id: Uuid::new_v4(),
                webhook_id: Uuid::new_v4(),
                event_type: "app.created".to_string(),
                timestamp: 1_700_000_000_000,
            },
        );

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, WorkflowMessage::Triggered { .. }));
    }

    #[test]
    fn test_notify_without_subscribers_is_non_fatal() {
        let notifier = Notifier::new();
        // No channel exists for this owner; must not panic or error
        notifier.notify(
            "nobody",
            WorkflowMessage::ExecutionComplete {
                job_id: Uuid::new_v4(),
                webhook_id: Uuid::new_v4(),
                success: true,
                attempts: 1,
                timestamp: 0,
            },
        );
    }

    #[tokio::test]
    async fn test_channels_are_owner_scoped() {
        let notifier = Notifier::new();
        let mut mine = notifier.subscribe("owner-1");
        let _theirs = notifier.subscribe("owner-2");

        notifier.notify(
            "owner-2",
            WorkflowMessage::ExecutionComplete {
                job_id: Uuid::new_v4(),
                webhook_id: Uuid::new_v4(),
                success: true,
                attempts: 1,
                timestamp: 0,
            },
        );

        assert!(matches!(mine.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[test]
    fn test_message_serialization_shape() {
        let msg = WorkflowMessage::ExecutionComplete {
            job_id: Uuid::nil(),
            webhook_id: Uuid::nil(),
            success: true,
            attempts: 2,
            timestamp: 5,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "workflow_execution_complete");
        assert_eq!(json["attempts"], 2);
    }
}

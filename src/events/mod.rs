//! Real-time mission update fan-out.
//!
//! Every state mutation in the mission manager publishes a typed event on a
//! broadcast channel. WebSocket handlers subscribe and forward events for
//! their mission to the client. Publishing never fails the mutation: if no
//! subscriber is listening the event is simply dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Events emitted as a mission's state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionEvent {
    Status {
        mission_id: String,
        status: String,
        error_info: Option<String>,
    },
    Plan {
        mission_id: String,
        plan: serde_json::Value,
    },
    Notes {
        mission_id: String,
        note_count: usize,
    },
    Draft {
        mission_id: String,
        draft: String,
    },
    Logs {
        mission_id: String,
        entry: serde_json::Value,
    },
    GoalPad {
        mission_id: String,
        goals: serde_json::Value,
    },
    ThoughtPad {
        mission_id: String,
        thoughts: serde_json::Value,
    },
    Scratchpad {
        mission_id: String,
        content: Option<String>,
    },
    Stats {
        mission_id: String,
        stats: serde_json::Value,
    },
    Phase {
        mission_id: String,
        phase: String,
    },
}

impl MissionEvent {
    pub fn mission_id(&self) -> &str {
        match self {
            MissionEvent::Status { mission_id, .. }
            | MissionEvent::Plan { mission_id, .. }
            | MissionEvent::Notes { mission_id, .. }
            | MissionEvent::Draft { mission_id, .. }
            | MissionEvent::Logs { mission_id, .. }
            | MissionEvent::GoalPad { mission_id, .. }
            | MissionEvent::ThoughtPad { mission_id, .. }
            | MissionEvent::Scratchpad { mission_id, .. }
            | MissionEvent::Stats { mission_id, .. }
            | MissionEvent::Phase { mission_id, .. } => mission_id,
        }
    }
}

/// Broadcast bus shared between the mission manager and WebSocket handlers.
#[derive(Debug, Clone)]
pub struct UpdateBus {
    sender: broadcast::Sender<MissionEvent>,
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Send errors (no active subscribers) are ignored.
    pub fn publish(&self, event: MissionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MissionEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = UpdateBus::new();
        bus.publish(MissionEvent::Phase {
            mission_id: "m1".to_string(),
            phase: "writing".to_string(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = UpdateBus::new();
        let mut rx = bus.subscribe();

        bus.publish(MissionEvent::Status {
            mission_id: "m1".to_string(),
            status: "running".to_string(),
            error_info: None,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.mission_id(), "m1");
        match event {
            MissionEvent::Status { status, .. } => assert_eq!(status, "running"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = MissionEvent::Scratchpad {
            mission_id: "m1".to_string(),
            content: Some("working notes".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scratchpad");
        assert_eq!(json["mission_id"], "m1");
    }
}

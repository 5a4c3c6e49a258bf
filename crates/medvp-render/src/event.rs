//! Completion notifications sent to external listeners.

use crate::viewport::{ViewportId, ViewportStatus};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tracing::trace;

/// Events emitted by a rendering engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderEvent {
    /// A viewport's new frame is on its canvas
    #[serde(rename_all = "camelCase")]
    ImageRendered {
        element: String,
        viewport_id: ViewportId,
        rendering_engine_id: String,
        viewport_status: ViewportStatus,
    },
}

impl RenderEvent {
    pub fn viewport_id(&self) -> &ViewportId {
        match self {
            Self::ImageRendered { viewport_id, .. } => viewport_id,
        }
    }
}

/// Fan-out of events to any number of subscribers
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<RenderEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<RenderEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn emit(&mut self, event: RenderEvent) {
        trace!("Emitting {:?}", event);
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> RenderEvent {
        RenderEvent::ImageRendered {
            element: format!("{id}-canvas"),
            viewport_id: ViewportId::new(id),
            rendering_engine_id: "engine".to_string(),
            viewport_status: ViewportStatus::Rendered,
        }
    }

    #[test]
    fn test_fan_out_and_prune() {
        let mut bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        drop(rx2);

        bus.emit(event("a"));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx1.try_recv().unwrap().viewport_id(), &ViewportId::new("a"));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(event("a")).unwrap();
        assert_eq!(json["type"], "imageRendered");
        assert_eq!(json["viewportId"], "a");
        assert_eq!(json["renderingEngineId"], "engine");
        assert_eq!(json["viewportStatus"], "rendered");
    }
}

use glam::Vec3;
use scene_graph::NodeId;

/// Fired when playback crosses a key of an event track.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimEvent {
    /// Name of the event track.
    pub name: String,
    /// Name of the animation the track belongs to.
    pub animation: String,
    /// Time of the key, in ticks.
    pub time: f32,
    pub value: Vec3,
}

/// Events produced during a tick, in production order, waiting for a dispatcher to drain them.
#[derive(Debug, Default)]
pub struct AnimEventQueue {
    events: Vec<(NodeId, AnimEvent)>,
}

impl AnimEventQueue {
    pub fn push(&mut self, node: NodeId, event: AnimEvent) {
        self.events.push((node, event));
    }

    pub fn extend(&mut self, node: NodeId, events: impl IntoIterator<Item = AnimEvent>) {
        self.events.extend(events.into_iter().map(|event| (node, event)));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn pending(&self) -> &[(NodeId, AnimEvent)] {
        &self.events
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (NodeId, AnimEvent)> + '_ {
        self.events.drain(..)
    }

    /// Hand every pending event to `handler` and clear the queue.
    pub fn dispatch(&mut self, mut handler: impl FnMut(NodeId, &AnimEvent)) {
        for (node, event) in self.events.drain(..) {
            handler(node, &event);
        }
    }
}

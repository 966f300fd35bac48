// Synchronous in-process publish/subscribe keyed by event kind.

use crate::domain::{Event, EventKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type Subscriber = Box<dyn FnMut(&Event) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callbacks run on the publishing thread, in registration order.
///
/// Subscribers must not block; anything slow (network sends) belongs on a
/// channel drained by another task.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<(SubscriptionId, Subscriber)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = self.allocate_id();
        self.subscribers
            .entry(kind)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Registers one callback for several kinds under a single subscription id.
    pub fn subscribe_many<F>(&mut self, kinds: &[EventKind], callback: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        let callback = Arc::new(callback);
        for kind in kinds {
            let callback = Arc::clone(&callback);
            self.subscribers
                .entry(*kind)
                .or_default()
                .push((id, Box::new(move |event: &Event| callback(event))));
        }
        id
    }

    /// Removes every callback registered under `id`; returns false if none were found.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for list in self.subscribers.values_mut() {
            let before = list.len();
            list.retain(|(sub_id, _)| *sub_id != id);
            removed |= list.len() != before;
        }
        removed
    }

    pub fn publish(&mut self, event: &Event) {
        if let Some(list) = self.subscribers.get_mut(&event.kind) {
            for (_, callback) in list.iter_mut() {
                callback(event);
            }
        }
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self
            .subscribers
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

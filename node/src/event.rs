//! Events emitted while parsing blocks.

use bsq_types::{Amount, BlockHash};

/// Parse-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseEvent {
    /// A block was classified and committed.
    BlockParsed {
        height: u32,
        hash: BlockHash,
        token_txs: usize,
        burnt_fee: Amount,
    },
    /// A block did not connect to the chain head; a resync is needed.
    NonConnecting {
        height: u32,
        prev_hash: BlockHash,
        head_height: u32,
    },
    /// A new in-memory snapshot candidate was taken.
    SnapshotCaptured { height: u32 },
    /// The previous candidate was written to durable storage.
    SnapshotPersisted { height: u32 },
}

type Listener = Box<dyn Fn(&ParseEvent) + Send + Sync>;

/// Synchronous fan-out event bus.
///
/// Listeners run inline on the parse worker; keep them fast.
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&ParseEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&self, event: &ParseEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&counter);
        bus.subscribe(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        bus.emit(&ParseEvent::SnapshotCaptured { height: 100 });
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn listener_sees_event_variant() {
        let forks = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::default();
        let f = Arc::clone(&forks);
        bus.subscribe(move |event| {
            if matches!(event, ParseEvent::NonConnecting { .. }) {
                f.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.emit(&ParseEvent::BlockParsed {
            height: 1,
            hash: BlockHash::ZERO,
            token_txs: 0,
            burnt_fee: Amount::ZERO,
        });
        bus.emit(&ParseEvent::NonConnecting {
            height: 3,
            prev_hash: BlockHash::ZERO,
            head_height: 1,
        });
        assert_eq!(forks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count(), 0);
        bus.emit(&ParseEvent::SnapshotPersisted { height: 1 });
    }
}

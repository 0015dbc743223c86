//! Append-only shared log with a consumer registry
//!
//! The log is a singly linked list of [`LogNode`]s. Readers hold an
//! `Arc` to the last node they consumed and follow `next` links forward;
//! nodes nobody references any more are freed by reference counting.

use crate::observe;
use crate::traits::LogConsumer;
use crate::types::{ConsumerId, Packet};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// One link in the shared log
///
/// `next` is assigned exactly once, by the log, when the following node is
/// appended.
pub struct LogNode<T> {
    packet: Option<Packet<T>>,
    next: OnceLock<Arc<LogNode<T>>>,
}

impl<T> LogNode<T> {
    fn sentinel() -> Self {
        Self {
            packet: None,
            next: OnceLock::new(),
        }
    }

    fn with_packet(packet: Packet<T>) -> Self {
        Self {
            packet: Some(packet),
            next: OnceLock::new(),
        }
    }

    /// Packet carried by this node; `None` only for the initial sentinel
    pub fn packet(&self) -> Option<&Packet<T>> {
        self.packet.as_ref()
    }

    /// Following node, or `None` while this node is the tail
    pub fn next(&self) -> Option<&Arc<LogNode<T>>> {
        self.next.get()
    }

    pub fn is_tail(&self) -> bool {
        self.next.get().is_none()
    }
}

impl<T> Drop for LogNode<T> {
    // Unlink iteratively so a long unreferenced chain does not recurse once per node.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T> std::fmt::Debug for LogNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogNode")
            .field("has_packet", &self.packet.is_some())
            .field("is_tail", &self.is_tail())
            .finish()
    }
}

/// Counters describing the log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    /// Packets appended since creation
    pub appended: u64,

    /// Consumers currently registered
    pub consumers: usize,
}

struct LogState<T, C> {
    tail: Arc<LogNode<T>>,
    consumers: HashMap<ConsumerId, Arc<C>>,
    next_consumer_id: ConsumerId,
    appended: u64,
}

/// Writable shared log
///
/// Appends and registry changes are serialized by a single mutex. A consumer
/// registered through [`SharedLog::register`] receives a cursor positioned at
/// the tail as of registration, and is charged backpressure for exactly the
/// packets appended after that point.
pub struct SharedLog<T, C> {
    state: Mutex<LogState<T, C>>,
}

impl<T, C> SharedLog<T, C>
where
    C: LogConsumer<T>,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                tail: Arc::new(LogNode::sentinel()),
                consumers: HashMap::new(),
                next_consumer_id: 1,
                appended: 0,
            }),
        }
    }

    /// Append a packet and wake every consumer that accepts it
    pub fn append(&self, packet: Packet<T>) -> Arc<LogNode<T>> {
        let kind = packet.kind();
        let node = Arc::new(LogNode::with_packet(packet));

        let woken: Vec<Arc<C>> = {
            let mut state = self.state.lock();

            let mut woken = Vec::new();
            if let Some(packet) = node.packet() {
                for consumer in state.consumers.values() {
                    if consumer.accepts(packet) {
                        consumer.apply_backpressure(packet);
                        woken.push(consumer.clone());
                    }
                }
            }

            let linked = state.tail.next.set(node.clone());
            debug_assert!(linked.is_ok(), "tail node already had a successor");

            state.tail = node.clone();
            state.appended += 1;
            woken
        };

        tracing::trace!(kind, woken = woken.len(), "Appended packet");
        observe::record_append(kind);

        for consumer in woken {
            consumer.wake();
        }

        node
    }

    /// Current tail node
    pub fn tail(&self) -> Arc<LogNode<T>> {
        self.state.lock().tail.clone()
    }

    /// Allocate an id, build the consumer and register it, all atomically
    /// with respect to appends
    ///
    /// Returns the consumer together with its starting cursor (the tail at
    /// registration time). `build` runs under the log lock and must not call
    /// back into the log.
    pub fn register<F>(&self, build: F) -> (Arc<C>, Arc<LogNode<T>>)
    where
        F: FnOnce(ConsumerId) -> C,
    {
        let mut state = self.state.lock();
        let id = state.next_consumer_id;
        state.next_consumer_id += 1;

        let consumer = Arc::new(build(id));
        state.consumers.insert(id, consumer.clone());
        observe::set_live_consumers(state.consumers.len());

        (consumer, state.tail.clone())
    }

    /// Remove a consumer from the registry, returning it if it was present
    pub fn deregister(&self, id: ConsumerId) -> Option<Arc<C>> {
        let mut state = self.state.lock();
        let removed = state.consumers.remove(&id);
        observe::set_live_consumers(state.consumers.len());
        removed
    }

    pub fn consumer(&self, id: ConsumerId) -> Option<Arc<C>> {
        self.state.lock().consumers.get(&id).cloned()
    }

    /// Snapshot of every registered consumer, ordered by id
    pub fn consumers(&self) -> Vec<Arc<C>> {
        let state = self.state.lock();
        let mut ids: Vec<_> = state.consumers.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .filter_map(|id| state.consumers.get(id).cloned())
            .collect()
    }

    pub fn consumer_count(&self) -> usize {
        self.state.lock().consumers.len()
    }

    pub fn stats(&self) -> LogStats {
        let state = self.state.lock();
        LogStats {
            appended: state.appended,
            consumers: state.consumers.len(),
        }
    }
}

impl<T, C> Default for SharedLog<T, C>
where
    C: LogConsumer<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StreamItem, Target};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingConsumer {
        id: ConsumerId,
        stream: String,
        pending: AtomicU64,
        wakes: AtomicU64,
    }

    impl CountingConsumer {
        fn new(id: ConsumerId, stream: &str) -> Self {
            Self {
                id,
                stream: stream.to_string(),
                pending: AtomicU64::new(0),
                wakes: AtomicU64::new(0),
            }
        }
    }

    impl LogConsumer<u32> for CountingConsumer {
        fn accepts(&self, packet: &Packet<u32>) -> bool {
            match &packet.target {
                Target::Stream(name) => *name == self.stream,
                Target::Consumer(id) => *id == self.id,
                Target::All => true,
            }
        }

        fn apply_backpressure(&self, _packet: &Packet<u32>) {
            self.pending.fetch_add(1, Ordering::SeqCst);
        }

        fn wake(&self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn values_after(cursor: &Arc<LogNode<u32>>) -> Vec<u32> {
        let mut values = Vec::new();
        let mut node = cursor.clone();
        while let Some(next) = node.next().cloned() {
            if let Some(StreamItem::Value(v)) = next.packet().map(|p| &p.item) {
                values.push(*v);
            }
            node = next;
        }
        values
    }

    #[test]
    fn test_append_links_in_order() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        let head = log.tail();
        assert!(head.is_tail());
        assert!(head.packet().is_none());

        for i in 0..5 {
            log.append(Packet::data(Target::stream("a"), i));
        }

        assert_eq!(values_after(&head), vec![0, 1, 2, 3, 4]);
        assert!(log.tail().is_tail());
        assert_eq!(log.stats().appended, 5);
    }

    #[test]
    fn test_register_starts_at_tail() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        log.append(Packet::data(Target::stream("a"), 1));
        log.append(Packet::data(Target::stream("a"), 2));

        let (consumer, cursor) = log.register(|id| CountingConsumer::new(id, "a"));
        assert!(cursor.is_tail());
        assert_eq!(consumer.pending.load(Ordering::SeqCst), 0);

        log.append(Packet::data(Target::stream("a"), 3));
        assert_eq!(values_after(&cursor), vec![3]);
        assert_eq!(consumer.pending.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backpressure_only_for_accepted_packets() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        let (a, _) = log.register(|id| CountingConsumer::new(id, "a"));
        let (b, _) = log.register(|id| CountingConsumer::new(id, "b"));

        log.append(Packet::data(Target::stream("a"), 1));
        log.append(Packet::data(Target::stream("a"), 2));
        log.append(Packet::data(Target::stream("b"), 3));
        log.append(Packet::data(Target::Consumer(b.id), 4));
        log.append(Packet::end(Target::All, None));

        assert_eq!(a.pending.load(Ordering::SeqCst), 3);
        assert_eq!(a.wakes.load(Ordering::SeqCst), 3);
        assert_eq!(b.pending.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_ids_are_unique() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        let (first, _) = log.register(|id| CountingConsumer::new(id, "a"));
        let (second, _) = log.register(|id| CountingConsumer::new(id, "a"));
        log.deregister(first.id);
        let (third, _) = log.register(|id| CountingConsumer::new(id, "a"));

        assert_ne!(first.id, second.id);
        assert_ne!(third.id, first.id);
        assert_ne!(third.id, second.id);
    }

    #[test]
    fn test_deregister_stops_delivery() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        let (consumer, _) = log.register(|id| CountingConsumer::new(id, "a"));
        assert_eq!(log.consumer_count(), 1);

        let removed = log.deregister(consumer.id).unwrap();
        assert_eq!(removed.id, consumer.id);
        assert!(log.deregister(consumer.id).is_none());
        assert!(log.consumer(consumer.id).is_none());

        log.append(Packet::data(Target::stream("a"), 1));
        assert_eq!(consumer.pending.load(Ordering::SeqCst), 0);
        assert_eq!(log.stats().consumers, 0);
    }

    #[test]
    fn test_consumers_snapshot_ordered() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        for stream in ["a", "b", "c"] {
            log.register(|id| CountingConsumer::new(id, stream));
        }

        let ids: Vec<_> = log.consumers().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_long_chain_drops_without_recursion() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        let head = log.tail();
        for i in 0..300_000 {
            log.append(Packet::data(Target::stream("a"), i));
        }
        drop(log);
        drop(head);
    }

    #[test]
    fn test_unreferenced_nodes_are_released() {
        let log: SharedLog<u32, CountingConsumer> = SharedLog::new();
        let first = log.append(Packet::data(Target::stream("a"), 1));
        let weak = Arc::downgrade(&first);
        drop(first);

        // Only the log's tail pointer kept it alive
        assert!(weak.upgrade().is_some());
        log.append(Packet::data(Target::stream("a"), 2));
        assert!(weak.upgrade().is_none());
    }
}

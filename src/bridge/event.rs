//! Bridge events and their pooled allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;
use serde::Serialize;

use super::types::{AccountState, MarketSnapshot, OrderSide, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    OrderUpdate,
    MarketSnapshot,
    AccountUpdate,
    PositionUpdate,
    SystemEvent,
}

#[derive(Debug, Clone, Serialize)]
pub enum EventPayload {
    OrderUpdate {
        client_id: String,
        symbol: String,
        side: OrderSide,
        quantity: f64,
        price: f64,
        cancelled: bool,
    },
    MarketSnapshot(MarketSnapshot),
    AccountUpdate(AccountState),
    PositionUpdate(Position),
    SystemEvent { message: String },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::OrderUpdate { .. } => EventType::OrderUpdate,
            Self::MarketSnapshot(_) => EventType::MarketSnapshot,
            Self::AccountUpdate(_) => EventType::AccountUpdate,
            Self::PositionUpdate(_) => EventType::PositionUpdate,
            Self::SystemEvent { .. } => EventType::SystemEvent,
        }
    }
}

/// A pooled, reference-counted event. `id` is `0` until [`EventPool::publish`]
/// assigns the next monotonic value. Cloning is an `Arc` bump, not a copy:
/// every subscription holds the same allocation, and it returns to the pool
/// once the last clone drops.
#[derive(Debug, Clone)]
pub struct BridgeEvent {
    pub id: u64,
    pub payload: std::sync::Arc<EventPayload>,
}

impl BridgeEvent {
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// Fixed-capacity free-list of live `Arc<EventPayload>` slots. A publish
/// that finds a free slot reuses its allocation in place via
/// [`Arc::get_mut`] instead of allocating a new `Arc`; allocation
/// exhaustion falls back to the heap rather than blocking the publish
/// path. Both paths are counted.
pub struct EventPool {
    free_list: ArrayQueue<std::sync::Arc<EventPayload>>,
    next_id: AtomicU64,
    allocated: AtomicU64,
    total_allocations: AtomicU64,
    heap_fallbacks: AtomicU64,
}

impl EventPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free_list: ArrayQueue::new(capacity.max(1)),
            next_id: AtomicU64::new(1),
            allocated: AtomicU64::new(0),
            total_allocations: AtomicU64::new(0),
            heap_fallbacks: AtomicU64::new(0),
        }
    }

    /// Takes ownership of `payload`, assigns the next monotonic id, and
    /// returns a fresh handle. A slot popped off the free list is reused
    /// in place through [`Arc::get_mut`]; since nothing is pushed back
    /// onto the free list while still shared (see [`Self::release`]),
    /// `get_mut` always succeeds there. The defensive fallback only
    /// triggers when the list is empty.
    pub fn publish(&self, payload: EventPayload) -> BridgeEvent {
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.allocated.fetch_add(1, Ordering::Relaxed);

        let arc = match self.free_list.pop() {
            Some(mut slot) => match std::sync::Arc::get_mut(&mut slot) {
                Some(slot_ref) => {
                    *slot_ref = payload;
                    slot
                }
                None => {
                    self.heap_fallbacks.fetch_add(1, Ordering::Relaxed);
                    std::sync::Arc::new(payload)
                }
            },
            None => {
                self.heap_fallbacks.fetch_add(1, Ordering::Relaxed);
                std::sync::Arc::new(payload)
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        BridgeEvent { id, payload: arc }
    }

    /// Called by the publisher and by every subscription once its delivery
    /// of `event` completes. Only the caller holding the last `Arc` clone
    /// observes `Arc::get_mut` succeed; it reclaims the slot into the free
    /// list and decrements `allocated`. Earlier callers are no-ops, since
    /// another reference is still live. All clones of a given event's
    /// `Arc` are made at dispatch time, before any release runs, so the
    /// clone count only ever falls afterward: a successful `get_mut` here
    /// is never raced by a later clone.
    pub fn release(&self, mut event: BridgeEvent) {
        if std::sync::Arc::get_mut(&mut event.payload).is_some() {
            self.allocated.fetch_sub(1, Ordering::Relaxed);
            let _ = self.free_list.push(event.payload);
        }
    }

    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn total_allocations(&self) -> u64 {
        self.total_allocations.load(Ordering::Relaxed)
    }

    pub fn heap_fallbacks(&self) -> u64 {
        self.heap_fallbacks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_assigns_monotonic_ids() {
        let pool = EventPool::new(4);
        let a = pool.publish(EventPayload::SystemEvent { message: "a".into() });
        let b = pool.publish(EventPayload::SystemEvent { message: "b".into() });
        assert!(b.id > a.id);
        assert_ne!(a.id, 0);
    }

    #[test]
    fn exhausted_pool_falls_back_to_heap() {
        let pool = EventPool::new(1);
        let _a = pool.publish(EventPayload::SystemEvent { message: "a".into() });
        let _b = pool.publish(EventPayload::SystemEvent { message: "b".into() });
        assert!(pool.heap_fallbacks() >= 1);
    }

    #[test]
    fn release_returns_slot_to_free_list() {
        let pool = EventPool::new(2);
        let event = pool.publish(EventPayload::SystemEvent { message: "a".into() });
        assert_eq!(pool.allocated(), 1);
        pool.release(event);
        assert_eq!(pool.allocated(), 0);
    }

    #[test]
    fn release_then_publish_reuses_the_same_allocation() {
        let pool = EventPool::new(1);
        let first = pool.publish(EventPayload::SystemEvent { message: "a".into() });
        let first_ptr = std::sync::Arc::as_ptr(&first.payload);
        pool.release(first);

        let second = pool.publish(EventPayload::SystemEvent { message: "b".into() });
        assert_eq!(std::sync::Arc::as_ptr(&second.payload), first_ptr);
        assert_eq!(pool.heap_fallbacks(), 1);
        assert_eq!(pool.total_allocations(), 2);
    }

    #[test]
    fn release_is_a_no_op_while_another_clone_is_live() {
        let pool = EventPool::new(2);
        let event = pool.publish(EventPayload::SystemEvent { message: "a".into() });
        let clone = event.clone();
        pool.release(event);
        assert_eq!(pool.allocated(), 1, "still held by `clone`");
        pool.release(clone);
        assert_eq!(pool.allocated(), 0);
    }
}

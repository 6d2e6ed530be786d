//! Subscriptions and the RCU-style subscription table.
//!
//! Each subscription owns a dedicated worker thread that drains its lane
//! and invokes the callback — the publish path only ever pushes into a
//! lock-free queue and pings a coalescing notify channel, so one slow
//! subscriber callback can never stall another subscriber or the
//! publisher itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam::channel;
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;

use super::event::{BridgeEvent, EventPool, EventType};

pub type EventCallback = Box<dyn Fn(BridgeEvent) + Send + Sync + 'static>;

enum WorkerMsg {
    Wake,
    Shutdown,
}

pub struct Subscription {
    pub id: u64,
    pub filter: Option<EventType>,
    lane: Arc<ArrayQueue<BridgeEvent>>,
    wake_tx: channel::Sender<WorkerMsg>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl Subscription {
    fn new(
        id: u64,
        filter: Option<EventType>,
        callback: EventCallback,
        pool: Arc<EventPool>,
        lane_capacity: usize,
    ) -> Arc<Self> {
        let lane: Arc<ArrayQueue<BridgeEvent>> = Arc::new(ArrayQueue::new(lane_capacity.max(1)));
        let (wake_tx, wake_rx) = channel::bounded(1);

        let worker_lane = Arc::clone(&lane);
        let worker_handle = std::thread::Builder::new()
            .name(format!("bridge-sub-{id}"))
            .spawn(move || loop {
                let msg = wake_rx.recv();
                while let Some(event) = worker_lane.pop() {
                    callback(event.clone());
                    pool.release(event);
                }
                match msg {
                    Ok(WorkerMsg::Wake) => continue,
                    Ok(WorkerMsg::Shutdown) | Err(_) => break,
                }
            })
            .expect("failed to spawn subscription worker thread");

        Arc::new(Self {
            id,
            filter,
            lane,
            wake_tx,
            worker: Mutex::new(Some(worker_handle)),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn matches(&self, event_type: EventType) -> bool {
        self.filter.map_or(true, |f| f == event_type)
    }

    /// Drop-oldest on overflow: the evicted event (if any) is handed back
    /// for pool release by the caller, since the subscription itself
    /// doesn't hold a pool reference.
    fn deliver(&self, event: BridgeEvent) -> Option<BridgeEvent> {
        let evicted = self.lane.force_push(event);
        if evicted.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.wake_tx.try_send(WorkerMsg::Wake);
        evicted
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Blocks until the worker thread has observed shutdown and drained
    /// whatever was already queued. After this returns, the callback is
    /// guaranteed never to run again.
    fn shutdown(&self) {
        // A pending coalesced Wake may occupy the slot; a blocking send
        // waits for the worker to drain it before accepting Shutdown.
        if self.wake_tx.send(WorkerMsg::Shutdown).is_ok() {
            if let Some(handle) = self.worker.lock().take() {
                let _ = handle.join();
            }
        }
    }
}

/// Multi-reader/single-writer registry. Mutation takes the exclusive
/// lock, builds a new snapshot `Vec`, and swaps it in; dispatch only ever
/// reads the current snapshot without blocking concurrent subscribe calls.
pub struct SubscriptionTable {
    snapshot: ArcSwap<Vec<Arc<Subscription>>>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    max_subscriptions: usize,
}

impl SubscriptionTable {
    pub fn new(max_subscriptions: usize) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            max_subscriptions,
        }
    }

    pub fn subscribe(
        &self,
        filter: Option<EventType>,
        callback: EventCallback,
        pool: Arc<EventPool>,
        lane_capacity: usize,
    ) -> Option<u64> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load();
        if current.len() >= self.max_subscriptions {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sub = Subscription::new(id, filter, callback, pool, lane_capacity);

        let mut next: Vec<Arc<Subscription>> = (**current).clone();
        next.push(sub);
        self.snapshot.store(Arc::new(next));
        Some(id)
    }

    /// No-op on an unknown id. Otherwise synchronously waits for the
    /// subscription's worker thread to stop before returning.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = {
            let _guard = self.write_lock.lock();
            let current = self.snapshot.load();
            let mut next: Vec<Arc<Subscription>> = Vec::with_capacity(current.len());
            let mut removed = None;
            for sub in current.iter() {
                if sub.id == id {
                    removed = Some(Arc::clone(sub));
                } else {
                    next.push(Arc::clone(sub));
                }
            }
            if removed.is_some() {
                self.snapshot.store(Arc::new(next));
            }
            removed
        };
        match removed {
            Some(sub) => {
                sub.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn unsubscribe_all(&self) {
        let drained = {
            let _guard = self.write_lock.lock();
            let current = self.snapshot.swap(Arc::new(Vec::new()));
            (*current).clone()
        };
        for sub in drained {
            sub.shutdown();
        }
    }

    /// Snapshot read used by the dispatcher; never blocks a concurrent
    /// subscribe/unsubscribe.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Subscription>>> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// `None` for an unknown id, otherwise that subscription's drop-oldest
    /// eviction count so far.
    pub fn dropped_count(&self, id: u64) -> Option<u64> {
        self.snapshot
            .load()
            .iter()
            .find(|sub| sub.id == id)
            .map(|sub| sub.dropped_count())
    }
}

/// Fan out `event` to every subscription in `targets` whose filter
/// matches. Evicted (drop-oldest) events are released back to `pool`
/// immediately; delivered events are released by each subscription's
/// worker thread once its callback returns.
pub fn dispatch(
    targets: &[Arc<Subscription>],
    event: &BridgeEvent,
    pool: &EventPool,
) {
    let event_type = event.event_type();
    for sub in targets {
        if sub.matches(event_type) {
            if let Some(evicted) = sub.deliver(event.clone()) {
                pool.release(evicted);
            }
        }
    }
}

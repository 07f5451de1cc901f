//! Recency Coordinator Module
//!
//! A single worker thread owns the recency list. Callers never touch the list
//! directly: they submit messages over two bounded queues and the worker
//! applies them one at a time.
//!
//! - The evict queue carries entries to unlink.
//! - The promote queue carries entries to move (or insert) at the front, plus
//!   the request/response commands used by capacity enforcement, purging and
//!   [`sync`](Coordinator::sync).
//!
//! Before taking each message from the promote queue the worker drains every
//! pending eviction, so a promotion never revives an entry whose eviction was
//! already submitted. Within each queue messages are applied in FIFO order.
//! When a queue is full the submitting caller blocks until the worker catches
//! up.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::cache::lru::RecencyList;
use crate::cache::Entry;
use crate::error::{CacheError, Result};

type EntryRef<K, V> = Arc<Entry<K, V>>;

// == Commands ==
/// Messages carried by the promote queue.
enum Command<K, V> {
    /// Move an entry to the front, linking it if needed
    Promote(EntryRef<K, V>),
    /// Unlink and report live entries beyond `capacity`, oldest first
    Overflow {
        capacity: usize,
        reply: Sender<Vec<EntryRef<K, V>>>,
    },
    /// Unlink and report the expired run at the back of the list, oldest first
    Expired {
        ttu: Duration,
        now: u64,
        reply: Sender<Vec<EntryRef<K, V>>>,
    },
    /// Acknowledge once everything queued before it is applied
    Sync(Sender<()>),
}

// == Coordinator ==
/// Handle to the worker that owns the recency list.
pub struct Coordinator<K, V> {
    promote_tx: Sender<Command<K, V>>,
    evict_tx: Sender<EntryRef<K, V>>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    linked: Arc<AtomicUsize>,
    stopped: AtomicBool,
}

impl<K, V> Coordinator<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Spawn ==
    /// Starts the worker thread with queues of `queue_depth` messages each.
    pub fn spawn(queue_depth: usize) -> Result<Self> {
        let (promote_tx, promote_rx) = bounded(queue_depth);
        let (evict_tx, evict_rx) = bounded(queue_depth);
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let linked = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            list: RecencyList::new(),
            linked: Arc::clone(&linked),
        };
        let inbox = Inbox {
            promote_rx,
            evict_rx,
            shutdown_rx,
        };
        let handle = thread::Builder::new()
            .name("ttu-cache-coordinator".to_string())
            .spawn(move || worker.run(inbox))?;

        Ok(Self {
            promote_tx,
            evict_tx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(handle)),
            linked,
            stopped: AtomicBool::new(false),
        })
    }
}

impl<K, V> Coordinator<K, V> {
    /// Queues a promotion. Ignored once the coordinator is stopped.
    pub fn promote(&self, entry: EntryRef<K, V>) {
        if self.promote_tx.send(Command::Promote(entry)).is_err() {
            debug!("Promotion dropped: coordinator is stopped");
        }
    }

    /// Queues an unlink. Ignored once the coordinator is stopped.
    pub fn evict(&self, entry: EntryRef<K, V>) {
        if self.evict_tx.send(entry).is_err() {
            debug!("Eviction dropped: coordinator is stopped");
        }
    }

    /// Unlinks the live entries beyond `capacity` and returns them, oldest
    /// first. The caller must remove them from their shards.
    pub fn overflow(&self, capacity: usize) -> Vec<EntryRef<K, V>> {
        self.request(|reply| Command::Overflow { capacity, reply })
            .unwrap_or_default()
    }

    /// Unlinks the expired run at the back of the list and returns it,
    /// oldest first. The caller must remove the entries from their shards.
    pub fn expired(&self, ttu: Duration, now: u64) -> Vec<EntryRef<K, V>> {
        self.request(|reply| Command::Expired { ttu, now, reply })
            .unwrap_or_default()
    }

    // == Sync ==
    /// Blocks until every message this caller queued earlier is applied.
    pub fn sync(&self) -> Result<()> {
        self.request(Command::Sync)
    }

    /// Approximate number of linked entries.
    pub fn len(&self) -> usize {
        self.linked.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    // == Stop ==
    /// Stops the worker and waits for it to exit. Safe to call repeatedly.
    pub fn stop(&self) {
        let shutdown = self.shutdown_tx.lock().take();
        if shutdown.is_none() {
            return;
        }
        self.stopped.store(true, Ordering::Release);
        drop(shutdown);

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("Coordinator thread panicked");
            }
        }
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Command<K, V>) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.promote_tx
            .send(make(reply_tx))
            .map_err(|_| CacheError::Stopped)?;
        reply_rx.recv().map_err(|_| CacheError::Stopped)
    }
}

impl<K, V> Drop for Coordinator<K, V> {
    fn drop(&mut self) {
        self.stop();
    }
}

// == Worker ==
/// State owned by the coordinator thread.
struct Worker<K, V> {
    list: RecencyList<EntryRef<K, V>>,
    linked: Arc<AtomicUsize>,
}

/// Receiving ends of the coordinator queues.
struct Inbox<K, V> {
    promote_rx: Receiver<Command<K, V>>,
    evict_rx: Receiver<EntryRef<K, V>>,
    shutdown_rx: Receiver<()>,
}

enum Event<K, V> {
    Evict(EntryRef<K, V>),
    Command(Command<K, V>),
    Shutdown,
}

impl<K, V> Inbox<K, V> {
    fn next(&self) -> Event<K, V> {
        // Pending evictions always win over the promote queue
        if let Ok(entry) = self.evict_rx.try_recv() {
            return Event::Evict(entry);
        }

        select! {
            recv(self.evict_rx) -> msg => msg.map_or(Event::Shutdown, Event::Evict),
            recv(self.promote_rx) -> msg => msg.map_or(Event::Shutdown, Event::Command),
            recv(self.shutdown_rx) -> _ => Event::Shutdown,
        }
    }
}

impl<K, V> Worker<K, V> {
    fn run(mut self, inbox: Inbox<K, V>) {
        info!("Recency coordinator started");

        loop {
            match inbox.next() {
                Event::Evict(entry) => self.unlink(&entry),
                Event::Command(command) => self.apply(command),
                Event::Shutdown => break,
            }
        }

        info!(linked = self.list.len(), "Recency coordinator stopped");
    }

    fn apply(&mut self, command: Command<K, V>) {
        match command {
            Command::Promote(entry) => self.promote(entry),
            Command::Overflow { capacity, reply } => {
                let victims = self.overflow(capacity);
                if !victims.is_empty() {
                    debug!(count = victims.len(), capacity, "Over capacity");
                }
                let _ = reply.send(victims);
            }
            Command::Expired { ttu, now, reply } => {
                let _ = reply.send(self.expired(ttu, now));
            }
            Command::Sync(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn promote(&mut self, entry: EntryRef<K, V>) {
        // A retired entry has left its shard; its eviction is queued or applied
        if entry.is_retired() {
            self.unlink(&entry);
            return;
        }

        match entry.slot() {
            Some(slot) => {
                self.list.move_to_front(slot);
            }
            None => {
                let slot = self.list.push_front(Arc::clone(&entry));
                entry.set_slot(Some(slot));
                self.linked.fetch_add(1, Ordering::AcqRel);
                trace!(slot, "Linked entry");
            }
        }
    }

    fn unlink(&mut self, entry: &EntryRef<K, V>) {
        if let Some(slot) = entry.slot() {
            if let Some(removed) = self.list.remove(slot) {
                debug_assert!(Arc::ptr_eq(&removed, entry));
            }
            entry.set_slot(None);
            self.linked.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn overflow(&mut self, capacity: usize) -> Vec<EntryRef<K, V>> {
        let mut victims = Vec::new();
        while self.list.len() > capacity {
            match self.pop_back() {
                // Retired entries already have an unlink on the way
                Some(entry) if !entry.is_retired() => victims.push(entry),
                Some(_) => {}
                None => break,
            }
        }
        victims
    }

    fn expired(&mut self, ttu: Duration, now: u64) -> Vec<EntryRef<K, V>> {
        let mut victims = Vec::new();
        while let Some(back) = self.list.back() {
            if !back.is_retired() && !back.is_expired(ttu, now) {
                break;
            }
            match self.pop_back() {
                Some(entry) if !entry.is_retired() => victims.push(entry),
                Some(_) => {}
                None => break,
            }
        }
        victims
    }

    fn pop_back(&mut self) -> Option<EntryRef<K, V>> {
        let entry = self.list.pop_back()?;
        entry.set_slot(None);
        self.linked.fetch_sub(1, Ordering::AcqRel);
        Some(entry)
    }
}

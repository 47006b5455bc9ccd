//! Bounded, lossy, deduplicating buffer between the blocking USB read loop
//! and the network-facing sender loop.
//!
//! Rapidly repeating button events (a held volume key) coalesce into one
//! logical entry whose count keeps climbing; periodic priority copies let the
//! consumer observe progress mid-repeat. Stale entries are dropped rather
//! than delivered late - freshness matters more than delivery here.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use amplink_core::event::RouterEvent;

/// Tuning for the intake queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum entries kept; oldest non-priority entries are evicted beyond it
    pub capacity: usize,
    /// Entries older than this are never delivered
    pub expiry: Duration,
    /// Minimum gap between priority copies of a coalescing key.
    /// A responsiveness tunable, not a protocol constant.
    pub priority_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            expiry: Duration::from_secs(2),
            priority_interval: Duration::from_millis(200),
        }
    }
}

/// An event waiting to be forwarded to the router.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub event: RouterEvent,
    pub created: Instant,
    /// Set only for repeatable commands; enables coalescing
    pub command_key: Option<String>,
    /// How many raw events this entry represents
    pub count: u32,
    /// Priority copies survive eviction and carry a mid-repeat snapshot
    pub priority: bool,
}

struct Inner {
    entries: VecDeque<QueueEntry>,
    /// Per-key timestamp of the last priority emission
    last_priority: HashMap<String, Instant>,
}

/// The queue itself. `add` runs on the hardware-read thread, `get` on the
/// sender loop; one mutex guards both the list and the dedup bookkeeping.
pub struct IntakeQueue {
    inner: Mutex<Inner>,
    config: QueueConfig,
}

impl IntakeQueue {
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner { entries: VecDeque::new(), last_priority: HashMap::new() }),
            config,
        }
    }

    /// Insert an event, coalescing repeatable commands.
    pub fn add(&self, mut event: RouterEvent, command_key: Option<String>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(key) = &command_key
            && let Some(i) = inner.entries.iter().rposition(|e| {
                !e.priority
                    && e.command_key.as_deref() == Some(key)
                    && now.duration_since(e.created) < self.config.expiry
            })
        {
            inner.entries[i].count += 1;
            inner.entries[i].created = now;
            inner.entries[i].event.count = Some(inner.entries[i].count);
            trace!(key = %key, count = inner.entries[i].count, "coalesced repeat");

            let due = inner
                .last_priority
                .get(key)
                .is_none_or(|t| now.duration_since(*t) >= self.config.priority_interval);
            if due {
                inner.last_priority.insert(key.clone(), now);
                let mut copy = inner.entries[i].clone();
                copy.priority = true;
                copy.event.priority = true;
                inner.entries.push_back(copy);
                Self::evict(&mut inner.entries, self.config.capacity);
            }
            return;
        }

        event.count = Some(1);
        inner.entries.push_back(QueueEntry {
            event,
            created: now,
            command_key,
            count: 1,
            priority: false,
        });
        Self::evict(&mut inner.entries, self.config.capacity);
    }

    /// Pop the oldest surviving entry, if any.
    pub fn get(&self) -> Option<QueueEntry> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expiry = self.config.expiry;
        inner.entries.retain(|e| now.duration_since(e.created) < expiry);

        let entry = inner.entries.pop_front()?;
        if let Some(key) = &entry.command_key
            && !inner.entries.iter().any(|e| e.command_key.as_deref() == Some(key.as_str()))
        {
            inner.last_priority.remove(key);
        }
        Some(entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop the oldest non-priority entries until the queue fits. Priority
    /// entries always survive an eviction round.
    fn evict(entries: &mut VecDeque<QueueEntry>, capacity: usize) {
        while entries.len() > capacity {
            let Some(pos) = entries.iter().position(|e| !e.priority) else {
                break;
            };
            trace!("queue over capacity, dropping oldest non-priority entry");
            let _ = entries.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(capacity: usize, expiry_ms: u64, interval_ms: u64) -> IntakeQueue {
        IntakeQueue::new(QueueConfig {
            capacity,
            expiry: Duration::from_millis(expiry_ms),
            priority_interval: Duration::from_millis(interval_ms),
        })
    }

    fn add_key(q: &IntakeQueue, action: &str) {
        q.add(RouterEvent::new(action), Some(action.to_string()));
    }

    #[test]
    fn test_dedup_counts_rapid_repeats() {
        let q = queue(10, 2000, 200);
        for _ in 0..5 {
            add_key(&q, "volup");
        }

        // one logical entry plus the first priority copy (emitted on the
        // first repeat, when no prior emission exists for the key)
        assert_eq!(q.len(), 2);

        let first = q.get().unwrap();
        assert!(!first.priority);
        assert_eq!(first.count, 5);
        assert_eq!(first.event.count, Some(5));

        let second = q.get().unwrap();
        assert!(second.priority);
        assert_eq!(second.count, 2);

        assert!(q.get().is_none());
    }

    #[test]
    fn test_priority_copies_respect_cadence() {
        let q = queue(10, 2000, 30);
        add_key(&q, "volup");
        add_key(&q, "volup"); // first priority copy
        add_key(&q, "volup"); // within cadence, no copy
        assert_eq!(q.len(), 2);

        std::thread::sleep(Duration::from_millis(40));
        add_key(&q, "volup"); // cadence elapsed, second copy
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_distinct_keys_do_not_coalesce() {
        let q = queue(10, 2000, 200);
        add_key(&q, "volup");
        add_key(&q, "voldown");
        assert_eq!(q.len(), 2);
        assert_eq!(q.get().unwrap().event.action, "volup");
        assert_eq!(q.get().unwrap().event.action, "voldown");
    }

    #[test]
    fn test_non_keyed_entries_keep_fifo_order() {
        let q = queue(10, 2000, 200);
        q.add(RouterEvent::new("go"), None);
        q.add(RouterEvent::new("stop"), None);
        q.add(RouterEvent::new("go"), None);
        assert_eq!(q.len(), 3);
        assert_eq!(q.get().unwrap().event.action, "go");
        assert_eq!(q.get().unwrap().event.action, "stop");
        assert_eq!(q.get().unwrap().event.action, "go");
    }

    #[test]
    fn test_expired_entries_never_returned() {
        let q = queue(10, 30, 200);
        q.add(RouterEvent::new("go"), None);
        std::thread::sleep(Duration::from_millis(40));
        assert!(q.get().is_none());
    }

    #[test]
    fn test_refreshed_timestamp_defers_expiry() {
        let q = queue(10, 50, 5);
        add_key(&q, "volup");
        std::thread::sleep(Duration::from_millis(30));
        add_key(&q, "volup"); // refreshes the coalesced entry
        std::thread::sleep(Duration::from_millis(30));

        // 60ms after creation but only 30ms after the refresh
        let entry = q.get().unwrap();
        assert!(!entry.priority);
        assert_eq!(entry.count, 2);
    }

    #[test]
    fn test_bounded_growth() {
        let q = queue(10, 2000, 200);
        for i in 0..25 {
            q.add(RouterEvent::new(format!("evt{i}")), None);
        }
        assert_eq!(q.len(), 10);

        // the newest entries survived
        assert_eq!(q.get().unwrap().event.action, "evt15");
    }

    #[test]
    fn test_priority_entries_survive_eviction() {
        let q = queue(4, 2000, 0);
        add_key(&q, "volup");
        add_key(&q, "volup"); // priority copy 1
        add_key(&q, "volup"); // priority copy 2 (cadence 0)
        for i in 0..10 {
            q.add(RouterEvent::new(format!("evt{i}")), None);
        }

        assert_eq!(q.len(), 4);
        let drained: Vec<QueueEntry> = std::iter::from_fn(|| q.get()).collect();
        assert_eq!(drained.iter().filter(|e| e.priority).count(), 2);
    }

    #[test]
    fn test_dedup_bookkeeping_cleared_on_drain() {
        let q = queue(10, 2000, 60_000);
        add_key(&q, "volup");
        add_key(&q, "volup"); // priority copy, cadence now blocks further copies

        while q.get().is_some() {}

        // key fully drained: a fresh repeat gets a priority copy again
        add_key(&q, "volup");
        add_key(&q, "volup");
        assert_eq!(q.len(), 2);
    }
}

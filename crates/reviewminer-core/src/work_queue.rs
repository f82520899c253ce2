//! Lock-free FIFO distributing pre-loaded work items across workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Pre-populated work queue with a non-blocking drain.
///
/// Workers call [`next()`](WorkQueue::next) to claim the next item. Each item
/// is handed out exactly once, in insertion order; once the queue is drained
/// `next()` keeps returning `None` so workers can exit on their own.
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        log::debug!("{} items in work queue", items.len());
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next item (lock-free, never blocks)
    pub fn next(&self) -> Option<&T> {
        // Stop advancing once past the end so the cursor cannot wrap
        let claimed = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| {
                (i < self.items.len()).then_some(i + 1)
            })
            .ok()?;
        self.items.get(claimed)
    }

    /// Total items loaded into the queue
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Items not yet claimed by any worker
    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn drains_in_order() {
        let q = WorkQueue::new(vec!["a", "b", "c"]);
        assert_eq!(q.total(), 3);
        assert_eq!(q.next(), Some(&"a"));
        assert_eq!(q.next(), Some(&"b"));
        assert_eq!(q.remaining(), 1);
        assert_eq!(q.next(), Some(&"c"));
        assert_eq!(q.next(), None);
        assert_eq!(q.next(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn empty_queue() {
        let q: WorkQueue<u32> = WorkQueue::new(vec![]);
        assert_eq!(q.total(), 0);
        assert!(q.is_empty());
        assert_eq!(q.next(), None);
    }

    #[test]
    fn concurrent_drain_hands_out_each_item_once() {
        let q = WorkQueue::new((0..1000).collect::<Vec<u32>>());
        let seen = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(item) = q.next() {
                        seen.lock().unwrap().push(*item);
                    }
                });
            }
        });

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..1000).collect::<Vec<u32>>());
        assert_eq!(q.remaining(), 0);
    }
}

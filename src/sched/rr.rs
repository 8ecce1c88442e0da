//! Priority round-robin ready list.
//!
//! A single unsorted list. Selection removes the first thread with the
//! maximum effective priority, so threads of equal priority rotate in
//! FIFO order, and donation can raise a queued thread's priority without
//! any repositioning.

use super::trait_def::ReadyPolicy;
use crate::collections::{List, Slab, Slot};
use crate::thread::{QueueTag, ThreadCb, LINK_QUEUE};

pub struct PriorityReady {
    ready: List<ThreadCb>,
}

impl PriorityReady {
    pub fn new() -> Self {
        Self {
            ready: List::new(LINK_QUEUE),
        }
    }
}

impl ReadyPolicy for PriorityReady {
    fn insert(&mut self, threads: &mut Slab<ThreadCb>, slot: Slot) {
        debug_assert!(threads[slot].queue_tag.is_none());
        threads[slot].queue_tag = Some(QueueTag::Ready);
        self.ready.push_back(threads, slot);
    }

    fn remove_next(&mut self, threads: &mut Slab<ThreadCb>) -> Option<Slot> {
        let slot = self
            .ready
            .remove_max_by_key(threads, |cb| cb.effective)?;
        threads[slot].queue_tag = None;
        Some(slot)
    }

    fn top_priority(&self, threads: &Slab<ThreadCb>) -> Option<i32> {
        self.ready
            .max_by_key(threads, |cb| cb.effective)
            .map(|slot| threads[slot].effective)
    }

    fn len(&self) -> usize {
        self.ready.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::Tid;

    fn ready_thread(threads: &mut Slab<ThreadCb>, tid: u32, priority: i32) -> Slot {
        let mut cb = ThreadCb::new(Tid::new(tid), "t", priority);
        cb.state = crate::thread::ThreadState::Ready;
        threads.insert(cb)
    }

    #[test]
    fn picks_highest_effective_priority() {
        let mut threads = Slab::new();
        let mut policy = PriorityReady::new();
        let low = ready_thread(&mut threads, 1, 10);
        let high = ready_thread(&mut threads, 2, 40);
        let mid = ready_thread(&mut threads, 3, 20);
        policy.insert(&mut threads, low);
        policy.insert(&mut threads, high);
        policy.insert(&mut threads, mid);

        assert_eq!(policy.top_priority(&threads), Some(40));
        assert_eq!(policy.remove_next(&mut threads), Some(high));
        assert_eq!(policy.remove_next(&mut threads), Some(mid));
        assert_eq!(policy.remove_next(&mut threads), Some(low));
        assert_eq!(policy.remove_next(&mut threads), None);
    }

    #[test]
    fn equal_priorities_rotate_fifo() {
        let mut threads = Slab::new();
        let mut policy = PriorityReady::new();
        let a = ready_thread(&mut threads, 1, 31);
        let b = ready_thread(&mut threads, 2, 31);
        let c = ready_thread(&mut threads, 3, 31);
        for slot in [a, b, c] {
            policy.insert(&mut threads, slot);
        }

        let first = policy.remove_next(&mut threads).unwrap();
        assert_eq!(first, a);
        policy.insert(&mut threads, first);
        assert_eq!(policy.remove_next(&mut threads), Some(b));
        assert_eq!(policy.remove_next(&mut threads), Some(c));
        assert_eq!(policy.remove_next(&mut threads), Some(a));
    }

    #[test]
    fn donation_raises_queued_thread_without_reinsert() {
        let mut threads = Slab::new();
        let mut policy = PriorityReady::new();
        let low = ready_thread(&mut threads, 1, 10);
        let mid = ready_thread(&mut threads, 2, 20);
        policy.insert(&mut threads, low);
        policy.insert(&mut threads, mid);

        threads[low].effective = 35;
        assert_eq!(policy.top_priority(&threads), Some(35));
        assert_eq!(policy.remove_next(&mut threads), Some(low));
    }
}

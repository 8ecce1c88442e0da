//! Thread control blocks and scheduling constants.

use crate::collections::{Links, List, Node, Slot};
use crate::fixed::Fixed;
use crate::mem::Stack;
use crate::port::ContextRef;
use crate::sync::lock::LockCb;

/// Lowest priority.
pub const PRI_MIN: i32 = 0;
/// Priority assigned when the caller does not care.
pub const PRI_DEFAULT: i32 = 31;
/// Highest priority.
pub const PRI_MAX: i32 = 63;

/// Lowest niceness.
pub const NICE_MIN: i32 = -20;
/// Highest niceness.
pub const NICE_MAX: i32 = 20;

/// Maximum thread name length in bytes; longer names are truncated.
pub const NAME_MAX: usize = 15;

/// Priority-donation chains are followed at most this deep.
pub const DONATION_DEPTH_MAX: usize = 8;

/// Sentinel detecting a control block that was overwritten by a runaway
/// stack or addressed through a stale slot.
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Link set shared by the ready queue, the sleep queue and semaphore
/// waiter lists. A thread is on at most one of those at a time.
pub const LINK_QUEUE: usize = 0;
/// Link set of the permanent all-threads list.
pub const LINK_ALL: usize = 1;

/// Thread identifier, monotonically increasing from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(core::num::NonZeroU32);

impl Tid {
    pub(crate) fn new(raw: u32) -> Tid {
        Tid(core::num::NonZeroU32::new(raw).expect("thread ids start at 1"))
    }

    /// Raw id value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl core::fmt::Display for Tid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Life-cycle state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Currently on the CPU. Exactly one thread at any time.
    Running,
    /// Runnable, waiting in the ready structure.
    Ready,
    /// Waiting for a wakeup: a synchronization primitive or a timer tick.
    Blocked,
    /// Exited; its page is reclaimed by the next thread to run.
    Dying,
}

/// Which queue currently owns a thread's shared link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTag {
    Ready,
    Sleep,
    SemaWait,
}

/// Bounded thread name.
pub type ThreadName = heapless::String<NAME_MAX>;

/// Truncates `name` to [`NAME_MAX`] bytes on a character boundary.
pub fn bounded_name(name: &str) -> ThreadName {
    let mut out = ThreadName::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Thread control block, stored in the scheduler's thread arena.
pub struct ThreadCb {
    pub(crate) magic: u32,
    pub tid: Tid,
    pub name: ThreadName,
    pub state: ThreadState,

    /// Base priority, set at creation or by `set_priority`. Under the
    /// feedback-queue policy this is the recomputed priority itself.
    pub priority: i32,
    /// Priority the scheduler actually uses; >= `priority`, raised by
    /// donation.
    pub effective: i32,
    pub nice: i32,
    pub recent_cpu: Fixed,

    /// Absolute wake tick; meaningful only while on the sleep queue.
    pub wake_time: i64,
    /// Lock this thread is blocked on, for donation traversal.
    pub(crate) waiting_on: Option<Slot>,
    /// Locks currently held, through the lock arena's held-list links.
    pub(crate) held: List<LockCb>,

    pub(crate) links: [Links; 2],
    /// Names the queue that currently owns `links[LINK_QUEUE]`.
    pub(crate) queue_tag: Option<QueueTag>,

    /// This thread's stack page. The initial thread runs on the stack it
    /// was booted with and has none to reclaim.
    pub(crate) stack: Option<Stack>,
    /// Port-side execution context.
    pub(crate) context: Option<ContextRef>,
}

impl ThreadCb {
    pub fn new(tid: Tid, name: &str, priority: i32) -> ThreadCb {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {} out of range",
            priority
        );
        ThreadCb {
            magic: THREAD_MAGIC,
            tid,
            name: bounded_name(name),
            state: ThreadState::Blocked,
            priority,
            effective: priority,
            nice: 0,
            recent_cpu: Fixed::ZERO,
            wake_time: 0,
            waiting_on: None,
            held: List::new(crate::sync::lock::LINK_HELD),
            links: [Links::new(), Links::new()],
            queue_tag: None,
            stack: None,
            context: None,
        }
    }

    /// Panics if the control block looks overwritten.
    pub fn check(&self) {
        assert_eq!(self.magic, THREAD_MAGIC, "thread {} corrupted", self.tid);
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self.state, ThreadState::Running | ThreadState::Ready)
    }
}

impl Node for ThreadCb {
    fn links(&self, set: usize) -> &Links {
        &self.links[set]
    }

    fn links_mut(&mut self, set: usize) -> &mut Links {
        &mut self.links[set]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_truncated() {
        assert_eq!(bounded_name("main").as_str(), "main");
        assert_eq!(
            bounded_name("a-name-that-is-way-too-long").as_str(),
            "a-name-that-is-"
        );
        assert_eq!(bounded_name("a-name-that-is-").as_str().len(), NAME_MAX);
    }

    #[test]
    fn new_threads_start_blocked() {
        let cb = ThreadCb::new(Tid::new(1), "t", PRI_DEFAULT);
        assert_eq!(cb.state, ThreadState::Blocked);
        assert_eq!(cb.priority, PRI_DEFAULT);
        assert_eq!(cb.effective, PRI_DEFAULT);
        assert!(!cb.is_runnable());
        cb.check();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn priority_is_range_checked() {
        let _ = ThreadCb::new(Tid::new(1), "t", PRI_MAX + 1);
    }
}

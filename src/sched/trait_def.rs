//! Policy interface over the thread arena.

use crate::collections::{Slab, Slot};
use crate::thread::ThreadCb;

/// A ready-thread structure.
///
/// Implementations own only queue membership: they link and unlink
/// threads through the shared queue link and maintain the `queue_tag`
/// discriminator. Thread state transitions belong to the scheduler core.
pub trait ReadyPolicy: Send {
    /// Makes `slot` selectable. The thread must not be on any queue.
    fn insert(&mut self, threads: &mut Slab<ThreadCb>, slot: Slot);

    /// Removes and returns the next thread to run, or `None` when no
    /// thread is ready (the core then falls back to the idle thread).
    fn remove_next(&mut self, threads: &mut Slab<ThreadCb>) -> Option<Slot>;

    /// Effective priority of the best ready thread, if any.
    fn top_priority(&self, threads: &Slab<ThreadCb>) -> Option<i32>;

    /// Moves a ready thread whose priority changed from `old` to its new
    /// queue, appending at the destination tail. Policies whose selection
    /// re-reads priorities on every pick need not do anything.
    fn reposition(&mut self, threads: &mut Slab<ThreadCb>, slot: Slot, old: i32) {
        let _ = (threads, slot, old);
    }

    /// Number of queued threads.
    fn len(&self) -> usize;
}

//! Counting semaphore.

use crate::collections::{List, Slot};
use crate::kernel::Kernel;
use crate::thread::{QueueTag, ThreadCb, LINK_QUEUE};

/// Semaphore state, in the scheduler's semaphore arena.
pub(crate) struct SemaCb {
    pub(crate) count: u32,
    pub(crate) waiters: List<ThreadCb>,
}

impl SemaCb {
    pub(crate) fn new(count: u32) -> SemaCb {
        SemaCb {
            count,
            waiters: List::new(LINK_QUEUE),
        }
    }
}

/// A counting semaphore.
///
/// `up` with waiters present hands the count straight to the released
/// waiter instead of incrementing: the waiter returns from `down`
/// without touching the count again, so a wakeup can never race a
/// third thread's decrement.
#[derive(Clone, Copy)]
pub struct Semaphore {
    kernel: &'static Kernel,
    id: Slot,
}

impl Semaphore {
    pub fn new(kernel: &'static Kernel, count: u32) -> Semaphore {
        let id = kernel.with_sched(|s| s.semas.insert(SemaCb::new(count)));
        Semaphore { kernel, id }
    }

    pub(crate) fn from_parts(kernel: &'static Kernel, id: Slot) -> Semaphore {
        Semaphore { kernel, id }
    }

    pub(crate) fn kernel(&self) -> &'static Kernel {
        self.kernel
    }

    /// Decrements the count, blocking until it is positive.
    pub fn down(&self) {
        let kernel = self.kernel;
        assert!(
            !kernel.in_interrupt(),
            "semaphore down: may block; not from interrupt context"
        );
        let old = kernel.intr_disable();
        let wait = kernel.with_sched(|s| {
            let count = s.semas[self.id].count;
            if count > 0 {
                s.semas[self.id].count = count - 1;
                false
            } else {
                let current = s.current;
                s.threads[current].queue_tag = Some(QueueTag::SemaWait);
                s.semas[self.id].waiters.push_back(&mut s.threads, current);
                true
            }
        });
        if wait {
            // Released directly by up(); the count was never incremented.
            kernel.block();
        }
        kernel.intr_restore(old);
    }

    /// Decrements the count only if that needs no waiting.
    pub fn try_down(&self) -> bool {
        self.kernel.with_sched(|s| {
            let count = s.semas[self.id].count;
            if count > 0 {
                s.semas[self.id].count = count - 1;
                true
            } else {
                false
            }
        })
    }

    /// Releases the highest-priority waiter, or increments the count.
    /// Preempts on the way out if the released waiter outranks the
    /// caller; safe in interrupt context, where the preemption turns
    /// into a yield-on-return request.
    pub fn up(&self) {
        self.up_with_preempt(true);
    }

    pub(crate) fn up_with_preempt(&self, preempt: bool) {
        let kernel = self.kernel;
        let woke = kernel.with_sched(|s| {
            let waiter = s.semas[self.id]
                .waiters
                .remove_max_by_key(&mut s.threads, |cb| cb.effective);
            match waiter {
                Some(waiter) => {
                    s.threads[waiter].queue_tag = None;
                    s.unblock_slot(waiter);
                    true
                }
                None => {
                    s.semas[self.id].count += 1;
                    false
                }
            }
        });
        if woke && preempt {
            kernel.preempt_if_outranked();
        }
    }

    /// Current count, for diagnostics.
    pub fn value(&self) -> u32 {
        self.kernel.with_sched(|s| s.semas[self.id].count)
    }
}

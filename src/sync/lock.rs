//! Mutual-exclusion lock with priority donation.
//!
//! A lock is a binary semaphore plus a holder and donation bookkeeping.
//! When a contender blocks on a held lock, it donates its effective
//! priority down the chain of holders it is transitively waiting on, so
//! a low-priority holder cannot starve a high-priority contender through
//! a middle thread. Release recomputes the releaser's effective priority
//! from the locks it still holds.

use crate::collections::{Links, Node, Slot};
use crate::kernel::Kernel;
use crate::sync::semaphore::{SemaCb, Semaphore};

/// Link set for a thread's held-locks list.
pub(crate) const LINK_HELD: usize = 0;

/// Lock state, in the scheduler's lock arena.
pub(crate) struct LockCb {
    pub(crate) holder: Option<Slot>,
    pub(crate) sema: Slot,
    links: [Links; 1],
}

impl Node for LockCb {
    fn links(&self, set: usize) -> &Links {
        &self.links[set]
    }

    fn links_mut(&mut self, set: usize) -> &mut Links {
        &mut self.links[set]
    }
}

/// A non-recursive mutual-exclusion lock.
///
/// Acquiring a lock the caller already holds is a fatal error.
#[derive(Clone, Copy)]
pub struct Lock {
    kernel: &'static Kernel,
    id: Slot,
}

impl Lock {
    pub fn new(kernel: &'static Kernel) -> Lock {
        let id = kernel.with_sched(|s| {
            let sema = s.semas.insert(SemaCb::new(1));
            s.locks.insert(LockCb {
                holder: None,
                sema,
                links: [Links::new()],
            })
        });
        Lock { kernel, id }
    }

    pub(crate) fn from_parts(kernel: &'static Kernel, id: Slot) -> Lock {
        Lock { kernel, id }
    }

    /// Acquires the lock, blocking until the holder releases it and
    /// donating priority to the holder chain while blocked.
    pub fn acquire(&self) {
        let kernel = self.kernel;
        assert!(
            !kernel.in_interrupt(),
            "lock acquire: may block; not from interrupt context"
        );
        let old = kernel.intr_disable();
        let sema = kernel.with_sched(|s| {
            let lock = &s.locks[self.id];
            assert_ne!(
                lock.holder,
                Some(s.current),
                "lock acquire: already held by caller"
            );
            let sema = lock.sema;
            if lock.holder.is_some() {
                let current = s.current;
                s.threads[current].waiting_on = Some(self.id);
                if !s.mlfqs {
                    s.donate_priority(current);
                }
            }
            sema
        });

        Semaphore::from_parts(kernel, sema).down();

        kernel.with_sched(|s| {
            let current = s.current;
            s.threads[current].waiting_on = None;
            s.locks[self.id].holder = Some(current);
            s.threads[current].held.push_back(&mut s.locks, self.id);
        });
        kernel.intr_restore(old);
    }

    /// Takes the lock only if it is free.
    pub fn try_acquire(&self) -> bool {
        self.kernel.with_sched(|s| {
            if s.locks[self.id].holder.is_some() {
                return false;
            }
            let current = s.current;
            let sema = s.locks[self.id].sema;
            debug_assert_eq!(s.semas[sema].count, 1);
            s.semas[sema].count = 0;
            s.locks[self.id].holder = Some(current);
            s.threads[current].held.push_back(&mut s.locks, self.id);
            true
        })
    }

    /// Releases the lock, waking the highest-priority waiter and
    /// preempting if that waiter outranks the caller.
    pub fn release(&self) {
        self.release_with_preempt(true);
    }

    /// Release variant for the exit path, where preemption is illegal.
    pub(crate) fn release_no_preempt(&self) {
        self.release_with_preempt(false);
    }

    fn release_with_preempt(&self, preempt: bool) {
        let kernel = self.kernel;
        let old = kernel.intr_disable();
        let sema = kernel.with_sched(|s| {
            let current = s.current;
            assert_eq!(
                s.locks[self.id].holder,
                Some(current),
                "lock release: not held by caller"
            );
            s.threads[current].held.remove(&mut s.locks, self.id);
            s.locks[self.id].holder = None;
            if !s.mlfqs {
                // Donations through this lock are gone; what remains
                // comes from the locks still held.
                s.refresh_effective(current);
            }
            s.locks[self.id].sema
        });
        Semaphore::from_parts(kernel, sema).up_with_preempt(preempt);
        kernel.intr_restore(old);
    }

    /// Whether the calling thread holds this lock.
    pub fn held_by_current(&self) -> bool {
        self.kernel
            .with_sched(|s| s.locks[self.id].holder == Some(s.current))
    }
}

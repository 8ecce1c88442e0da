//! Condition variable.
//!
//! Each waiter parks on its own fresh semaphore; signal wakes the
//! highest-priority waiter by upping that waiter's semaphore. The
//! condition variable holds no mutex of its own; the monitor lock the
//! callers pass in provides the discipline.

extern crate alloc;
use alloc::collections::VecDeque;

use crate::collections::Slot;
use crate::kernel::Kernel;
use crate::sync::lock::Lock;
use crate::sync::semaphore::{SemaCb, Semaphore};

/// Condition variable state: (waiting thread, its per-wait semaphore).
pub(crate) struct CondCb {
    pub(crate) waiters: VecDeque<(Slot, Slot)>,
}

/// A monitor condition variable.
#[derive(Clone, Copy)]
pub struct Condvar {
    kernel: &'static Kernel,
    id: Slot,
}

impl Condvar {
    pub fn new(kernel: &'static Kernel) -> Condvar {
        let id = kernel.with_sched(|s| {
            s.conds.insert(CondCb {
                waiters: VecDeque::new(),
            })
        });
        Condvar { kernel, id }
    }

    /// Atomically releases `lock` and blocks until signalled, then
    /// reacquires `lock` before returning.
    pub fn wait(&self, lock: &Lock) {
        let kernel = self.kernel;
        assert!(
            !kernel.in_interrupt(),
            "condvar wait: may block; not from interrupt context"
        );
        assert!(lock.held_by_current(), "condvar wait: monitor lock not held");

        let sema = kernel.with_sched(|s| {
            let sema = s.semas.insert(SemaCb::new(0));
            let current = s.current;
            s.conds[self.id].waiters.push_back((current, sema));
            sema
        });

        lock.release();
        Semaphore::from_parts(kernel, sema).down();
        lock.acquire();

        kernel.with_sched(|s| {
            s.semas.remove(sema);
        });
    }

    /// Wakes the highest-priority waiter, if any.
    pub fn signal(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condvar signal: monitor lock not held");
        if let Some(sema) = self.pop_best_waiter() {
            Semaphore::from_parts(self.kernel, sema).up();
        }
    }

    /// Wakes every waiter.
    pub fn broadcast(&self, lock: &Lock) {
        assert!(
            lock.held_by_current(),
            "condvar broadcast: monitor lock not held"
        );
        while let Some(sema) = self.pop_best_waiter() {
            Semaphore::from_parts(self.kernel, sema).up();
        }
    }

    /// Removes the first waiter with the maximum effective priority.
    fn pop_best_waiter(&self) -> Option<Slot> {
        self.kernel.with_sched(|s| {
            let mut best: Option<(usize, i32)> = None;
            for (index, &(thread, _)) in s.conds[self.id].waiters.iter().enumerate() {
                let effective = s.threads[thread].effective;
                match best {
                    Some((_, top)) if top >= effective => {}
                    _ => best = Some((index, effective)),
                }
            }
            let (index, _) = best?;
            s.conds[self.id].waiters.remove(index).map(|(_, sema)| sema)
        })
    }
}

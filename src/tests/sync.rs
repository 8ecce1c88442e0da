//! Semaphore, condition variable, and reader-writer lock behavior.

use super::helpers::{run_scheduler_test, Journal};
use crate::hosted;
use crate::kernel::BootArgs;
use crate::sync::{Condvar, Lock, RwLock, Semaphore};
use crate::thread::PRI_DEFAULT;

#[test]
fn semaphore_blocks_and_hands_off() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let sema = Semaphore::new(kernel, 0);

        kernel
            .create("waiter", PRI_DEFAULT + 4, move || {
                sema.down();
                journal.push("woken");
            })
            .unwrap();
        // The waiter outranks us but is parked on the semaphore.
        assert_eq!(journal.len(), 0);

        sema.up();
        assert_eq!(journal.joined(), "woken");
        // The count was handed to the waiter, not incremented.
        assert_eq!(sema.value(), 0);
    });
}

#[test]
fn try_down_never_blocks() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let sema = Semaphore::new(kernel, 1);
        assert!(sema.try_down());
        assert!(!sema.try_down());
        sema.up();
        assert!(sema.try_down());
    });
}

#[test]
fn up_from_interrupt_defers_the_preemption() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let sema = Semaphore::new(kernel, 0);
        kernel
            .create("waiter", PRI_DEFAULT + 4, move || {
                sema.down();
                journal.push("woken");
            })
            .unwrap();

        // An interrupt handler may up a semaphore; the resulting
        // preemption is requested for interrupt return, not taken
        // inside the handler.
        hosted::interrupt(kernel, move |_| {
            sema.up();
            assert_eq!(journal.len(), 0);
        });
        assert_eq!(journal.joined(), "woken");
    });
}

#[test]
fn lock_is_exclusive_and_tracks_its_holder() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let lock = Lock::new(kernel);

        lock.acquire();
        assert!(lock.held_by_current());

        kernel
            .create("contender", PRI_DEFAULT + 4, move || {
                assert!(!lock.try_acquire());
                journal.push("bounced");
            })
            .unwrap();
        assert_eq!(journal.joined(), "bounced");

        lock.release();
        assert!(!lock.held_by_current());
        assert!(lock.try_acquire());
        lock.release();
    });
}

#[test]
#[should_panic(expected = "already held by caller")]
fn reacquiring_a_held_lock_is_fatal() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let lock = Lock::new(kernel);
        lock.acquire();
        lock.acquire();
    });
}

#[test]
fn condvar_signals_highest_priority_waiter_first() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let lock = Lock::new(kernel);
        let cond = Condvar::new(kernel);

        for (name, priority) in [("p32", 32), ("p34", 34), ("p33", 33)] {
            kernel
                .create(name, priority, move || {
                    lock.acquire();
                    cond.wait(&lock);
                    journal.push(name);
                    lock.release();
                })
                .unwrap();
        }
        assert_eq!(journal.len(), 0);

        lock.acquire();
        cond.signal(&lock);
        cond.signal(&lock);
        cond.signal(&lock);
        lock.release();

        while journal.len() < 3 {
            kernel.yield_now();
        }
        assert_eq!(journal.joined(), "p34,p33,p32");
    });
}

#[test]
fn condvar_broadcast_wakes_everyone() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let lock = Lock::new(kernel);
        let cond = Condvar::new(kernel);

        for name in ["a", "b"] {
            kernel
                .create(name, PRI_DEFAULT + 2, move || {
                    lock.acquire();
                    cond.wait(&lock);
                    journal.push(name);
                    lock.release();
                })
                .unwrap();
        }

        lock.acquire();
        cond.broadcast(&lock);
        lock.release();

        while journal.len() < 2 {
            kernel.yield_now();
        }
        assert_eq!(journal.len(), 2);
    });
}

#[test]
fn pending_writer_blocks_new_readers() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let rw = RwLock::new(kernel);

        rw.acquire_read();

        kernel
            .create("writer", PRI_DEFAULT + 4, move || {
                rw.acquire_write();
                journal.push("write");
                rw.release_write();
            })
            .unwrap();
        kernel
            .create("reader", PRI_DEFAULT + 3, move || {
                rw.acquire_read();
                journal.push("read");
                rw.release_read();
            })
            .unwrap();
        // The writer waits on us; the late reader must queue behind the
        // writer even though readers currently hold the lock.
        assert_eq!(journal.len(), 0);

        rw.release_read();
        while journal.len() < 2 {
            kernel.yield_now();
        }
        assert_eq!(journal.joined(), "write,read");
    });
}

#[test]
fn readers_share_the_rwlock() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let rw = RwLock::new(kernel);

        rw.acquire_read();
        kernel
            .create("reader", PRI_DEFAULT + 1, move || {
                rw.acquire_read();
                journal.push("shared");
                rw.release_read();
            })
            .unwrap();
        // A second reader got in while we still hold ours.
        assert_eq!(journal.joined(), "shared");
        rw.release_read();
    });
}

//! Priority donation scenarios.

use std::vec::Vec;

use super::helpers::{run_scheduler_test, Journal};
use crate::kernel::BootArgs;
use crate::sync::Lock;
use crate::thread::PRI_DEFAULT;

#[test]
fn waiters_donate_to_the_holder() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let lock = Lock::new(kernel);

        kernel.set_priority(10);
        lock.acquire();

        kernel
            .create("medium", 20, move || {
                lock.acquire();
                lock.release();
                journal.push("medium");
            })
            .unwrap();
        // Medium ran, blocked on the lock, and donated.
        assert_eq!(kernel.get_priority(), 20);

        kernel
            .create("high", 30, move || {
                lock.acquire();
                lock.release();
                journal.push("high");
            })
            .unwrap();
        assert_eq!(kernel.get_priority(), 30);
        assert_eq!(journal.len(), 0);

        // Release hands the lock to the highest-priority waiter; the
        // donation evaporates and both contenders finish before us.
        lock.release();
        assert_eq!(journal.joined(), "high,medium");
        assert_eq!(kernel.get_priority(), 10);

        kernel.set_priority(PRI_DEFAULT);
    });
}

#[test]
fn donation_follows_the_holder_chain() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let outer = Lock::new(kernel);
        let inner = Lock::new(kernel);

        kernel.set_priority(10);
        outer.acquire();

        kernel
            .create("mid", 20, move || {
                inner.acquire();
                outer.acquire();
                outer.release();
                inner.release();
                journal.push("mid");
            })
            .unwrap();
        assert_eq!(kernel.get_priority(), 20);

        kernel
            .create("high", 30, move || {
                inner.acquire();
                inner.release();
                journal.push("high");
            })
            .unwrap();
        // High blocks on `inner` (held by mid), and mid's donation flows
        // through to us, the holder of `outer`.
        assert_eq!(kernel.get_priority(), 30);

        outer.release();
        assert_eq!(journal.joined(), "high,mid");
        assert_eq!(kernel.get_priority(), 10);

        kernel.set_priority(PRI_DEFAULT);
    });
}

#[test]
fn donation_chains_reach_depth_eight() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        let locks: Vec<Lock> = (0..9).map(|_| Lock::new(kernel)).collect();

        locks[0].acquire();
        for i in 1..=8 {
            let own = locks[i];
            let contended = locks[i - 1];
            let name = std::format!("t{}", i);
            let tag = journal;
            kernel
                .create(&name, PRI_DEFAULT + i as i32, move || {
                    own.acquire();
                    contended.acquire();
                    tag.push(std::format!("t{}", i));
                    contended.release();
                    own.release();
                })
                .unwrap();
            // Every new contender's priority travels the whole chain
            // down to us.
            assert_eq!(kernel.get_priority(), PRI_DEFAULT + i as i32);
        }

        locks[0].release();
        assert_eq!(journal.joined(), "t1,t2,t3,t4,t5,t6,t7,t8");
        assert_eq!(kernel.get_priority(), PRI_DEFAULT);
    });
}

#[test]
fn base_priority_changes_respect_active_donations() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let lock = Lock::new(kernel);
        kernel.set_priority(10);
        lock.acquire();
        kernel
            .create("waiter", 40, move || {
                lock.acquire();
                lock.release();
            })
            .unwrap();
        assert_eq!(kernel.get_priority(), 40);

        // Raising the base above the donation wins...
        kernel.set_priority(45);
        assert_eq!(kernel.get_priority(), 45);
        // ...lowering it falls back to the donation, not the base.
        kernel.set_priority(20);
        assert_eq!(kernel.get_priority(), 40);

        lock.release();
        assert_eq!(kernel.get_priority(), 20);
        kernel.set_priority(PRI_DEFAULT);
    });
}

#[test]
fn release_restores_the_pre_acquire_priority() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let lock = Lock::new(kernel);
        let before = kernel.get_priority();
        lock.acquire();
        assert_eq!(kernel.get_priority(), before);
        lock.release();
        assert_eq!(kernel.get_priority(), before);
    });
}

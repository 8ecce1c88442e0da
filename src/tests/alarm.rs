//! Tick-driven sleep scenarios.

use std::boxed::Box;
use std::sync::Mutex;
use std::vec::Vec;

use super::helpers::{run_scheduler_test, Journal};
use crate::hosted;
use crate::kernel::BootArgs;
use crate::thread::PRI_DEFAULT;

#[test]
fn sleepers_wake_in_deadline_order() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let records: &'static Mutex<Vec<(i64, i64)>> =
            Box::leak(Box::new(Mutex::new(Vec::new())));

        // Deliberately scrambled creation order; the sleep queue orders
        // by wake time, not arrival.
        let mut tids = Vec::new();
        for delay in [30i64, 10, 50, 20, 40] {
            let tid = kernel
                .create("sleeper", PRI_DEFAULT, move || {
                    let deadline = kernel.ticks() + delay;
                    kernel.sleep_until(deadline);
                    records.lock().unwrap().push((deadline, kernel.ticks()));
                })
                .unwrap();
            tids.push(tid);
        }
        // Let every sleeper reach its bed before time moves.
        kernel.yield_now();

        hosted::drive_ticks(kernel, 60);
        while tids.iter().any(|&tid| kernel.is_alive(tid)) {
            kernel.yield_now();
        }

        let records = records.lock().unwrap();
        let deadlines: Vec<i64> = records.iter().map(|&(d, _)| d).collect();
        assert_eq!(deadlines, [10, 20, 30, 40, 50]);
        for &(deadline, woke_at) in records.iter() {
            assert!(
                woke_at >= deadline,
                "woke at {} before its deadline {}",
                woke_at,
                deadline
            );
        }
    });
}

#[test]
fn equal_deadlines_wake_in_arrival_order() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        for name in ["first", "second"] {
            kernel
                .create(name, PRI_DEFAULT, move || {
                    let deadline = kernel.ticks() + 5;
                    kernel.sleep_until(deadline);
                    journal.push(name);
                })
                .unwrap();
        }
        kernel.yield_now();

        hosted::drive_ticks(kernel, 10);
        assert_eq!(journal.joined(), "first,second");
    });
}

#[test]
fn past_deadlines_wake_on_the_next_tick() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        kernel
            .create("eager", PRI_DEFAULT, move || {
                kernel.sleep_until(0);
                journal.push("woke");
            })
            .unwrap();
        kernel.yield_now();
        assert_eq!(journal.len(), 0);

        hosted::drive_ticks(kernel, 2);
        kernel.yield_now();
        assert_eq!(journal.joined(), "woke");
    });
}

#[test]
fn sleeping_threads_consume_no_cpu() {
    run_scheduler_test(BootArgs::default(), |kernel| {
        let journal = Journal::new();
        kernel
            .create("sleeper", PRI_DEFAULT + 5, move || {
                // Outranks the driver, so any spurious wakeup would run
                // and be journaled immediately.
                kernel.sleep_until(kernel.ticks() + 40);
                journal.push("woke");
            })
            .unwrap();

        hosted::drive_ticks(kernel, 39);
        assert_eq!(journal.len(), 0);
        hosted::drive_ticks(kernel, 1);
        assert_eq!(journal.joined(), "woke");
    });
}

//! Shared harness for the scenario tests.

use std::boxed::Box;
use std::string::String;
use std::sync::Mutex;
use std::vec::Vec;

use crate::hosted;
use crate::kernel::{BootArgs, Kernel};

/// Serializes the scenario tests: they share process-wide thread-local
/// identity, and each boots its own kernel.
static SERIAL: Mutex<()> = Mutex::new(());

/// Boots a fresh kernel on the calling thread and runs `body` as its
/// initial thread, then walks the scheduler invariants.
pub fn run_scheduler_test(args: BootArgs, body: impl FnOnce(&'static Kernel)) {
    let _guard = SERIAL.lock().unwrap_or_else(|poison| poison.into_inner());
    let kernel = hosted::boot("main", args);
    body(kernel);
    kernel.check_invariants();
}

/// Append-only event journal shared between threads; the order of
/// entries is the observed execution order.
#[derive(Clone, Copy)]
pub struct Journal {
    events: &'static Mutex<Vec<String>>,
}

impl Journal {
    pub fn new() -> Journal {
        Journal {
            events: Box::leak(Box::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    /// All events so far, comma-joined for compact assertions.
    pub fn joined(&self) -> String {
        self.events.lock().unwrap().join(",")
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Preemptive thread scheduling core for a teaching kernel.
//!
//! This crate is the thread system of a small uniprocessor kernel:
//! thread lifecycle, a preemptive priority scheduler with donation, the
//! multi-level feedback queue alternative, tick-driven sleep, and the
//! synchronization primitives that interact with priority. Everything
//! that touches hardware is consumed through the [`port::Port`] trait;
//! the [`hosted`] port runs the whole system on host threads for
//! deterministic testing.
//!
//! # Quick start
//!
//! ```ignore
//! use kernel_threads::{hosted, BootArgs, PRI_DEFAULT};
//!
//! let kernel = hosted::boot("main", BootArgs::default());
//! kernel.create("worker", PRI_DEFAULT, move || {
//!     // thread body
//! }).expect("spawn failed");
//! kernel.yield_now();
//! ```
//!
//! The scheduling policy is latched at boot: priority round-robin by
//! default, or the feedback-queue scheduler with the `-o mlfqs` boot
//! option (`BootArgs::from_cmdline("-o mlfqs")`).

#[cfg(any(test, feature = "std-shim"))]
extern crate std;

extern crate alloc;

pub mod collections;
pub mod errors;
pub mod fixed;
pub mod intr;
pub mod kernel;
pub mod mem;
pub mod port;
pub mod sched;
pub mod sync;
pub mod thread;

#[cfg(any(test, feature = "std-shim"))]
pub mod hosted;

#[cfg(test)]
mod tests;

pub use errors::{SpawnError, SpawnResult};
pub use fixed::Fixed;
pub use intr::Level;
pub use kernel::{BootArgs, Kernel, TIMER_FREQ, TIME_SLICE};
pub use port::{ContextRef, Entry, Port, ProcessHooks};
pub use sync::{Condvar, Lock, RwLock, Semaphore};
pub use thread::{
    ThreadState, Tid, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX, PRI_MIN,
};

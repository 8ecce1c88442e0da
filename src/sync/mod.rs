//! Synchronization primitives.
//!
//! All four build on the interrupt gate: a semaphore at the bottom, a
//! lock with priority donation over it, condition variables over
//! per-wait semaphores, and a writer-priority reader-writer lock over a
//! lock plus two condition variables.
//!
//! Handles are small `Copy` values; the state they name lives in the
//! scheduler's arenas so that blocked threads and donation chains can
//! refer to it by index.

pub mod condvar;
pub mod lock;
pub mod rwlock;
pub mod semaphore;

pub use condvar::Condvar;
pub use lock::Lock;
pub use rwlock::RwLock;
pub use semaphore::Semaphore;

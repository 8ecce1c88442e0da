//! Reader-writer lock with writer priority.
//!
//! Built from a lock and two condition variables. A pending writer
//! blocks new readers, so a stream of readers cannot starve writers;
//! when a writer leaves, waiting writers take precedence and readers
//! are only broadcast once no writer wants in.

use crate::collections::Slot;
use crate::kernel::Kernel;
use crate::sync::condvar::Condvar;
use crate::sync::lock::Lock;

/// Reader-writer state, in the scheduler's arena.
pub(crate) struct RwCb {
    readers: u32,
    writers_waiting: u32,
    writer_active: bool,
}

/// A writer-priority reader-writer lock.
#[derive(Clone, Copy)]
pub struct RwLock {
    kernel: &'static Kernel,
    id: Slot,
    monitor: Lock,
    readers_cv: Condvar,
    writers_cv: Condvar,
}

impl RwLock {
    pub fn new(kernel: &'static Kernel) -> RwLock {
        let id = kernel.with_sched(|s| {
            s.rws.insert(RwCb {
                readers: 0,
                writers_waiting: 0,
                writer_active: false,
            })
        });
        RwLock {
            kernel,
            id,
            monitor: Lock::new(kernel),
            readers_cv: Condvar::new(kernel),
            writers_cv: Condvar::new(kernel),
        }
    }

    pub fn acquire_read(&self) {
        self.monitor.acquire();
        loop {
            let must_wait = self.kernel.with_sched(|s| {
                let rw = &s.rws[self.id];
                rw.writer_active || rw.writers_waiting > 0
            });
            if !must_wait {
                break;
            }
            self.readers_cv.wait(&self.monitor);
        }
        self.kernel.with_sched(|s| s.rws[self.id].readers += 1);
        self.monitor.release();
    }

    pub fn release_read(&self) {
        self.monitor.acquire();
        let wake_writer = self.kernel.with_sched(|s| {
            let rw = &mut s.rws[self.id];
            assert!(rw.readers > 0, "rwlock: read-released with no readers");
            rw.readers -= 1;
            rw.readers == 0 && rw.writers_waiting > 0
        });
        if wake_writer {
            self.writers_cv.signal(&self.monitor);
        }
        self.monitor.release();
    }

    pub fn acquire_write(&self) {
        self.monitor.acquire();
        self.kernel.with_sched(|s| s.rws[self.id].writers_waiting += 1);
        loop {
            let must_wait = self.kernel.with_sched(|s| {
                let rw = &s.rws[self.id];
                rw.writer_active || rw.readers > 0
            });
            if !must_wait {
                break;
            }
            self.writers_cv.wait(&self.monitor);
        }
        self.kernel.with_sched(|s| {
            let rw = &mut s.rws[self.id];
            rw.writers_waiting -= 1;
            rw.writer_active = true;
        });
        self.monitor.release();
    }

    pub fn release_write(&self) {
        self.monitor.acquire();
        let writers_pending = self.kernel.with_sched(|s| {
            let rw = &mut s.rws[self.id];
            assert!(rw.writer_active, "rwlock: write-released with no writer");
            rw.writer_active = false;
            rw.writers_waiting > 0
        });
        if writers_pending {
            self.writers_cv.signal(&self.monitor);
        } else {
            self.readers_cv.broadcast(&self.monitor);
        }
        self.monitor.release();
    }
}

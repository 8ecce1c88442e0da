//! Hosted simulation port.
//!
//! Runs the scheduler on an ordinary host process for testing: every
//! kernel thread is backed by one host thread, a context switch parks
//! the old backing thread and unparks the new one, and the interrupt
//! gate is a hand-off flag keyed by the running thread's identity.
//! Timer interrupts are delivered synchronously by the test driver
//! through [`drive_ticks`], so time, and with it every interleaving, is
//! fully deterministic: nothing advances unless the driver says so.

extern crate alloc;
extern crate std;

use alloc::boxed::Box;
use core::cell::Cell;
use std::sync::Mutex as HostMutex;
use std::thread as host;
use std::time::Duration;

use portable_atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use crate::collections::Slot;
use crate::intr::Level;
use crate::kernel::{BootArgs, Kernel};
use crate::port::{ContextRef, Entry, Port};
use crate::thread::PRI_DEFAULT;

const RUN_NEW: u8 = 0;
const RUN_RUNNING: u8 = 1;
const RUN_PARKED: u8 = 2;

std::thread_local! {
    static CURRENT_SLOT: Cell<Option<Slot>> = Cell::new(None);
    static IN_INTERRUPT: Cell<bool> = Cell::new(false);
}

/// Per-thread execution context: the backing host thread and a little
/// state machine deciding whether a switch spawns, unparks, or is lost.
struct HostedContext {
    slot: Slot,
    run: AtomicU8,
    handle: HostMutex<Option<host::Thread>>,
    start: HostMutex<Option<Entry>>,
}

struct CtxPtr(*const HostedContext);

// The pointee is kept alive by the thread arena until the thread is
// reclaimed, after which nobody switches to it again.
unsafe impl Send for CtxPtr {}

/// Port implementation over host threads.
pub struct HostedPort {
    gate_locked: AtomicBool,
    /// Slot index + 1 of the gate owner; 0 when free. Ownership is
    /// handed to the target thread during a context switch, the way a
    /// real switch leaves interrupts off for the resumed side.
    gate_owner: AtomicUsize,
}

impl HostedPort {
    pub fn new() -> HostedPort {
        HostedPort {
            gate_locked: AtomicBool::new(false),
            gate_owner: AtomicUsize::new(0),
        }
    }

    fn cookie() -> usize {
        let slot = CURRENT_SLOT
            .with(|c| c.get())
            .expect("host thread has no kernel thread identity");
        slot.index() + 1
    }
}

impl Port for HostedPort {
    fn intr_disable(&self) -> Level {
        let me = Self::cookie();
        if self.gate_owner.load(Ordering::Acquire) == me {
            return Level::Off;
        }
        while self
            .gate_locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            host::yield_now();
        }
        self.gate_owner.store(me, Ordering::Release);
        Level::On
    }

    fn intr_restore(&self, level: Level) {
        if level.is_on() {
            debug_assert_eq!(
                self.gate_owner.load(Ordering::Acquire),
                Self::cookie(),
                "restoring a gate held by somebody else"
            );
            self.gate_owner.store(0, Ordering::Release);
            self.gate_locked.store(false, Ordering::Release);
        }
    }

    fn intr_level(&self) -> Level {
        if self.gate_owner.load(Ordering::Acquire) == Self::cookie() {
            Level::Off
        } else {
            Level::On
        }
    }

    fn in_interrupt(&self) -> bool {
        IN_INTERRUPT.with(|flag| flag.get())
    }

    fn current_slot(&self) -> Option<Slot> {
        CURRENT_SLOT.with(|c| c.get())
    }

    fn create_context(&self, entry: Entry) -> ContextRef {
        let ctx = Box::new(HostedContext {
            slot: entry.slot,
            run: AtomicU8::new(RUN_NEW),
            handle: HostMutex::new(None),
            start: HostMutex::new(Some(entry)),
        });
        ContextRef::new(Box::into_raw(ctx) as *const ())
    }

    fn adopt_current(&self, slot: Slot) -> ContextRef {
        CURRENT_SLOT.with(|c| c.set(Some(slot)));
        let ctx = Box::new(HostedContext {
            slot,
            run: AtomicU8::new(RUN_RUNNING),
            handle: HostMutex::new(Some(host::current())),
            start: HostMutex::new(None),
        });
        ContextRef::new(Box::into_raw(ctx) as *const ())
    }

    unsafe fn destroy_context(&self, ctx: ContextRef) {
        drop(unsafe { Box::from_raw(ctx.raw() as *mut HostedContext) });
    }

    unsafe fn context_switch(&self, prev: Option<ContextRef>, next: ContextRef) {
        let next_ctx = unsafe { &*(next.raw() as *const HostedContext) };
        let prev_ctx = prev.map(|p| unsafe { &*(p.raw() as *const HostedContext) });

        // Mark ourselves suspended before the target can possibly try to
        // switch back, then hand it the critical section and wake it.
        if let Some(prev_ctx) = prev_ctx {
            prev_ctx.run.store(RUN_PARKED, Ordering::Release);
        }
        self.gate_owner
            .store(next_ctx.slot.index() + 1, Ordering::Release);

        match next_ctx.run.load(Ordering::Acquire) {
            RUN_NEW => {
                let entry = next_ctx
                    .start
                    .lock()
                    .unwrap()
                    .take()
                    .expect("fresh context without an entry");
                let ptr = CtxPtr(next_ctx as *const HostedContext);
                next_ctx.run.store(RUN_RUNNING, Ordering::Release);
                host::Builder::new()
                    .name(std::format!("kthread-{}", next_ctx.slot.index()))
                    .spawn(move || trampoline(ptr, entry))
                    .expect("failed to spawn backing thread");
            }
            RUN_PARKED => {
                // Clone the handle out before flipping `run`: the moment
                // it reads RUNNING the target may resume on a spurious
                // wakeup, finish, and be reclaimed before the unpark
                // lands.
                let handle = next_ctx
                    .handle
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("parked context without a handle");
                next_ctx.run.store(RUN_RUNNING, Ordering::Release);
                handle.unpark();
            }
            state => unreachable!("switching to a context in state {}", state),
        }

        if let Some(prev_ctx) = prev_ctx {
            while prev_ctx.run.load(Ordering::Acquire) != RUN_RUNNING {
                host::park();
            }
        }
    }

    fn exit_thread(&self) -> ! {
        // The kernel thread this host thread backed is gone for good.
        loop {
            host::park();
        }
    }

    fn idle_wait(&self) {
        host::park_timeout(Duration::from_micros(100));
    }
}

fn trampoline(ctx: CtxPtr, entry: Entry) {
    // Register and drop the context borrow before the body runs: once
    // this thread dies, its successor frees the context.
    {
        let ctx = unsafe { &*ctx.0 };
        *ctx.handle.lock().unwrap() = Some(host::current());
        CURRENT_SLOT.with(|c| c.set(Some(ctx.slot)));
    }

    let kernel = entry.kernel;
    kernel.finish_switch();
    kernel.intr_enable();
    (entry.body)();
    kernel.exit();
}

/// Boots a scheduler whose initial thread is the calling host thread,
/// then starts preemptive scheduling.
pub fn boot(initial_name: &str, args: BootArgs) -> &'static Kernel {
    let port: &'static HostedPort = Box::leak(Box::new(HostedPort::new()));
    let kernel = Kernel::boot(args, port, None, initial_name, PRI_DEFAULT);
    kernel.start();
    kernel
}

/// Runs `handler` as a simulated interrupt on the current CPU, then
/// honors a pending yield-on-return request the way real interrupt exit
/// glue would.
pub fn interrupt(kernel: &'static Kernel, handler: impl FnOnce(&'static Kernel)) {
    let old = kernel.intr_disable();
    IN_INTERRUPT.with(|flag| flag.set(true));
    handler(kernel);
    IN_INTERRUPT.with(|flag| flag.set(false));
    kernel.intr_restore(old);
    if kernel.take_yield_request() {
        kernel.yield_now();
    }
}

/// Delivers `n` timer interrupts back to back.
pub fn drive_ticks(kernel: &'static Kernel, n: u32) {
    for _ in 0..n {
        interrupt(kernel, |k| k.tick());
    }
}

//! Platform integration contracts.
//!
//! The scheduler core owns policy and bookkeeping; everything that needs
//! hardware (masking interrupts, swapping stacks, parking an idle CPU)
//! is consumed through the [`Port`] trait. The crate ships one
//! implementation, [`crate::hosted`], which backs every thread with a
//! host thread for deterministic testing; a bare-metal integration
//! supplies its own.

extern crate alloc;
use alloc::boxed::Box;

use crate::collections::Slot;
use crate::intr::Level;
use crate::kernel::Kernel;
use crate::thread::Tid;

/// Opaque handle to a port-side execution context.
///
/// Created by [`Port::create_context`] or [`Port::adopt_current`] and
/// destroyed by [`Port::destroy_context`] when the owning thread's page is
/// reclaimed. The core never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRef(*const ());

impl ContextRef {
    pub fn new(raw: *const ()) -> ContextRef {
        ContextRef(raw)
    }

    pub fn raw(self) -> *const () {
        self.0
    }
}

// A context handle travels between host threads during a switch; the port
// that minted it is responsible for the pointee's synchronization.
unsafe impl Send for ContextRef {}

/// What a newly created thread runs.
///
/// The port's trampoline must complete the in-progress switch
/// ([`Kernel::finish_switch`]), enable interrupts, run `body`, and call
/// [`Kernel::exit`] if `body` returns.
pub struct Entry {
    pub kernel: &'static Kernel,
    pub slot: Slot,
    pub body: Box<dyn FnOnce() + Send + 'static>,
}

/// Hardware/host services consumed by the scheduler core.
///
/// Callbacks may be invoked with interrupts disabled and must not call
/// back into the scheduler.
pub trait Port: Send + Sync {
    /// Masks interrupts and returns the prior level. Nested calls return
    /// [`Level::Off`].
    fn intr_disable(&self) -> Level;

    /// Restores a level previously returned by [`Port::intr_disable`].
    fn intr_restore(&self, level: Level);

    /// Current interrupt level.
    fn intr_level(&self) -> Level;

    /// True while executing an interrupt handler.
    fn in_interrupt(&self) -> bool;

    /// Identity of the thread executing on this CPU, as last established
    /// by [`Port::adopt_current`] or the port's own trampoline.
    fn current_slot(&self) -> Option<Slot>;

    /// Builds an execution context whose first run enters the port
    /// trampoline described on [`Entry`].
    fn create_context(&self, entry: Entry) -> ContextRef;

    /// Marks the calling context as the thread in `slot` and returns a
    /// context handle for it. Used once at boot to promote the startup
    /// stack into the initial thread.
    fn adopt_current(&self, slot: Slot) -> ContextRef;

    /// Releases a context. The thread it belonged to no longer runs.
    ///
    /// # Safety
    ///
    /// `ctx` must have been minted by this port and must not be switched
    /// to afterwards.
    unsafe fn destroy_context(&self, ctx: ContextRef);

    /// Suspends the context in `prev` (if any) and resumes `next`,
    /// returning when `prev` is switched back to. With `prev` `None` the
    /// call returns immediately in the old context, which must never run
    /// as a thread again.
    ///
    /// # Safety
    ///
    /// Must be called with interrupts disabled; the caller transfers the
    /// critical section to the resumed context.
    unsafe fn context_switch(&self, prev: Option<ContextRef>, next: ContextRef);

    /// Ends the calling thread for good. Called after the final switch
    /// away from a dying thread.
    fn exit_thread(&self) -> !;

    /// Waits for the next interrupt with nothing to run.
    fn idle_wait(&self);
}

/// Hooks into the process layer, when one exists.
///
/// Invoked with interrupts disabled; implementations must not call back
/// into the scheduler.
pub trait ProcessHooks: Send + Sync {
    /// Activates the address space of the thread about to run.
    fn activate(&self, tid: Tid) {
        let _ = tid;
    }

    /// Tears down process state for an exiting thread.
    fn on_exit(&self, tid: Tid) {
        let _ = tid;
    }

    /// Whether the thread is executing user code, for tick accounting.
    fn in_user_space(&self, tid: Tid) -> bool {
        let _ = tid;
        false
    }
}

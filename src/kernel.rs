//! Scheduler core: thread lifecycle, the tick path, and the context
//! switch protocol.
//!
//! All mutable scheduler state lives in one [`Sched`] record guarded by
//! the interrupt gate; on this uniprocessor design, disabling interrupts
//! *is* mutual exclusion. Public entry points disable interrupts, operate
//! on the record, and restore the caller's level. The only lock-free
//! exception is the thread id allocator, which hands out ids outside
//! critical sections.

extern crate alloc;
use alloc::boxed::Box;

use core::cell::UnsafeCell;

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::collections::{List, Slab, Slot};
use crate::errors::{SpawnError, SpawnResult};
use crate::fixed::Fixed;
use crate::intr::Level;
use crate::mem::StackPool;
use crate::port::{ContextRef, Entry, Port, ProcessHooks};
use crate::sched::{MlfqsReady, PriorityReady, ReadyPolicy};
use crate::sync::condvar::CondCb;
use crate::sync::lock::LockCb;
use crate::sync::rwlock::RwCb;
use crate::sync::semaphore::SemaCb;
use crate::sync::{Lock, Semaphore};
use crate::thread::{
    QueueTag, ThreadCb, ThreadName, ThreadState, Tid, DONATION_DEPTH_MAX, LINK_ALL, LINK_QUEUE,
    NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN,
};

/// Timer ticks between enforced preemptions.
pub const TIME_SLICE: u32 = 4;

/// Timer interrupts per second; one "second" of feedback-queue accounting
/// is this many ticks.
pub const TIMER_FREQ: i64 = 100;

/// Ticks between feedback-queue priority recomputations.
const PRIORITY_RECALC_TICKS: i64 = 4;

/// Boot-time configuration, latched once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootArgs {
    /// Use the multi-level feedback queue scheduler instead of priority
    /// round-robin.
    pub mlfqs: bool,
}

impl BootArgs {
    /// Parses kernel command-line tokens. `-o mlfqs` selects the feedback
    /// queue scheduler; unknown options are ignored with a warning.
    pub fn parse<'a>(args: impl IntoIterator<Item = &'a str>) -> BootArgs {
        let mut parsed = BootArgs::default();
        let mut iter = args.into_iter();
        while let Some(token) = iter.next() {
            if token == "-o" {
                match iter.next() {
                    Some("mlfqs") => parsed.mlfqs = true,
                    Some(other) => log::warn!("ignoring unknown option: -o {}", other),
                    None => log::warn!("-o requires an argument"),
                }
            }
        }
        parsed
    }

    /// Parses a whitespace-separated command line.
    pub fn from_cmdline(line: &str) -> BootArgs {
        Self::parse(line.split_whitespace())
    }
}

/// Everything the gate protects.
pub(crate) struct Sched {
    pub(crate) threads: Slab<ThreadCb>,
    pub(crate) locks: Slab<LockCb>,
    pub(crate) semas: Slab<SemaCb>,
    pub(crate) conds: Slab<CondCb>,
    pub(crate) rws: Slab<RwCb>,

    /// Every live thread, in creation order.
    all: List<ThreadCb>,
    /// Threads waiting for a wake tick, ordered by wake time.
    sleepers: List<ThreadCb>,
    pub(crate) policy: Box<dyn ReadyPolicy>,
    pub(crate) mlfqs: bool,

    pub(crate) current: Slot,
    previous: Option<Slot>,
    pub(crate) idle: Option<Slot>,
    initial: Slot,

    ticks: i64,
    slice: u32,
    load_avg: Fixed,
    idle_ticks: i64,
    kernel_ticks: i64,
    user_ticks: i64,
}

struct SchedCell(UnsafeCell<Sched>);

// The record is only touched with interrupts disabled; the gate is the
// lock.
unsafe impl Sync for SchedCell {}
unsafe impl Send for SchedCell {}

/// The scheduler singleton, constructed once at boot.
pub struct Kernel {
    sched: SchedCell,
    port: &'static dyn Port,
    hooks: Option<&'static dyn ProcessHooks>,
    stack_pool: StackPool,
    next_tid: AtomicU32,
    yield_requested: AtomicBool,
    sched_busy: AtomicBool,
    mlfqs: bool,
}

enum SwitchPlan {
    Swap { prev: ContextRef, next: ContextRef },
    TailOnly,
}

impl Kernel {
    /// Promotes the currently executing context into the initial thread
    /// and builds the scheduler around it. Returns with interrupts
    /// disabled; [`Kernel::start`] enables them.
    pub fn boot(
        args: BootArgs,
        port: &'static dyn Port,
        hooks: Option<&'static dyn ProcessHooks>,
        initial_name: &str,
        initial_priority: i32,
    ) -> &'static Kernel {
        let policy: Box<dyn ReadyPolicy> = if args.mlfqs {
            Box::new(MlfqsReady::new())
        } else {
            Box::new(PriorityReady::new())
        };

        let mut threads = Slab::new();
        let mut all = List::new(LINK_ALL);
        let mut initial = ThreadCb::new(Tid::new(1), initial_name, initial_priority);
        initial.state = ThreadState::Running;
        let slot = threads.insert(initial);
        all.push_back(&mut threads, slot);

        let kernel: &'static Kernel = Box::leak(Box::new(Kernel {
            sched: SchedCell(UnsafeCell::new(Sched {
                threads,
                locks: Slab::new(),
                semas: Slab::new(),
                conds: Slab::new(),
                rws: Slab::new(),
                all,
                sleepers: List::new(LINK_QUEUE),
                policy,
                mlfqs: args.mlfqs,
                current: slot,
                previous: None,
                idle: None,
                initial: slot,
                ticks: 0,
                slice: 0,
                load_avg: Fixed::ZERO,
                idle_ticks: 0,
                kernel_ticks: 0,
                user_ticks: 0,
            })),
            port,
            hooks,
            stack_pool: StackPool::new(),
            next_tid: AtomicU32::new(2),
            yield_requested: AtomicBool::new(false),
            sched_busy: AtomicBool::new(false),
            mlfqs: args.mlfqs,
        }));

        let ctx = port.adopt_current(slot);
        kernel.with_sched(|s| s.threads[slot].context = Some(ctx));

        // Scheduling starts with interrupts off; start() enables them.
        let _ = port.intr_disable();

        log::info!(
            "thread scheduler up, policy: {}",
            if args.mlfqs { "mlfqs" } else { "priority round-robin" }
        );
        kernel
    }

    /// Starts preemptive scheduling: creates the idle thread, enables
    /// interrupts, and waits for idle to report in.
    pub fn start(&'static self) {
        assert_eq!(self.intr_level(), Level::Off, "start: interrupts already on");

        let started = Semaphore::new(self, 0);
        self.create("idle", PRI_MIN, move || idle_loop_entry(started))
            .expect("failed to create the idle thread");

        self.intr_enable();
        started.down();
    }

    /// Creates a thread and makes it runnable. The new thread may run,
    /// and even exit, before this returns; the caller is preempted right
    /// away if the new thread outranks it.
    pub fn create<F>(&'static self, name: &str, priority: i32, body: F) -> SpawnResult<Tid>
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "create: priority {} out of range",
            priority
        );
        // Feedback-queue threads start at the top and earn their level.
        let priority = if self.mlfqs { PRI_MAX } else { priority };

        let stack = self.stack_pool.allocate().ok_or(SpawnError::OutOfMemory)?;
        let tid = Tid::new(self.next_tid.fetch_add(1, Ordering::AcqRel));

        let slot = self.with_sched(|s| {
            let mut cb = ThreadCb::new(tid, name, priority);
            cb.stack = Some(stack);
            if s.mlfqs {
                let parent = &s.threads[s.current];
                cb.nice = parent.nice;
                cb.recent_cpu = parent.recent_cpu;
            }
            let slot = s.threads.insert(cb);
            s.all.push_back(&mut s.threads, slot);
            if s.mlfqs {
                s.recompute_priority(slot);
            }
            slot
        });

        let ctx = self.port.create_context(Entry {
            kernel: self,
            slot,
            body: Box::new(body),
        });
        self.with_sched(|s| {
            s.threads[slot].context = Some(ctx);
            s.unblock_slot(slot);
        });

        log::trace!("created thread {} '{}'", tid, name);
        self.preempt_if_outranked();
        Ok(tid)
    }

    /// Blocks the calling thread until someone unblocks it. Must be
    /// called with interrupts disabled; the synchronization primitives
    /// are usually the better interface.
    pub fn block(&'static self) {
        assert!(
            !self.port.in_interrupt(),
            "block: called from interrupt context"
        );
        assert_eq!(self.intr_level(), Level::Off, "block: interrupts enabled");
        self.with_sched(|s| {
            let current = s.current;
            s.threads[current].state = ThreadState::Blocked;
        });
        self.reschedule();
    }

    /// Makes a blocked thread runnable. Does *not* preempt the caller,
    /// so unblocks can be batched atomically under one disable.
    pub fn unblock(&self, tid: Tid) {
        self.with_sched(|s| {
            let slot = s.slot_of(tid).expect("unblock: no such thread");
            s.unblock_slot(slot);
        });
    }

    /// Yields the CPU; the caller stays runnable and may be rescheduled
    /// immediately.
    pub fn yield_now(&'static self) {
        assert!(
            !self.port.in_interrupt(),
            "yield: called from interrupt context"
        );
        let old = self.intr_disable();
        self.with_sched(|s| {
            let current = s.current;
            if Some(current) != s.idle {
                s.policy.insert(&mut s.threads, current);
            }
            s.threads[current].state = ThreadState::Ready;
        });
        self.reschedule();
        self.intr_restore(old);
    }

    /// Deschedules and destroys the calling thread. The page is reclaimed
    /// by whichever thread runs next; held locks are released without
    /// preemption on the way out.
    pub fn exit(&'static self) -> ! {
        assert!(
            !self.port.in_interrupt(),
            "exit: called from interrupt context"
        );
        let _ = self.intr_disable(); // never restored; the successor inherits the critical section

        let tid = self.with_sched(|s| {
            let current = s.current;
            s.all.remove(&mut s.threads, current);
            s.threads[current].tid
        });
        if let Some(hooks) = self.hooks {
            hooks.on_exit(tid);
        }

        loop {
            let held = self.with_sched(|s| s.threads[s.current].held.front());
            match held {
                Some(lock) => Lock::from_parts(self, lock).release_no_preempt(),
                None => break,
            }
        }

        log::trace!("thread {} exiting", tid);
        self.with_sched(|s| {
            let current = s.current;
            s.threads[current].state = ThreadState::Dying;
        });
        self.schedule_and_exit()
    }

    /// Yields iff some ready thread strictly outranks the caller.
    pub fn preempt(&'static self) {
        assert!(
            !self.port.in_interrupt(),
            "preempt: called from interrupt context"
        );
        self.preempt_if_outranked();
    }

    /// Timer interrupt entry: advances the tick counter, runs CPU
    /// accounting and sleep wakeups, and requests a yield on interrupt
    /// return when the running thread should give way.
    pub fn tick(&self) {
        debug_assert!(self.port.in_interrupt(), "tick: not in interrupt context");
        let old = self.intr_disable();
        let request = self.with_sched(|s| {
            s.ticks += 1;
            let now = s.ticks;
            let current = s.current;

            if Some(current) == s.idle {
                s.idle_ticks += 1;
            } else if self
                .hooks
                .map_or(false, |h| h.in_user_space(s.threads[current].tid))
            {
                s.user_ticks += 1;
            } else {
                s.kernel_ticks += 1;
            }

            if s.mlfqs {
                if Some(current) != s.idle {
                    s.threads[current].recent_cpu = s.threads[current].recent_cpu.add_int(1);
                }
                if now % TIMER_FREQ == 0 {
                    s.update_load_avg();
                    s.recompute_all_recent_cpu();
                    s.recompute_all_priorities();
                } else if now % PRIORITY_RECALC_TICKS == 0 {
                    s.recompute_all_priorities();
                }
            }

            let mut request = false;
            if let Some(woken_top) = s.wake_sleepers(now) {
                if woken_top > s.threads[s.current].effective {
                    request = true;
                }
            }

            s.slice += 1;
            if s.slice >= TIME_SLICE {
                request = true;
            }
            request
        });
        if request {
            self.yield_requested.store(true, Ordering::Release);
        }
        self.intr_restore(old);
    }

    /// Wakes every sleeper whose wake tick has arrived. Normally driven
    /// by [`Kernel::tick`]; callable on its own from timer interrupt
    /// glue.
    pub fn check_sleeping(&self, now: i64) {
        assert!(
            self.port.in_interrupt(),
            "check_sleeping: not in interrupt context"
        );
        let request = self.with_sched(|s| match s.wake_sleepers(now) {
            Some(top) => top > s.threads[s.current].effective,
            None => false,
        });
        if request {
            self.yield_requested.store(true, Ordering::Release);
        }
    }

    /// Blocks the caller until the timer reaches `wake_tick`.
    pub fn sleep_until(&'static self, wake_tick: i64) {
        assert!(
            !self.port.in_interrupt(),
            "sleep: called from interrupt context"
        );
        let old = self.intr_disable();
        self.with_sched(|s| {
            let current = s.current;
            debug_assert_eq!(s.threads[current].state, ThreadState::Running);
            s.threads[current].wake_time = wake_tick;
            s.threads[current].queue_tag = Some(QueueTag::Sleep);
            s.sleepers
                .insert_ordered(&mut s.threads, current, |cb| cb.wake_time);
        });
        self.block();
        self.intr_restore(old);
    }

    /// Ticks since boot.
    pub fn ticks(&self) -> i64 {
        self.with_sched(|s| s.ticks)
    }

    /// Consumes a pending yield-on-return request. Interrupt exit glue
    /// calls this after the handler and yields on its behalf.
    pub fn take_yield_request(&self) -> bool {
        self.yield_requested.swap(false, Ordering::AcqRel)
    }

    /// Sets the caller's base priority and recomputes its effective
    /// priority against outstanding donations. A no-op under the
    /// feedback-queue policy, where priorities are computed, not set.
    pub fn set_priority(&'static self, priority: i32) {
        if self.mlfqs {
            return;
        }
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "set_priority: {} out of range",
            priority
        );
        self.with_sched(|s| {
            let current = s.current;
            s.threads[current].priority = priority;
            s.refresh_effective(current);
        });
        self.preempt_if_outranked();
    }

    /// The caller's effective priority.
    pub fn get_priority(&self) -> i32 {
        self.with_sched(|s| s.threads[s.current].effective)
    }

    /// Sets the caller's niceness and recomputes its priority. Only
    /// meaningful under the feedback-queue policy.
    pub fn set_nice(&'static self, nice: i32) {
        if !self.mlfqs {
            return;
        }
        assert!(
            (NICE_MIN..=NICE_MAX).contains(&nice),
            "set_nice: {} out of range",
            nice
        );
        self.with_sched(|s| {
            let current = s.current;
            s.threads[current].nice = nice;
            s.recompute_priority(current);
        });
        self.preempt_if_outranked();
    }

    /// The caller's niceness.
    pub fn get_nice(&self) -> i32 {
        self.with_sched(|s| s.threads[s.current].nice)
    }

    /// 100 times the system load average, rounded to nearest.
    pub fn load_avg_x100(&self) -> i32 {
        self.with_sched(|s| s.load_avg.mul_int(100).to_int_round())
    }

    /// 100 times the caller's recent CPU figure, rounded to nearest.
    pub fn recent_cpu_x100(&self) -> i32 {
        self.with_sched(|s| s.threads[s.current].recent_cpu.mul_int(100).to_int_round())
    }

    /// Id of the calling thread.
    pub fn current(&self) -> Tid {
        self.with_sched(|s| {
            let cb = &s.threads[s.current];
            cb.check();
            cb.tid
        })
    }

    /// Name of the calling thread.
    pub fn name(&self) -> ThreadName {
        self.with_sched(|s| s.threads[s.current].name.clone())
    }

    /// Whether a thread with this id has not yet exited.
    pub fn is_alive(&self, tid: Tid) -> bool {
        self.with_sched(|s| s.slot_of(tid).is_some())
    }

    /// Runs `f` on every live thread's control block. The caller must
    /// have interrupts disabled, and `f` must not call back into the
    /// scheduler.
    pub fn for_each_thread(&self, mut f: impl FnMut(&ThreadCb)) {
        assert_eq!(
            self.intr_level(),
            Level::Off,
            "for_each_thread: interrupts enabled"
        );
        self.with_sched(|s| {
            for slot in s.all.iter(&s.threads) {
                f(&s.threads[slot]);
            }
        });
    }

    /// Logs the tick accounting counters.
    pub fn print_stats(&self) {
        let (idle, kernel, user) = self.with_sched(|s| (s.idle_ticks, s.kernel_ticks, s.user_ticks));
        log::info!(
            "thread: {} idle ticks, {} kernel ticks, {} user ticks",
            idle,
            kernel,
            user
        );
    }

    /// Masks interrupts, returning the prior level.
    pub fn intr_disable(&self) -> Level {
        self.port.intr_disable()
    }

    /// Restores a level returned by [`Kernel::intr_disable`].
    pub fn intr_restore(&self, level: Level) {
        self.port.intr_restore(level);
    }

    /// Enables interrupts unconditionally.
    pub fn intr_enable(&self) {
        self.port.intr_restore(Level::On);
    }

    /// Current interrupt level.
    pub fn intr_level(&self) -> Level {
        self.port.intr_level()
    }

    /// True while running in interrupt context.
    pub fn in_interrupt(&self) -> bool {
        self.port.in_interrupt()
    }

    /// Caps the stack page pool, for exercising creation failure.
    pub fn set_stack_limit(&self, limit: Option<usize>) {
        self.stack_pool.set_limit(limit);
    }

    /// Completes an in-progress context switch on the new thread's side:
    /// marks it running, starts a fresh time slice, activates its address
    /// space, and reclaims the previous thread if it was dying.
    ///
    /// Called from [`Kernel::reschedule`] after a switch returns, and by
    /// port trampolines before a new thread's body runs.
    pub fn finish_switch(&self) {
        let (tid, reclaim) = self.with_sched(|s| {
            let current = s.current;
            let cb = &mut s.threads[current];
            cb.check();
            debug_assert_ne!(cb.state, ThreadState::Dying);
            cb.state = ThreadState::Running;
            s.slice = 0;

            let reclaim = match s.previous.take() {
                Some(prev)
                    if prev != current
                        && prev != s.initial
                        && s.threads[prev].state == ThreadState::Dying =>
                {
                    let dead = s.threads.remove(prev);
                    Some((dead.stack, dead.context))
                }
                _ => None,
            };
            (s.threads[current].tid, reclaim)
        });

        if let Some(hooks) = self.hooks {
            hooks.activate(tid);
        }
        if let Some((stack, context)) = reclaim {
            if let Some(stack) = stack {
                self.stack_pool.release(stack);
            }
            if let Some(context) = context {
                // The thread is gone; nothing will switch to it again.
                unsafe { self.port.destroy_context(context) };
            }
        }
    }

    // ----- internals -----------------------------------------------------

    /// Runs `f` with exclusive access to the scheduler record.
    ///
    /// Exclusivity comes from the interrupt gate; the busy flag only
    /// catches accidental reentry in debug builds. `f` must not suspend
    /// and must not call scheduler entry points.
    pub(crate) fn with_sched<R>(&self, f: impl FnOnce(&mut Sched) -> R) -> R {
        let old = self.port.intr_disable();
        debug_assert!(
            !self.sched_busy.swap(true, Ordering::AcqRel),
            "scheduler state reentered"
        );
        let result = f(unsafe { &mut *self.sched.0.get() });
        self.sched_busy.store(false, Ordering::Release);
        self.port.intr_restore(old);
        result
    }

    pub(crate) fn preempt_if_outranked(&'static self) {
        let outranked = self.with_sched(|s| {
            match s.policy.top_priority(&s.threads) {
                Some(top) => top > s.threads[s.current].effective,
                None => false,
            }
        });
        if !outranked {
            return;
        }
        if self.port.in_interrupt() {
            self.yield_requested.store(true, Ordering::Release);
        } else {
            self.yield_now();
        }
    }

    /// Picks the next thread and switches to it. Requires interrupts off
    /// and the current thread already moved out of `Running`. Returns
    /// when the calling thread is next scheduled.
    pub(crate) fn reschedule(&self) {
        debug_assert_eq!(self.intr_level(), Level::Off);
        let plan = self.with_sched(|s| {
            let current = s.current;
            debug_assert_ne!(s.threads[current].state, ThreadState::Running);
            let next = s.pick_next();
            s.previous = Some(current);
            s.current = next;
            if next == current {
                SwitchPlan::TailOnly
            } else {
                SwitchPlan::Swap {
                    prev: s.threads[current].context.expect("thread without context"),
                    next: s.threads[next].context.expect("thread without context"),
                }
            }
        });
        if let SwitchPlan::Swap { prev, next } = plan {
            // Returns when somebody switches back to us.
            unsafe { self.port.context_switch(Some(prev), next) };
        }
        self.finish_switch();
    }

    /// Final departure of a dying thread. Never returns.
    fn schedule_and_exit(&self) -> ! {
        debug_assert_eq!(self.intr_level(), Level::Off);
        let next = self.with_sched(|s| {
            let current = s.current;
            debug_assert_eq!(s.threads[current].state, ThreadState::Dying);
            let next = s.pick_next();
            debug_assert_ne!(next, current);
            s.previous = Some(current);
            s.current = next;
            s.threads[next].context.expect("thread without context")
        });
        unsafe { self.port.context_switch(None, next) };
        self.port.exit_thread()
    }

    fn port_idle_wait(&self) {
        self.port.idle_wait();
    }
}

/// The idle thread: registers itself, reports in, then stays blocked,
/// re-entered only when the ready structure is empty.
fn idle_loop_entry(started: Semaphore) {
    let kernel = started.kernel();
    kernel.with_sched(|s| {
        s.idle = Some(s.current);
    });
    started.up();

    loop {
        let _ = kernel.intr_disable();
        kernel.block();
        // Atomically re-enable interrupts and wait for the next one.
        kernel.intr_enable();
        kernel.port_idle_wait();
    }
}

impl Sched {
    pub(crate) fn slot_of(&self, tid: Tid) -> Option<Slot> {
        self.all
            .iter(&self.threads)
            .find(|&slot| self.threads[slot].tid == tid)
    }

    /// Next thread to run; the idle thread when nothing is ready.
    fn pick_next(&mut self) -> Slot {
        match self.policy.remove_next(&mut self.threads) {
            Some(slot) => {
                debug_assert_eq!(self.threads[slot].state, ThreadState::Ready);
                slot
            }
            None => self.idle.expect("ready structure empty and no idle thread"),
        }
    }

    /// Transitions a blocked thread to ready. Callers batch these; no
    /// preemption happens here.
    pub(crate) fn unblock_slot(&mut self, slot: Slot) {
        let cb = &self.threads[slot];
        cb.check();
        assert_eq!(
            cb.state,
            ThreadState::Blocked,
            "unblock: thread {} not blocked",
            cb.tid
        );
        self.policy.insert(&mut self.threads, slot);
        self.threads[slot].state = ThreadState::Ready;
    }

    /// Pops due sleepers off the sleep queue and unblocks them. Returns
    /// the best effective priority among the woken, if any. Each node is
    /// removed *before* the unblock, because the ready queue reuses it.
    fn wake_sleepers(&mut self, now: i64) -> Option<i32> {
        let mut top: Option<i32> = None;
        while let Some(slot) = self.sleepers.front() {
            if self.threads[slot].wake_time > now {
                break;
            }
            self.sleepers.remove(&mut self.threads, slot);
            self.threads[slot].queue_tag = None;
            self.unblock_slot(slot);
            let eff = self.threads[slot].effective;
            top = Some(top.map_or(eff, |t: i32| t.max(eff)));
        }
        top
    }

    /// Donates the caller's effective priority along the chain of lock
    /// holders it is transitively blocked on.
    pub(crate) fn donate_priority(&mut self, from: Slot) {
        let donor = self.threads[from].effective;
        let mut cursor = from;
        for _ in 0..DONATION_DEPTH_MAX {
            let Some(lock) = self.threads[cursor].waiting_on else {
                break;
            };
            let Some(holder) = self.locks[lock].holder else {
                break;
            };
            if self.threads[holder].effective >= donor {
                break;
            }
            self.threads[holder].effective = donor;
            cursor = holder;
        }
    }

    /// Recomputes a thread's effective priority as the max of its base
    /// priority and the effective priorities of every waiter on every
    /// lock it still holds.
    pub(crate) fn refresh_effective(&mut self, slot: Slot) {
        let mut effective = self.threads[slot].priority;
        let held = self.threads[slot].held;
        for lock in held.iter(&self.locks) {
            let waiters = self.semas[self.locks[lock].sema].waiters;
            for waiter in waiters.iter(&self.threads) {
                effective = effective.max(self.threads[waiter].effective);
            }
        }
        self.threads[slot].effective = effective;
    }

    /// `priority = PRI_MAX - recent_cpu/4 - nice*2`, clamped. Ready
    /// threads whose priority changed move to their new queue.
    pub(crate) fn recompute_priority(&mut self, slot: Slot) {
        if Some(slot) == self.idle {
            return;
        }
        let cb = &self.threads[slot];
        let raw = Fixed::from_int(PRI_MAX) - cb.recent_cpu.div_int(4) - Fixed::from_int(cb.nice * 2);
        let new = raw.to_int().clamp(PRI_MIN, PRI_MAX);

        let old = self.threads[slot].effective;
        self.threads[slot].priority = new;
        self.threads[slot].effective = new;
        self.policy.reposition(&mut self.threads, slot, old);
    }

    fn recompute_all_priorities(&mut self) {
        let mut cursor = self.all.front();
        while let Some(slot) = cursor {
            cursor = self.all.next(&self.threads, slot);
            self.recompute_priority(slot);
        }
    }

    /// `recent_cpu = 2*load_avg/(2*load_avg + 1) * recent_cpu + nice`.
    fn recompute_all_recent_cpu(&mut self) {
        let twice_load = self.load_avg.mul_int(2);
        let coefficient = twice_load.div(twice_load.add_int(1));
        let mut cursor = self.all.front();
        while let Some(slot) = cursor {
            cursor = self.all.next(&self.threads, slot);
            if Some(slot) == self.idle {
                continue;
            }
            let cb = &mut self.threads[slot];
            cb.recent_cpu = coefficient.mul(cb.recent_cpu).add_int(cb.nice);
        }
    }

    /// `load_avg = (59/60)*load_avg + (1/60)*ready_count`, where the
    /// count covers running and ready threads, idle excluded.
    fn update_load_avg(&mut self) {
        let mut active = 0;
        for slot in self.all.iter(&self.threads) {
            if Some(slot) != self.idle && self.threads[slot].is_runnable() {
                active += 1;
            }
        }
        let fifty_nine_sixty = Fixed::from_int(59).div(Fixed::from_int(60));
        self.load_avg =
            fifty_nine_sixty.mul(self.load_avg) + Fixed::from_int(active).div(Fixed::from_int(60));
    }
}


#[cfg(any(test, feature = "std-shim"))]
impl Kernel {
    /// Walks the whole scheduler state and asserts its structural
    /// invariants. Test instrumentation.
    pub fn check_invariants(&self) {
        self.with_sched(|s| {
            let mut running = 0;
            for slot in s.all.iter(&s.threads) {
                let cb = &s.threads[slot];
                cb.check();
                assert!(cb.effective >= cb.priority || s.mlfqs);
                match cb.state {
                    ThreadState::Running => {
                        running += 1;
                        assert_eq!(slot, s.current, "running thread is not current");
                        assert!(cb.queue_tag.is_none());
                    }
                    ThreadState::Ready => {
                        if Some(slot) != s.idle {
                            assert_eq!(
                                cb.queue_tag,
                                Some(QueueTag::Ready),
                                "ready thread {} not on the ready structure",
                                cb.tid
                            );
                        }
                    }
                    ThreadState::Blocked => {
                        assert_ne!(cb.queue_tag, Some(QueueTag::Ready));
                    }
                    ThreadState::Dying => panic!("dying thread {} still listed", cb.tid),
                }
            }
            assert_eq!(running, 1, "exactly one thread must be running");

            for (lock_slot, lock) in s.locks.iter() {
                if let Some(holder) = lock.holder {
                    assert!(
                        s.threads[holder].held.iter(&s.locks).any(|l| l == lock_slot),
                        "lock not in its holder's held set"
                    );
                }
                for waiter in s.semas[lock.sema].waiters.iter(&s.threads) {
                    assert_eq!(s.threads[waiter].state, ThreadState::Blocked);
                    assert_eq!(s.threads[waiter].waiting_on, Some(lock_slot));
                }
            }

            if !s.mlfqs {
                for slot in s.all.iter(&s.threads) {
                    let mut expected = s.threads[slot].priority;
                    for lock in s.threads[slot].held.iter(&s.locks) {
                        for waiter in s.semas[s.locks[lock].sema].waiters.iter(&s.threads) {
                            expected = expected.max(s.threads[waiter].effective);
                        }
                    }
                    assert_eq!(
                        s.threads[slot].effective, expected,
                        "effective priority of {} out of date",
                        s.threads[slot].tid
                    );
                }
            }
        });
    }
}

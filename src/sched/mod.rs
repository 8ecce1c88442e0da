//! Ready-thread selection policies.
//!
//! The policy is latched once at boot: priority round-robin with donation
//! by default, or the multi-level feedback queue scheduler when the boot
//! command line asks for it. Both honor the same tie-break rule: FIFO
//! among equal effective priorities, and the running thread yields only
//! when strictly exceeded.

pub mod mlfqs;
pub mod rr;
pub mod trait_def;

pub use mlfqs::MlfqsReady;
pub use rr::PriorityReady;
pub use trait_def::ReadyPolicy;

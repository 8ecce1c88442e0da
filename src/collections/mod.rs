//! Arena-backed collections for scheduler bookkeeping.
//!
//! Threads and locks live in long-lived arenas ([`slab::Slab`]) and refer
//! to each other by [`slab::Slot`] index instead of by pointer. Queue
//! membership is expressed with doubly-linked lists whose `prev`/`next`
//! links are embedded in the arena records themselves ([`list::List`]),
//! which keeps removal O(1) on the wake and donation paths.

pub mod list;
pub mod slab;

pub use list::{Links, List, Node};
pub use slab::{Slab, Slot};

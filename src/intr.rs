//! Interrupt level.
//!
//! The interrupt gate is the kernel's one and only critical-section
//! primitive: every mutation of scheduler state happens with interrupts
//! disabled. Disabling is idempotent; a nested disable observes `Off` and
//! its matching restore leaves interrupts off, so only the outermost
//! restore actually re-enables.

/// Whether interrupts are deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Interrupts are masked.
    Off,
    /// Interrupts are deliverable.
    On,
}

impl Level {
    pub fn is_on(self) -> bool {
        self == Level::On
    }
}

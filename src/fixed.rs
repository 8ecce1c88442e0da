//! 17.14 signed fixed-point arithmetic.
//!
//! The load average and per-thread recent-CPU figures are fractional, but
//! the kernel has no floating point. Values are stored as `i32` with the
//! low 14 bits holding the fraction. Products and quotients go through a
//! 64-bit intermediate so the sign of intermediate results is preserved.
//!
//! Division and `to_int` truncate toward zero, matching C integer
//! division; the rounding conversion is only used by the monitoring
//! getters (`get_load_avg_x100` and friends).

use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Number of fraction bits.
pub const FRAC_BITS: u32 = 14;

/// Fixed-point scale factor, 2^14.
pub const SCALE: i32 = 1 << FRAC_BITS;

/// A 17.14 signed fixed-point number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixed(i32);

impl Fixed {
    /// Zero.
    pub const ZERO: Fixed = Fixed(0);

    /// Converts an integer to fixed point.
    pub const fn from_int(n: i32) -> Fixed {
        Fixed(n * SCALE)
    }

    /// Builds a fixed-point value from a raw 17.14 representation.
    pub const fn from_raw(raw: i32) -> Fixed {
        Fixed(raw)
    }

    /// Raw 17.14 representation.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Converts to an integer, truncating toward zero.
    pub const fn to_int(self) -> i32 {
        self.0 / SCALE
    }

    /// Converts to an integer, rounding to nearest.
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + SCALE / 2) / SCALE
        } else {
            (self.0 - SCALE / 2) / SCALE
        }
    }

    /// Fixed-point multiply through a 64-bit intermediate.
    pub fn mul(self, other: Fixed) -> Fixed {
        Fixed(((self.0 as i64 * other.0 as i64) / SCALE as i64) as i32)
    }

    /// Fixed-point divide through a 64-bit intermediate, truncating
    /// toward zero.
    pub fn div(self, other: Fixed) -> Fixed {
        Fixed(((self.0 as i64 * SCALE as i64) / other.0 as i64) as i32)
    }

    /// Adds an integer.
    pub const fn add_int(self, n: i32) -> Fixed {
        Fixed(self.0 + n * SCALE)
    }

    /// Subtracts an integer.
    pub const fn sub_int(self, n: i32) -> Fixed {
        Fixed(self.0 - n * SCALE)
    }

    /// Multiplies by an integer.
    pub const fn mul_int(self, n: i32) -> Fixed {
        Fixed(self.0 * n)
    }

    /// Divides by an integer, truncating toward zero.
    pub const fn div_int(self, n: i32) -> Fixed {
        Fixed(self.0 / n)
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0 + other.0)
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, other: Fixed) {
        self.0 += other.0;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0 - other.0)
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, other: Fixed) {
        self.0 -= other.0;
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}

// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
#![allow(clippy::float_cmp)]

use crate::descriptor::ValueKind;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};
use std::rc::Rc;

/// The concrete shadow value carried by every symbolic expression.
///
/// Values are width agnostic: the instruction handler decides whether an integer is 32 or 64 bits
/// wide and whether a real is single or double precision, and the transfer functions below take
/// that decision as a parameter. Reals are stored as the bits of an f64 to make them comparable
/// and hashable, so a float is kept as its exact f64 widening.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ConcreteValue {
    /// Any integral value, sign extended to 64 bits. Booleans are 0 or 1.
    Integer(i64),
    /// A floating point value, stored as the bits of an f64.
    Real(u64),
    /// The contents of a string.
    Str(Rc<str>),
}

impl From<bool> for ConcreteValue {
    fn from(b: bool) -> ConcreteValue {
        ConcreteValue::Integer(b as i64)
    }
}

impl From<i32> for ConcreteValue {
    fn from(i: i32) -> ConcreteValue {
        ConcreteValue::Integer(i as i64)
    }
}

impl From<i64> for ConcreteValue {
    fn from(i: i64) -> ConcreteValue {
        ConcreteValue::Integer(i)
    }
}

impl From<f32> for ConcreteValue {
    fn from(f: f32) -> ConcreteValue {
        ConcreteValue::Real((f as f64).to_bits())
    }
}

impl From<f64> for ConcreteValue {
    fn from(f: f64) -> ConcreteValue {
        ConcreteValue::Real(f.to_bits())
    }
}

impl From<&str> for ConcreteValue {
    fn from(s: &str) -> ConcreteValue {
        ConcreteValue::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for ConcreteValue {
    fn from(s: Rc<str>) -> ConcreteValue {
        ConcreteValue::Str(s)
    }
}

impl Display for ConcreteValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ConcreteValue::Integer(i) => write!(f, "{}", i),
            ConcreteValue::Real(bits) => write!(f, "{}", f64::from_bits(*bits)),
            ConcreteValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Accessors
impl ConcreteValue {
    /// The value as a 64 bit integer. Reals are truncated the way the JVM truncates them.
    pub fn as_i64(&self) -> i64 {
        match self {
            ConcreteValue::Integer(i) => *i,
            ConcreteValue::Real(bits) => f64::from_bits(*bits) as i64,
            ConcreteValue::Str(..) => 0,
        }
    }

    /// The value truncated to 32 bits.
    pub fn as_i32(&self) -> i32 {
        self.as_i64() as i32
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ConcreteValue::Integer(i) => *i as f64,
            ConcreteValue::Real(bits) => f64::from_bits(*bits),
            ConcreteValue::Str(..) => f64::NAN,
        }
    }

    /// True for a real that is not a number.
    pub fn is_nan(&self) -> bool {
        matches!(self, ConcreteValue::Real(bits) if f64::from_bits(*bits).is_nan())
    }

    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }

    pub fn as_str(&self) -> Option<&str> {
        if let ConcreteValue::Str(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// True if a stored value is still consistent with a freshly observed concrete value.
    /// Uses the equality of the value's own domain, so NaN never matches anything.
    pub fn matches(&self, other: &ConcreteValue) -> bool {
        match (self, other) {
            (ConcreteValue::Integer(a), ConcreteValue::Integer(b)) => a == b,
            (ConcreteValue::Real(a), ConcreteValue::Real(b)) => {
                f64::from_bits(*a) == f64::from_bits(*b)
            }
            (ConcreteValue::Str(a), ConcreteValue::Str(b)) => a == b,
            _ => false,
        }
    }

    /// Brings the value into the range of the given kind: 32 bit wrap around for ints and
    /// single precision rounding for floats.
    pub fn normalize(&self, kind: ValueKind) -> ConcreteValue {
        match kind {
            ValueKind::Int => ConcreteValue::from(self.as_i32()),
            ValueKind::Long => ConcreteValue::from(self.as_i64()),
            ValueKind::Float => ConcreteValue::from(self.as_f32()),
            ValueKind::Double => ConcreteValue::from(self.as_f64()),
            ValueKind::Reference => self.clone(),
        }
    }
}

/// Transfer functions. Each one computes what the JVM computes for the corresponding
/// instruction of the given kind.
impl ConcreteValue {
    /// Returns "self + other".
    pub fn add(&self, other: &Self, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => self.as_i32().wrapping_add(other.as_i32()).into(),
            ValueKind::Long => self.as_i64().wrapping_add(other.as_i64()).into(),
            ValueKind::Float => (self.as_f32() + other.as_f32()).into(),
            _ => (self.as_f64() + other.as_f64()).into(),
        }
    }

    /// Returns "self - other".
    pub fn sub(&self, other: &Self, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => self.as_i32().wrapping_sub(other.as_i32()).into(),
            ValueKind::Long => self.as_i64().wrapping_sub(other.as_i64()).into(),
            ValueKind::Float => (self.as_f32() - other.as_f32()).into(),
            _ => (self.as_f64() - other.as_f64()).into(),
        }
    }

    /// Returns "self * other".
    pub fn mul(&self, other: &Self, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => self.as_i32().wrapping_mul(other.as_i32()).into(),
            ValueKind::Long => self.as_i64().wrapping_mul(other.as_i64()).into(),
            ValueKind::Float => (self.as_f32() * other.as_f32()).into(),
            _ => (self.as_f64() * other.as_f64()).into(),
        }
    }

    /// Returns "self / other", or None if integer division by zero would fault.
    /// MIN_VALUE / -1 wraps around, just like idiv and ldiv.
    pub fn div(&self, other: &Self, kind: ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Int => {
                let divisor = other.as_i32();
                if divisor == 0 {
                    None
                } else {
                    Some(self.as_i32().wrapping_div(divisor).into())
                }
            }
            ValueKind::Long => {
                let divisor = other.as_i64();
                if divisor == 0 {
                    None
                } else {
                    Some(self.as_i64().wrapping_div(divisor).into())
                }
            }
            ValueKind::Float => Some((self.as_f32() / other.as_f32()).into()),
            _ => Some((self.as_f64() / other.as_f64()).into()),
        }
    }

    /// Returns "self % other", or None if integer division by zero would fault.
    /// The sign of a real remainder follows the dividend, as with frem and drem.
    pub fn rem(&self, other: &Self, kind: ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Int => {
                let divisor = other.as_i32();
                if divisor == 0 {
                    None
                } else {
                    Some(self.as_i32().wrapping_rem(divisor).into())
                }
            }
            ValueKind::Long => {
                let divisor = other.as_i64();
                if divisor == 0 {
                    None
                } else {
                    Some(self.as_i64().wrapping_rem(divisor).into())
                }
            }
            ValueKind::Float => Some((self.as_f32() % other.as_f32()).into()),
            _ => Some((self.as_f64() % other.as_f64()).into()),
        }
    }

    /// Returns "-self".
    pub fn neg(&self, kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => self.as_i32().wrapping_neg().into(),
            ValueKind::Long => self.as_i64().wrapping_neg().into(),
            ValueKind::Float => (-self.as_f32()).into(),
            _ => (-self.as_f64()).into(),
        }
    }

    /// Returns "self << other". Only the low 5 (int) or 6 (long) bits of the distance count.
    pub fn shl(&self, other: &Self, kind: ValueKind) -> Self {
        if kind == ValueKind::Long {
            self.as_i64().wrapping_shl(other.as_i32() as u32 & 0x3f).into()
        } else {
            self.as_i32().wrapping_shl(other.as_i32() as u32 & 0x1f).into()
        }
    }

    /// Returns "self >> other", with sign extension.
    pub fn shr(&self, other: &Self, kind: ValueKind) -> Self {
        if kind == ValueKind::Long {
            self.as_i64().wrapping_shr(other.as_i32() as u32 & 0x3f).into()
        } else {
            self.as_i32().wrapping_shr(other.as_i32() as u32 & 0x1f).into()
        }
    }

    /// Returns "self >>> other", shifting in zeros.
    pub fn ushr(&self, other: &Self, kind: ValueKind) -> Self {
        if kind == ValueKind::Long {
            ((self.as_i64() as u64).wrapping_shr(other.as_i32() as u32 & 0x3f) as i64).into()
        } else {
            ((self.as_i32() as u32).wrapping_shr(other.as_i32() as u32 & 0x1f) as i32).into()
        }
    }

    /// Returns "self & other".
    pub fn bit_and(&self, other: &Self, kind: ValueKind) -> Self {
        ConcreteValue::Integer(self.as_i64() & other.as_i64()).normalize(kind)
    }

    /// Returns "self | other".
    pub fn bit_or(&self, other: &Self, kind: ValueKind) -> Self {
        ConcreteValue::Integer(self.as_i64() | other.as_i64()).normalize(kind)
    }

    /// Returns "self ^ other".
    pub fn bit_xor(&self, other: &Self, kind: ValueKind) -> Self {
        ConcreteValue::Integer(self.as_i64() ^ other.as_i64()).normalize(kind)
    }

    /// Returns -1, 0 or 1. For reals, returns nan_result if either operand is NaN.
    pub fn compare(&self, other: &Self, kind: ValueKind, nan_result: i32) -> Self {
        let result = if kind.is_real() {
            let (left, right) = (self.as_f64(), other.as_f64());
            if left.is_nan() || right.is_nan() {
                nan_result
            } else if left < right {
                -1
            } else if left > right {
                1
            } else {
                0
            }
        } else {
            match self.as_i64().cmp(&other.as_i64()) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            }
        };
        result.into()
    }

    /// Converts self from one kind to another, following the JVM conversion instructions.
    /// Real to integer conversions saturate and map NaN to zero.
    pub fn convert(&self, from: ValueKind, to: ValueKind) -> Self {
        match (from.is_real(), to) {
            (true, ValueKind::Int) => (self.as_f64() as i32).into(),
            (true, ValueKind::Long) => (self.as_f64() as i64).into(),
            (false, ValueKind::Float) => {
                if from == ValueKind::Long {
                    (self.as_i64() as f32).into()
                } else {
                    (self.as_i32() as f32).into()
                }
            }
            (false, ValueKind::Double) => (self.as_i64() as f64).into(),
            _ => self.normalize(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_wraps_around() {
        let max = ConcreteValue::from(i32::MAX);
        let one = ConcreteValue::from(1);
        assert_eq!(max.add(&one, ValueKind::Int), ConcreteValue::from(i32::MIN));
        let min = ConcreteValue::from(i32::MIN);
        let minus_one = ConcreteValue::from(-1);
        assert_eq!(min.div(&minus_one, ValueKind::Int), Some(min.clone()));
        assert_eq!(min.rem(&minus_one, ValueKind::Int), Some(ConcreteValue::from(0)));
    }

    #[test]
    fn division_by_zero_faults_only_for_integers() {
        let zero = ConcreteValue::from(0);
        assert_eq!(ConcreteValue::from(7).div(&zero, ValueKind::Int), None);
        assert_eq!(ConcreteValue::from(7i64).rem(&zero, ValueKind::Long), None);
        let inf = ConcreteValue::from(1.0f64).div(&ConcreteValue::from(0.0f64), ValueKind::Double);
        assert_eq!(inf, Some(ConcreteValue::from(f64::INFINITY)));
    }

    #[test]
    fn shift_distances_are_masked() {
        let one = ConcreteValue::from(1);
        assert_eq!(one.shl(&ConcreteValue::from(33), ValueKind::Int), ConcreteValue::from(2));
        let one_long = ConcreteValue::from(1i64);
        assert_eq!(
            one_long.shl(&ConcreteValue::from(33), ValueKind::Long),
            ConcreteValue::from(1i64 << 33)
        );
        let minus_eight = ConcreteValue::from(-8);
        assert_eq!(minus_eight.shr(&ConcreteValue::from(1), ValueKind::Int), ConcreteValue::from(-4));
        assert_eq!(
            minus_eight.ushr(&ConcreteValue::from(28), ValueKind::Int),
            ConcreteValue::from(15)
        );
    }

    #[test]
    fn real_to_integer_saturates() {
        let big = ConcreteValue::from(1e20f64);
        assert_eq!(big.convert(ValueKind::Double, ValueKind::Int), ConcreteValue::from(i32::MAX));
        let nan = ConcreteValue::from(f64::NAN);
        assert_eq!(nan.convert(ValueKind::Double, ValueKind::Long), ConcreteValue::from(0i64));
    }

    #[test]
    fn nan_never_matches() {
        let nan = ConcreteValue::from(f64::NAN);
        assert!(!nan.matches(&nan.clone()));
        assert!(ConcreteValue::from(3).matches(&ConcreteValue::from(3)));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field values, numeric narrowing and sample indices.
//!
//! # Narrowing policy
//!
//! The native layer exposes every numeric field as an `f64`. Typed getters
//! narrow that value with plain casts instead of range-checking it:
//!
//! 1. float to integer: truncate toward zero into `i64` (saturating, NaN
//!    becomes 0), then wrap to the target width with an integer `as` cast;
//! 2. float to float: `as`;
//! 3. `char`: the resulting `u32` scalar, U+FFFD when it is not valid.
//!
//! So `i32::MAX` read as `i8` is `-1` and read as `u8` is `255`. Integers
//! above 2^53 lose precision before narrowing.

use serde_json::Value;

use crate::error::{Error, Result};

/// Tagged value for by-name field access.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Boolean(bool),
    String(String),
    /// Compound member (struct, array, sequence) as JSON.
    Json(Value),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Number(v as f64)
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<char> for FieldValue {
    fn from(v: char) -> Self {
        FieldValue::Number(f64::from(u32::from(v)))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

/// Narrowing from the native `f64` representation.
pub trait Narrow: Sized {
    fn narrow(v: f64) -> Self;
}

macro_rules! narrow_via_i64 {
    ($($t:ty),*) => {
        $(
            impl Narrow for $t {
                #[inline]
                fn narrow(v: f64) -> Self {
                    (v as i64) as $t
                }
            }
        )*
    };
}

narrow_via_i64!(i8, i16, i32, i64, isize, u8, u16, u32, usize);

impl Narrow for u64 {
    #[inline]
    fn narrow(v: f64) -> Self {
        if v >= 0.0 {
            v as u64
        } else {
            (v as i64) as u64
        }
    }
}

impl Narrow for f32 {
    #[inline]
    fn narrow(v: f64) -> Self {
        v as f32
    }
}

impl Narrow for f64 {
    #[inline]
    fn narrow(v: f64) -> Self {
        v
    }
}

impl Narrow for char {
    fn narrow(v: f64) -> Self {
        char::from_u32(u32::narrow(v)).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

/// Index argument of sample and info accessors.
///
/// Accepts any integer type so that negative values can be rejected with
/// [`Error::InvalidArgument`] before anything reaches the native layer.
pub trait SampleIndex: Copy + std::fmt::Display {
    /// The index as `usize`, or `InvalidArgument` when negative.
    fn to_index(self) -> Result<usize>;
}

macro_rules! signed_index {
    ($($t:ty),*) => {
        $(
            impl SampleIndex for $t {
                fn to_index(self) -> Result<usize> {
                    if self < 0 {
                        return Err(Error::InvalidArgument(format!(
                            "index cannot be negative: {}",
                            self
                        )));
                    }
                    usize::try_from(self)
                        .map_err(|_| Error::InvalidArgument(format!("index too large: {}", self)))
                }
            }
        )*
    };
}

macro_rules! unsigned_index {
    ($($t:ty),*) => {
        $(
            impl SampleIndex for $t {
                fn to_index(self) -> Result<usize> {
                    usize::try_from(self)
                        .map_err(|_| Error::InvalidArgument(format!("index too large: {}", self)))
                }
            }
        )*
    };
}

signed_index!(i8, i16, i32, i64, isize);
unsigned_index!(u8, u16, u32, u64, usize);

/// 1-based native index for `index`, checked against `len`.
pub(crate) fn native_index(index: usize, len: usize) -> Result<i32> {
    if index >= len {
        return Err(Error::InvalidArgument(format!(
            "index {} out of range (length {})",
            index, len
        )));
    }
    i32::try_from(index + 1).map_err(|_| {
        Error::InvalidArgument(format!("index {} exceeds the native index range", index))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_wraps_like_integer_casts() {
        let max = f64::from(i32::MAX);
        assert_eq!(i32::narrow(max), i32::MAX);
        assert_eq!(i8::narrow(max), -1);
        assert_eq!(u8::narrow(max), 255);
        assert_eq!(i16::narrow(max), -1);
        assert_eq!(u16::narrow(max), u16::MAX);
        assert_eq!(u32::narrow(-1.0), u32::MAX);
        assert_eq!(u64::narrow(-1.0), u64::MAX);
        assert_eq!(u64::narrow(1e19), 10_000_000_000_000_000_000);
    }

    #[test]
    fn narrowing_truncates_toward_zero() {
        assert_eq!(i32::narrow(2.9), 2);
        assert_eq!(i32::narrow(-2.9), -2);
        assert_eq!(i64::narrow(f64::NAN), 0);
        assert_eq!(i64::narrow(f64::INFINITY), i64::MAX);
    }

    #[test]
    fn char_narrowing() {
        assert_eq!(char::narrow(65.0), 'A');
        assert_eq!(char::narrow(f64::from(0xD800)), char::REPLACEMENT_CHARACTER);
    }

    #[test]
    fn negative_index_is_rejected() {
        assert!(matches!((-1i32).to_index(), Err(Error::InvalidArgument(_))));
        assert!(matches!((-1i64).to_index(), Err(Error::InvalidArgument(_))));
        assert_eq!(3u32.to_index().expect("index"), 3);
        assert_eq!(0usize.to_index().expect("index"), 0);
    }

    #[test]
    fn native_index_is_one_based_and_bounded() {
        assert_eq!(native_index(0, 1).expect("index"), 1);
        assert!(matches!(native_index(1, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(native_index(0, 0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn field_value_conversions() {
        assert_eq!(FieldValue::from(5u8), FieldValue::Number(5.0));
        assert_eq!(FieldValue::from('A').as_f64(), Some(65.0));
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert!(FieldValue::from(serde_json::json!([1, 2])).as_json().is_some());
    }
}

//! Validated value types for caller supplied numbers.
//!
//! Request bodies carry plain integers; services convert them here before any
//! store is touched so that the stores only ever see checked values.

use std::fmt;

use crate::error::AppError;

/// A cart or order quantity. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i32) -> Result<Self, AppError> {
        if value <= 0 {
            return Err(AppError::InvalidArgument(
                "quantity must be greater than 0".into(),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unit price in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    pub fn new(value: i64) -> Result<Self, AppError> {
        if value < 0 {
            return Err(AppError::InvalidArgument(
                "price must not be negative".into(),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Line total for `quantity` units, failing instead of wrapping.
    pub fn times(self, quantity: Quantity) -> Result<i64, AppError> {
        self.0
            .checked_mul(i64::from(quantity.get()))
            .ok_or_else(|| AppError::InvalidArgument("line total is out of range".into()))
    }
}

/// A review score between [`Rating::MIN`] and [`Rating::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(i16);

impl Rating {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    pub fn new(value: i16) -> Result<Self, AppError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(AppError::InvalidArgument(format!(
                "rating must be between {} and {}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i16 {
        self.0
    }
}

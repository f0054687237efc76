//! Secret booleans and branchless selection.
//!
//! [`SecretBool`] wraps a [`subtle::Choice`], so a predicate computed from
//! secret data cannot end up in an `if` without an explicit
//! [`SecretBool::reveal`].

use core::ops::{BitAnd, BitOr, Not};

use subtle::{Choice, ConditionallySelectable};

use crate::heap::Heap;
use crate::numbers::{Limbs, Number};
use crate::{Array, Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct SecretBool(pub(crate) Choice);

impl SecretBool {
    /// Declassify.
    pub fn reveal(self) -> bool {
        bool::from(self.0)
    }

    pub fn choice(self) -> Choice {
        self.0
    }
}

impl From<bool> for SecretBool {
    fn from(value: bool) -> Self {
        SecretBool(Choice::from(value as u8))
    }
}

impl From<Choice> for SecretBool {
    fn from(choice: Choice) -> Self {
        SecretBool(choice)
    }
}

impl BitAnd for SecretBool {
    type Output = Self;

    fn bitand(self, other: Self) -> Self {
        SecretBool(self.0 & other.0)
    }
}

impl BitOr for SecretBool {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        SecretBool(self.0 | other.0)
    }
}

impl Not for SecretBool {
    type Output = Self;

    fn not(self) -> Self {
        SecretBool(!self.0)
    }
}

/// `a` if `predicate` holds, else `b`.
pub fn select_u32(predicate: SecretBool, a: u32, b: u32) -> u32 {
    u32::conditional_select(&b, &a, predicate.0)
}

/// `a` if `predicate` holds, else `b`.
pub fn select_u64(predicate: SecretBool, a: u64, b: u64) -> u64 {
    u64::conditional_select(&b, &a, predicate.0)
}

impl Heap {
    /// Overwrite `dest` with `source` if `predicate` holds.
    ///
    /// Both bigints are read and `dest` is written whatever the predicate,
    /// so they must have the same width and signedness. The result is
    /// secret if either of them was.
    pub fn bigint_cond_copy(&mut self, predicate: SecretBool, dest: &mut Array, source: &Array) -> Result<()> {
        let mut target = self.load(dest)?;
        let source = self.load(source)?;
        if target.width != source.width || target.signed != source.signed {
            return Err(Error::Mismatch("conditional copy between different bigint types"));
        }
        Limbs::new_mut(&mut target.digits).conditional_assign(&source.digits, predicate.0);
        let result = Number { secret: target.secret || source.secret, ..target };
        self.store(dest, &result)
    }
}

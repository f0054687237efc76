use crate::digit::{DoubleDigit, DIGIT_BITS};
use crate::heap::Heap;
use crate::numbers::Number;
use crate::{Array, Digit, Result};

/// Add with carry.
#[inline]
pub fn adc(a: Digit, b: Digit, acc: &mut DoubleDigit) -> Digit {
    *acc += a as DoubleDigit;
    *acc += b as DoubleDigit;
    let lo = *acc as Digit;
    *acc >>= DIGIT_BITS;
    lo
}

/// `a += b`, returning the carry out of `a`.
///
/// The carry runs through all of `a`, even once it is zero.
pub(crate) fn add_assign_carry(a: &mut [Digit], b: &[Digit]) -> Digit {
    debug_assert!(a.len() >= b.len());

    let mut carry = 0;
    let (a_lo, a_hi) = a.split_at_mut(b.len());

    for (a, b) in a_lo.iter_mut().zip(b) {
        *a = adc(*a, *b, &mut carry);
    }
    for a in a_hi {
        *a = adc(*a, 0, &mut carry);
    }

    carry as Digit
}

impl Heap {
    fn add(&mut self, dest: &mut Array, a: &Array, b: &Array, truncate: bool) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        // one spare limb holds any carry or sign change
        let len = a.limbs() + 1;
        let mut sum = a.extended(len);
        add_assign_carry(&mut sum, &b.extended(len));
        let result = Number::from_extended(&sum, a.width, a.signed, a.secret || b.secret, truncate)?;
        self.store(dest, &result)
    }

    /// `dest = a + b`; a sum outside the operands' type is an overflow.
    pub fn bigint_add(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.add(dest, a, b, false)
    }

    /// `dest = a + b`, wrapping at the operands' width.
    pub fn bigint_add_trunc(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.add(dest, a, b, true)
    }
}

use crate::digit::{SignedDoubleDigit, DIGIT_BITS};
use crate::heap::Heap;
use crate::numbers::{top_mask, Limbs, Number};
use crate::{Array, Digit, Result};

/// Subtract with borrow.
#[inline]
pub fn sbb(a: Digit, b: Digit, acc: &mut SignedDoubleDigit) -> Digit {
    *acc += a as SignedDoubleDigit;
    *acc -= b as SignedDoubleDigit;
    let lo = *acc as Digit;
    *acc >>= DIGIT_BITS;
    lo
}

/// `a -= b`, returning the borrow out of `a`.
///
/// A borrow is -1, which as a digit is "all bits set". It runs through
/// all of `a`, even once it is zero.
pub(crate) fn sub_assign_borrow(a: &mut [Digit], b: &[Digit]) -> Digit {
    debug_assert!(a.len() >= b.len());
    let mut borrow = 0;

    let (a_lo, a_hi) = a.split_at_mut(b.len());

    for (a, b) in a_lo.iter_mut().zip(b) {
        *a = sbb(*a, *b, &mut borrow);
    }
    for a in a_hi {
        *a = sbb(*a, 0, &mut borrow);
    }

    borrow as Digit
}

impl Heap {
    fn sub(&mut self, dest: &mut Array, a: &Array, b: &Array, truncate: bool) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        let len = a.limbs() + 1;
        let mut difference = a.extended(len);
        sub_assign_borrow(&mut difference, &b.extended(len));
        let result = Number::from_extended(&difference, a.width, a.signed, a.secret || b.secret, truncate)?;
        self.store(dest, &result)
    }

    pub fn bigint_sub(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.sub(dest, a, b, false)
    }

    pub fn bigint_sub_trunc(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.sub(dest, a, b, true)
    }

    fn negate(&mut self, dest: &mut Array, source: &Array, truncate: bool) -> Result<()> {
        let x = self.load(source)?;
        let mut negated = x.extended(x.limbs() + 1);
        Limbs::new_mut(&mut negated).conditional_negate(1.into());
        let result = Number::from_extended(&negated, x.width, x.signed, x.secret, truncate)?;
        self.store(dest, &result)
    }

    /// `dest = -source`. Only zero negates within an unsigned type, and the
    /// most negative value has no counterpart in a signed one.
    pub fn bigint_negate(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.negate(dest, source, false)
    }

    pub fn bigint_negate_trunc(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.negate(dest, source, true)
    }

    /// Bitwise complement within the width. Never overflows.
    pub fn bigint_complement(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        let mut x = self.load(source)?;
        for limb in x.digits.iter_mut() {
            *limb = !*limb;
        }
        let top = x.limbs() - 1;
        x.digits[top] &= top_mask(x.width);
        self.store(dest, &x)
    }

    pub fn bigint_complement_trunc(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.bigint_complement(dest, source)
    }
}

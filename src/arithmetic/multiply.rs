use subtle::Choice;
use zeroize::Zeroizing;

use crate::digit::{DoubleDigit, DIGIT_BITS};
use crate::heap::Heap;
use crate::numbers::{fits, Limbs, Number};
use crate::{Array, Digit, Error, Result};

/// `a + b * c + carry`, low digit returned, high digit left in `carry`.
#[inline]
pub fn mac(a: Digit, b: Digit, c: Digit, carry: &mut DoubleDigit) -> Digit {
    *carry += a as DoubleDigit + (b as DoubleDigit) * (c as DoubleDigit);
    let lo = *carry as Digit;
    *carry >>= DIGIT_BITS;
    lo
}

/// `acc += b * c`, wrapping at the length of `acc`.
pub(crate) fn mac_digit(acc: &mut [Digit], b: &[Digit], c: Digit) {
    let mut carry = 0;
    let (acc_lo, acc_hi) = acc.split_at_mut(b.len().min(acc.len()));

    for (a, b) in acc_lo.iter_mut().zip(b) {
        *a = mac(*a, *b, c, &mut carry);
    }
    for a in acc_hi {
        *a = mac(*a, 0, 0, &mut carry);
    }
}

/// Operand-scanning product of `a` and `b`, wrapping at the length of `product`.
///
/// The loops only depend on the lengths.
pub(crate) fn mul_into(product: &mut [Digit], a: &[Digit], b: &[Digit]) {
    product.iter_mut().for_each(|limb| *limb = 0);
    for (i, a) in a.iter().enumerate().take(product.len()) {
        mac_digit(&mut product[i..], b, *a);
    }
}

/// Exact product of two numbers of the same type, plus whether it fits that type.
fn checked_product(a: &Number, b: &Number) -> (Zeroizing<alloc::vec::Vec<Digit>>, Choice) {
    // two's complement of the sign-extended operands is exact at twice the width
    let len = 2 * a.limbs() + 1;
    let mut product = Zeroizing::new(alloc::vec![0; len]);
    mul_into(&mut product, &a.extended(len), &b.extended(len));
    let fit = fits(&product, a.width, a.signed);
    (product, fit)
}

impl Heap {
    fn mul(&mut self, dest: &mut Array, a: &Array, b: &Array, truncate: bool) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        let (product, _) = checked_product(&a, &b);
        let result = Number::from_extended(&product, a.width, a.signed, a.secret || b.secret, truncate)?;
        self.store(dest, &result)
    }

    pub fn bigint_mul(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.mul(dest, a, b, false)
    }

    pub fn bigint_mul_trunc(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.mul(dest, a, b, true)
    }

    /// `dest = base^exponent` in the type of `base`, checked.
    ///
    /// The power of `|base|` is computed unsigned and the sign applied at
    /// the end, so only the final value has to fit. Partial powers never
    /// exceed the final magnitude, so one that overflows the width already
    /// decides the outcome; it is remembered rather than branched on, and
    /// the sequence of operations only depends on `exponent`.
    pub fn bigint_exp(&mut self, dest: &mut Array, base: &Array, exponent: u32) -> Result<()> {
        let base = self.load(base)?;
        let len = base.limbs() + 1;
        if exponent == 0 {
            let mut one = alloc::vec![0; len];
            one[0] = 1;
            let result = Number::from_extended(&one, base.width, base.signed, base.secret, false)?;
            return self.store(dest, &result);
        }

        let negative = base.is_negative();
        let mut magnitude = base.extended(len);
        Limbs::new_mut(&mut magnitude).conditional_negate(negative);
        // |MIN| still fits the width once read as unsigned
        let magnitude = Number::from_extended(&magnitude, base.width, false, base.secret, true)?;

        let mut power = magnitude.clone();
        let mut fit = Choice::from(1);
        for bit in (0..31 - exponent.leading_zeros()).rev() {
            let (square, square_fits) = checked_product(&power, &power);
            power = Number::from_extended(&square, base.width, false, base.secret, true)?;
            fit &= square_fits;
            if (exponent >> bit) & 1 == 1 {
                let (product, product_fits) = checked_product(&power, &magnitude);
                power = Number::from_extended(&product, base.width, false, base.secret, true)?;
                fit &= product_fits;
            }
        }

        let mut value = power.extended(len);
        Limbs::new_mut(&mut value).conditional_negate(negative & Choice::from((exponent & 1) as u8));
        fit &= fits(&value, base.width, base.signed);
        if !bool::from(fit) {
            trace!("power does not fit {} bits", base.width);
            return Err(Error::Overflow);
        }
        let result = Number::from_extended(&value, base.width, base.signed, base.secret, false)?;
        self.store(dest, &result)
    }
}

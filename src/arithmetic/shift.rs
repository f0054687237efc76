//! Shifts and rotations.
//!
//! Distances are public. A shift by at least the width moves every bit
//! out: left shifts and unsigned right shifts give zero, signed right
//! shifts give the sign fill. Rotations take the distance modulo the width.

use crate::digit::DIGIT_BITS;
use crate::heap::Heap;
use crate::numbers::Number;
use crate::{Array, Digit, Result};

/// `x <<= bits`, truncating at the length of `x`.
///
/// Note that "left" means "higher number".
pub(crate) fn shl_assign(x: &mut [Digit], bits: usize) {
    let len = x.len();
    let n_digits = (bits / DIGIT_BITS).min(len);

    // shift back by n_digits
    x.copy_within(..len - n_digits, n_digits);
    x[..n_digits].fill(0);

    // shift back sub-digit amount of bits
    let n_bits = bits % DIGIT_BITS;
    if n_bits > 0 {
        let mut carry = 0;
        for elem in x[n_digits..].iter_mut() {
            let new_carry = *elem >> (DIGIT_BITS - n_bits);
            *elem = (*elem << n_bits) | carry;
            carry = new_carry;
        }
    }
}

/// `x >>= bits`, shifting in copies of `fill` (zero or all ones) at the top.
///
/// Note that "right" means "lower number".
pub(crate) fn shr_assign(x: &mut [Digit], bits: usize, fill: Digit) {
    let len = x.len();
    let n_digits = (bits / DIGIT_BITS).min(len);

    x.copy_within(n_digits.., 0);
    x[len - n_digits..].fill(fill);

    let n_bits = bits % DIGIT_BITS;
    if n_bits > 0 {
        let mut borrow = fill << (DIGIT_BITS - n_bits);
        for elem in x[..len - n_digits].iter_mut().rev() {
            let new_borrow = *elem << (DIGIT_BITS - n_bits);
            *elem = (*elem >> n_bits) | borrow;
            borrow = new_borrow;
        }
    }
}

impl Heap {
    pub fn bigint_shl(&mut self, dest: &mut Array, source: &Array, distance: usize) -> Result<()> {
        let x = self.load(source)?;
        let mut shifted = x.digits.clone();
        shl_assign(&mut shifted, distance);
        let result = Number::from_extended(&shifted, x.width, x.signed, x.secret, true)?;
        self.store(dest, &result)
    }

    /// Logical right shift for unsigned bigints, arithmetic for signed ones.
    pub fn bigint_shr(&mut self, dest: &mut Array, source: &Array, distance: usize) -> Result<()> {
        let x = self.load(source)?;
        let mut shifted = x.extended(x.limbs());
        let fill = (0 as Digit).wrapping_sub(x.is_negative().unwrap_u8() as Digit);
        shr_assign(&mut shifted, distance, fill);
        let result = Number::from_extended(&shifted, x.width, x.signed, x.secret, true)?;
        self.store(dest, &result)
    }

    pub fn bigint_rotl(&mut self, dest: &mut Array, source: &Array, distance: usize) -> Result<()> {
        let x = self.load(source)?;
        let distance = distance % x.width;
        let result = rotate(&x, distance)?;
        self.store(dest, &result)
    }

    pub fn bigint_rotr(&mut self, dest: &mut Array, source: &Array, distance: usize) -> Result<()> {
        let x = self.load(source)?;
        let distance = (x.width - distance % x.width) % x.width;
        let result = rotate(&x, distance)?;
        self.store(dest, &result)
    }
}

/// Left rotation of the `width` bit pattern by `distance < width`.
fn rotate(x: &Number, distance: usize) -> Result<Number> {
    let mut high = x.digits.clone();
    shl_assign(&mut high, distance);
    let mut low = x.digits.clone();
    shr_assign(&mut low, x.width - distance, 0);
    for (high, low) in high.iter_mut().zip(low.iter()) {
        *high |= low;
    }
    Number::from_extended(&high, x.width, x.signed, x.secret, true)
}

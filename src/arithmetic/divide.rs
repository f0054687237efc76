use alloc::vec::Vec;

use subtle::Choice;
use zeroize::Zeroizing;

use super::add::add_assign_carry;
use super::multiply::mac_digit;
use super::shift::{shl_assign, shr_assign};
use super::subtract::sub_assign_borrow;
use crate::digit::{DoubleDigit, DIGIT_BITS};
use crate::heap::Heap;
use crate::numbers::{Limbs, Number};
use crate::{Array, Digit, Error, Result};

pub(crate) type Scratch = Zeroizing<Vec<Digit>>;

pub(crate) fn scratch(len: usize) -> Scratch {
    Zeroizing::new(alloc::vec![0; len])
}

/// Divide a two digit numerator by a one digit divisor, returns quotient and remainder.
///
/// The caller must ensure that both the quotient and remainder fit into a
/// single digit, i.e. `hi < divisor`.
///
/// This is Knuth's operation c0), "memorizing the multiplication table in reverse."
#[inline]
pub fn div_digits(hi: Digit, lo: Digit, divisor: Digit) -> (Digit, Digit) {
    debug_assert!(hi < divisor);

    let x = ((hi as DoubleDigit) << DIGIT_BITS) + lo as DoubleDigit;
    let divisor = divisor as DoubleDigit;

    let q = x / divisor;
    let r = x % divisor;

    (q as Digit, r as Digit)
}

/// Divides `number` in place by `divisor`, returning the remainder.
///
/// Uses the hardware divider, so only for public values.
pub(crate) fn div_rem_assign_digit(number: &mut [Digit], divisor: Digit) -> Digit {
    let mut remainder = 0;

    // run down the digits, dividing each while carrying along the remainder
    for digit in number.iter_mut().rev() {
        let (quotient, r) = div_digits(remainder, *digit, divisor);
        *digit = quotient;
        remainder = r;
    }

    remainder
}

/// Number of limbs below the leading zero limbs.
fn significant(x: &[Digit]) -> usize {
    x.iter().rposition(|limb| *limb != 0).map_or(0, |top| top + 1)
}

/// Knuth, TAOCP vol 2 section 4.3, algorithm D(ivision).
///
/// Returns `x.len()` quotient limbs and `n.len()` remainder limbs. Branches
/// on the values, public operands only.
fn knuth_div_rem(x: &[Digit], n: &[Digit]) -> (Scratch, Scratch) {
    let n_len = significant(n);
    let x_len = significant(x);
    debug_assert!(n_len > 0);

    let mut q = scratch(x.len());
    let mut r = scratch(n.len());

    if x_len < n_len {
        r[..x_len].copy_from_slice(&x[..x_len]);
        return (q, r);
    }
    if n_len == 1 {
        q.copy_from_slice(x);
        r[0] = div_rem_assign_digit(&mut q, n[0]);
        return (q, r);
    }

    // normalize so the divisor's top bit is set; this has no influence on
    // the quotient and is reverted for the remainder at the end
    let shift = n[n_len - 1].leading_zeros() as usize;
    let mut v = Zeroizing::new(n[..n_len].to_vec());
    shl_assign(&mut v, shift);
    let mut u = scratch(x_len + 1);
    u[..x_len].copy_from_slice(&x[..x_len]);
    shl_assign(&mut u, shift);

    let top = v[n_len - 1] as DoubleDigit;
    let next = v[n_len - 2] as DoubleDigit;
    let mut product = scratch(n_len + 1);

    for j in (0..=x_len - n_len).rev() {
        let numerator = (u[j + n_len] as DoubleDigit) << DIGIT_BITS | u[j + n_len - 1] as DoubleDigit;
        let mut qhat = numerator / top;
        let mut rhat = numerator % top;
        while qhat >> DIGIT_BITS != 0 || qhat * next > (rhat << DIGIT_BITS | u[j + n_len - 2] as DoubleDigit) {
            qhat -= 1;
            rhat += top;
            if rhat >> DIGIT_BITS != 0 {
                break;
            }
        }

        product.iter_mut().for_each(|limb| *limb = 0);
        mac_digit(&mut product, &v, qhat as Digit);
        if sub_assign_borrow(&mut u[j..=j + n_len], &product) != 0 {
            // the guess was one too large
            qhat -= 1;
            add_assign_carry(&mut u[j..=j + n_len], &v);
        }
        q[j] = qhat as Digit;
    }

    r[..n_len].copy_from_slice(&u[..n_len]);
    shr_assign(&mut r[..n_len], shift, 0);
    (q, r)
}

/// Restoring binary long division.
///
/// One shift and one trial subtraction per bit of `x`, kept or discarded
/// with a mask: the work only depends on the lengths.
fn ct_div_rem(x: &[Digit], n: &[Digit]) -> (Scratch, Scratch) {
    let len = n.len() + 1;
    let mut divisor = scratch(len);
    divisor[..n.len()].copy_from_slice(n);
    let mut r = scratch(len);
    let mut trial = scratch(len);
    let mut q = scratch(x.len());

    for i in (0..x.len() * DIGIT_BITS).rev() {
        shl_assign(&mut r, 1);
        r[0] |= (x[i / DIGIT_BITS] >> (i % DIGIT_BITS)) & 1;
        trial.copy_from_slice(&r);
        let borrow = sub_assign_borrow(&mut trial, &divisor);
        let keep = Choice::from((!borrow & 1) as u8);
        Limbs::new_mut(&mut r).conditional_assign(&trial, keep);
        q[i / DIGIT_BITS] |= (keep.unwrap_u8() as Digit) << (i % DIGIT_BITS);
    }

    let mut remainder = scratch(n.len());
    remainder.copy_from_slice(&r[..n.len()]);
    (q, remainder)
}

/// Unsigned `x = q * n + r` with `r < n`; `x.len()` quotient limbs, `n.len()` remainder limbs.
pub(crate) fn div_rem(x: &[Digit], n: &[Digit], secret: bool) -> Result<(Scratch, Scratch)> {
    if bool::from(Limbs::new(n).is_zero()) {
        return Err(Error::DivideByZero);
    }
    Ok(if secret { ct_div_rem(x, n) } else { knuth_div_rem(x, n) })
}

/// `x mod n` with `n.len()` limbs.
pub(crate) fn reduce(x: &[Digit], n: &[Digit], secret: bool) -> Result<Scratch> {
    Ok(div_rem(x, n, secret)?.1)
}

/// Truncating division of two numbers of the same type.
///
/// The quotient rounds toward zero and the remainder takes the sign of
/// the dividend. Both come back as `limbs + 1` limb two's complement values.
fn divide(a: &Number, b: &Number) -> Result<(Scratch, Scratch)> {
    let len = a.limbs() + 1;
    let (a_negative, b_negative) = (a.is_negative(), b.is_negative());
    let mut x = a.extended(len);
    Limbs::new_mut(&mut x).conditional_negate(a_negative);
    let mut n = b.extended(len);
    Limbs::new_mut(&mut n).conditional_negate(b_negative);

    let (mut q, mut r) = div_rem(&x, &n, a.secret || b.secret)?;
    Limbs::new_mut(&mut q).conditional_negate(a_negative ^ b_negative);
    Limbs::new_mut(&mut r).conditional_negate(a_negative);
    Ok((q, r))
}

impl Heap {
    fn div(&mut self, dest: &mut Array, a: &Array, b: &Array, truncate: bool) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        let (q, _) = divide(&a, &b)?;
        let quotient = Number::from_extended(&q, a.width, a.signed, a.secret || b.secret, truncate)?;
        self.store(dest, &quotient)
    }

    /// `dest = a / b`, rounding toward zero. Only `MIN / -1` overflows.
    pub fn bigint_div(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.div(dest, a, b, false)
    }

    pub fn bigint_div_trunc(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.div(dest, a, b, true)
    }

    /// `dest = a % b`, with the sign of `a`. Never overflows.
    pub fn bigint_mod(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        let (_, r) = divide(&a, &b)?;
        let remainder = Number::from_extended(&r, a.width, a.signed, a.secret || b.secret, true)?;
        self.store(dest, &remainder)
    }

    pub fn bigint_mod_trunc(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.bigint_mod(dest, a, b)
    }

    /// Quotient and remainder of one long division.
    pub fn bigint_div_rem(&mut self, quotient: &mut Array, remainder: &mut Array, a: &Array, b: &Array) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        let secret = a.secret || b.secret;
        let (q, r) = divide(&a, &b)?;
        let q = Number::from_extended(&q, a.width, a.signed, secret, false)?;
        let r = Number::from_extended(&r, a.width, a.signed, secret, true)?;
        self.store(quotient, &q)?;
        self.store(remainder, &r)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arithmetic::multiply::mul_into;
    use crate::fixtures::*;
    use hex_literal::hex;

    pub const N1: Digit = -1i64 as Digit;
    pub const N2: Digit = -2i64 as Digit;
    pub const M: Digit = Digit::MAX;

    pub const DIV_REM_QUADRUPLES: &[(&[Digit], &[Digit], &[Digit], &[Digit])] = &[
        (&[1], &[2], &[], &[1]),
        (&[3], &[2], &[1], &[1]),
        (&[1, 1], &[2], &[M / 2 + 1], &[1]),
        (&[1, 1, 1], &[2], &[M / 2 + 1, M / 2 + 1], &[1]),
        (&[0, 1], &[N1], &[1], &[1]),
        (&[N1, N1], &[N2], &[2, 1], &[3]),
        (&[0, 0, 1], &[1, 1], &[N1], &[1]),
    ];

    fn padded(digits: &[Digit], len: usize) -> Vec<Digit> {
        let mut out = digits.to_vec();
        out.resize(len, 0);
        out
    }

    fn check(x: &[Digit], n: &[Digit], q: &[Digit], r: &[Digit]) {
        let (x, n) = (padded(x, 5), padded(n, 3));
        for secret in [false, true].iter().copied() {
            let (quotient, remainder) = div_rem(&x, &n, secret).unwrap();
            assert_eq!(&quotient[..], &padded(q, 5)[..], "{:?} / {:?}, secret {}", x, n, secret);
            assert_eq!(&remainder[..], &padded(r, 3)[..], "{:?} % {:?}, secret {}", x, n, secret);
        }
    }

    #[test]
    fn long_division() {
        for (x, n, q, r) in DIV_REM_QUADRUPLES.iter() {
            check(x, n, q, r);
        }
    }

    #[test]
    fn division_undoes_multiplication() {
        let factors: &[&[Digit]] = &[&[1], &[3], &[N1], &[1, 2], &[N1, N1], &[0, 0, 1], &[7, 0, N2]];
        for a in factors {
            for b in factors.iter().filter(|b| a.len() + b.len() <= 5) {
                let mut c = [0; 5];
                mul_into(&mut c, a, b);
                check(&c, b, a, &[]);

                // one more than a multiple
                if b.len() > 1 || b[0] > 1 {
                    add_assign_carry(&mut c, &[1]);
                    check(&c, b, a, &[1]);
                }
            }
        }
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(div_rem(&[1], &[0, 0], false).unwrap_err(), Error::DivideByZero);
        assert_eq!(div_rem(&[1], &[0], true).unwrap_err(), Error::DivideByZero);
    }

    #[test]
    fn signed_rounding() {
        let mut heap = Heap::default();
        let (mut q, mut r) = (Array::empty(), Array::empty());
        let cases: &[(i64, i64, i64, i64)] = &[(7, 2, 3, 1), (-7, 2, -3, -1), (7, -2, -3, 1), (-7, -2, 3, -1)];
        for (a, b, expected_q, expected_r) in cases.iter().copied() {
            let (x, y) = (int(&mut heap, a, 16), int(&mut heap, b, 16));
            heap.bigint_div_rem(&mut q, &mut r, &x, &y).unwrap();
            assert_eq!((value(&heap, &q), value(&heap, &r)), (expected_q, expected_r));
            heap.bigint_div(&mut q, &x, &y).unwrap();
            heap.bigint_mod(&mut r, &x, &y).unwrap();
            assert_eq!((value(&heap, &q), value(&heap, &r)), (expected_q, expected_r));
        }
    }

    #[test]
    fn most_negative_over_minus_one() {
        let mut heap = Heap::default();
        let mut q = Array::empty();
        let (min, minus_one) = (int(&mut heap, -128, 8), int(&mut heap, -1, 8));
        assert_eq!(heap.bigint_div(&mut q, &min, &minus_one), Err(Error::Overflow));
        heap.bigint_div_trunc(&mut q, &min, &minus_one).unwrap();
        assert_eq!(value(&heap, &q), -128);
        heap.bigint_mod(&mut q, &min, &minus_one).unwrap();
        assert_eq!(value(&heap, &q), 0);
        heap.bigint_mod_trunc(&mut q, &min, &minus_one).unwrap();
        assert_eq!(value(&heap, &q), 0);

        let zero = int(&mut heap, 0, 8);
        assert_eq!(heap.bigint_div(&mut q, &min, &zero), Err(Error::DivideByZero));
    }

    #[test]
    fn wide_division() {
        let mut heap = Heap::default();
        let (mut q, mut r) = (Array::empty(), Array::empty());
        for secret in [false, true].iter().copied() {
            let (c, x) = (big(&mut heap, &C256, secret), big(&mut heap, &Q256, false));
            heap.bigint_div_rem(&mut q, &mut r, &c, &x).unwrap();
            assert_eq!(value(&heap, &q), 1);
            assert_eq!(
                big_endian(&mut heap, &r),
                hex!("2b402a13b41b5c82ca0760fcc73913d97eb043fe8afef3f39b80382bd4a3c726")
            );
            assert_eq!(heap.bigint_secret(&r).unwrap(), secret);
        }
    }
}

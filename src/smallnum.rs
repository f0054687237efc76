//! Arithmetic on values that fit a machine word.
//!
//! Same semantics as the bigint operations at a fixed width of 64 bits:
//! `signed` reinterprets the bits as `i64`, results that do not fit are
//! [`Error::Overflow`]. With `secret`, divisions run as fixed-iteration
//! restoring division and choices go through `subtle` instead of branches.
//!
//! Moduli are unsigned.

use rand_core::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::arithmetic::inverse::inverse;
use crate::digit::DIGIT_BITS;
use crate::{Digit, Error, Result};

const LIMBS: usize = 64 / DIGIT_BITS;

fn to_limbs(value: u64) -> [Digit; LIMBS] {
    let mut limbs = [0; LIMBS];
    for (index, limb) in limbs.iter_mut().enumerate() {
        *limb = (value >> (index * DIGIT_BITS)) as Digit;
    }
    limbs
}

fn from_limbs(limbs: &[Digit]) -> u64 {
    limbs
        .iter()
        .enumerate()
        .fold(0, |value, (index, limb)| value | (*limb as u64) << (index * DIGIT_BITS))
}

/// All ones if the `i64` reading of `value` is negative.
fn sign_mask(value: u64) -> u64 {
    ((value as i64) >> 63) as u64
}

/// `value` negated where `mask` is all ones.
fn negate_where(value: u64, mask: u64) -> u64 {
    (value ^ mask).wrapping_sub(mask)
}

/// Restoring division, one trial subtraction per bit of `value`.
fn ct_div_rem(value: u128, divisor: u64) -> (u128, u64) {
    let divisor = divisor as u128;
    let mut quotient = 0;
    let mut remainder: u128 = 0;
    for i in (0..128).rev() {
        remainder = (remainder << 1) | ((value >> i) & 1);
        let (trial, borrow) = remainder.overflowing_sub(divisor);
        let keep = Choice::from(!borrow as u8);
        remainder.conditional_assign(&trial, keep);
        quotient |= (keep.unwrap_u8() as u128) << i;
    }
    (quotient, remainder as u64)
}

fn div_rem(value: u128, divisor: u64, secret: bool) -> Result<(u128, u64)> {
    if divisor == 0 {
        return Err(Error::DivideByZero);
    }
    if secret {
        Ok(ct_div_rem(value, divisor))
    } else {
        Ok((value / divisor as u128, (value % divisor as u128) as u64))
    }
}

fn reduce(value: u128, modulus: u64, secret: bool) -> Result<u64> {
    Ok(div_rem(value, modulus, secret)?.1)
}

/// Low 64 bits of `a * b`, and whether the product fits.
fn product(a: u64, b: u64, signed: bool) -> (u64, Choice) {
    if signed {
        let product = (a as i64 as i128) * (b as i64 as i128);
        (product as u64, (product as i64 as i128).ct_eq(&product))
    } else {
        let product = (a as u128) * (b as u128);
        (product as u64, ((product >> 64) as u64).ct_eq(&0))
    }
}

pub fn mul(a: u64, b: u64, signed: bool) -> Result<u64> {
    let (value, fits) = product(a, b, signed);
    if !bool::from(fits) {
        trace!("product does not fit 64 bits");
        return Err(Error::Overflow);
    }
    Ok(value)
}

/// Quotient and remainder, rounding toward zero with the remainder taking
/// the sign of the dividend.
fn signed_div_rem(a: u64, b: u64, signed: bool, secret: bool) -> Result<(u64, u64)> {
    if !signed {
        let (quotient, remainder) = div_rem(a as u128, b, secret)?;
        return Ok((quotient as u64, remainder));
    }
    let (a_sign, b_sign) = (sign_mask(a), sign_mask(b));
    let (quotient, remainder) = div_rem(negate_where(a, a_sign) as u128, negate_where(b, b_sign), secret)?;
    let quotient_sign = a_sign ^ b_sign;
    // only i64::MIN / -1 leaves a positive quotient of 2^63
    if quotient_sign == 0 && quotient >> 63 != 0 {
        trace!("quotient does not fit 64 bits");
        return Err(Error::Overflow);
    }
    Ok((negate_where(quotient as u64, quotient_sign), negate_where(remainder, a_sign)))
}

pub fn div(a: u64, b: u64, signed: bool, secret: bool) -> Result<u64> {
    Ok(signed_div_rem(a, b, signed, secret)?.0)
}

pub fn rem(a: u64, b: u64, signed: bool, secret: bool) -> Result<u64> {
    let (a_sign, b_sign) = (sign_mask(a), sign_mask(b));
    if signed {
        // the remainder exists even where the quotient overflows
        let (_, remainder) = div_rem(negate_where(a, a_sign) as u128, negate_where(b, b_sign), secret)?;
        return Ok(negate_where(remainder, a_sign));
    }
    Ok(signed_div_rem(a, b, false, secret)?.1)
}

/// `value mod modulus` in `[0, modulus)`, reading `value` as `i64` when `signed`.
pub fn mod_reduce(value: u64, modulus: u64, signed: bool, secret: bool) -> Result<u64> {
    let sign = if signed { sign_mask(value) } else { 0 };
    let residue = reduce(negate_where(value, sign) as u128, modulus, secret)?;
    let flip = Choice::from((sign & 1) as u8) & !residue.ct_eq(&0);
    Ok(u64::conditional_select(&residue, &modulus.wrapping_sub(residue), flip))
}

/// Checked `base^exponent`.
///
/// With `secret`, all 32 exponent bits are processed and every product is
/// formed; only the width of the exponent shows.
pub fn exp(base: u64, exponent: u32, signed: bool, secret: bool) -> Result<u64> {
    let top = if secret { 32 } else { 32 - exponent.leading_zeros() };
    let mut result = 1;
    let mut fits = Choice::from(1);
    for bit in (0..top).rev() {
        let (square, square_fits) = product(result, result, signed);
        result = square;
        fits &= square_fits;

        let take = Choice::from(((exponent >> bit) & 1) as u8);
        let (multiplied, multiplied_fits) = product(result, base, signed);
        result.conditional_assign(&multiplied, take);
        fits &= !take | multiplied_fits;
    }
    if !bool::from(fits) {
        trace!("power does not fit 64 bits");
        return Err(Error::Overflow);
    }
    Ok(result)
}

pub fn modular_add(a: u64, b: u64, modulus: u64, secret: bool) -> Result<u64> {
    reduce(a as u128 + b as u128, modulus, secret)
}

pub fn modular_sub(a: u64, b: u64, modulus: u64, secret: bool) -> Result<u64> {
    let (a, b) = (reduce(a as u128, modulus, secret)?, reduce(b as u128, modulus, secret)?);
    reduce(a as u128 + modulus as u128 - b as u128, modulus, secret)
}

pub fn modular_mul(a: u64, b: u64, modulus: u64, secret: bool) -> Result<u64> {
    reduce(a as u128 * b as u128, modulus, secret)
}

pub fn modular_negate(a: u64, modulus: u64, secret: bool) -> Result<u64> {
    modular_sub(0, a, modulus, secret)
}

/// `a * b^-1 mod modulus`, `NotInvertible` when `gcd(b, modulus) != 1`.
pub fn modular_div(a: u64, b: u64, modulus: u64, secret: bool) -> Result<u64> {
    let b = reduce(b as u128, modulus, secret)?;
    let (candidate, invertible) = inverse(&to_limbs(b), &to_limbs(modulus), secret)?;
    if !bool::from(invertible) {
        return Err(Error::NotInvertible);
    }
    modular_mul(a, from_limbs(&candidate), modulus, secret)
}

/// `base^exponent mod modulus` by square-and-multiply.
pub fn modular_exp(base: u64, exponent: u64, modulus: u64, secret: bool) -> Result<u64> {
    let base = reduce(base as u128, modulus, secret)?;
    let top = if secret { 64 } else { 64 - exponent.leading_zeros() };
    let mut result = reduce(1, modulus, secret)?;
    for bit in (0..top).rev() {
        result = modular_mul(result, result, modulus, secret)?;
        if secret {
            let multiplied = modular_mul(result, base, modulus, secret)?;
            result.conditional_assign(&multiplied, Choice::from(((exponent >> bit) & 1) as u8));
        } else if (exponent >> bit) & 1 == 1 {
            result = modular_mul(result, base, modulus, secret)?;
        }
    }
    Ok(result)
}

/// Uniformly random value of `width` bits from a true-random source.
pub fn random_value<R: RngCore + CryptoRng>(width: u32, rng: &mut R) -> Result<u64> {
    if width == 0 || width > 64 {
        return Err(Error::InvalidArgument("small number width out of range"));
    }
    Ok(rng.next_u64() & (u64::MAX >> (64 - width)))
}

//! Modular inverses.
//!
//! Odd moduli use a binary extended GCD with a fixed number of rounds;
//! even moduli reduce to an odd one via Arazi's lemma. Both paths only
//! compute a candidate, which is then checked by multiplying back.

use subtle::{Choice, ConditionallySelectable};
use zeroize::Zeroizing;

use super::add::add_assign_carry;
use super::divide::{div_rem, reduce, scratch, Scratch};
use super::multiply::mul_into;
use super::shift::shr_assign;
use super::subtract::sub_assign_borrow;
use crate::digit::DIGIT_BITS;
use crate::numbers::Limbs;
use crate::{Digit, Error, Result};

/// `out = a - b mod m` for `a, b < m`.
pub(crate) fn sub_mod(out: &mut [Digit], a: &[Digit], b: &[Digit], m: &[Digit]) {
    out.copy_from_slice(a);
    let borrow = sub_assign_borrow(out, b);
    let mut correction = scratch(m.len());
    for (limb, modulus) in correction.iter_mut().zip(m) {
        *limb = modulus & borrow;
    }
    add_assign_carry(out, &correction);
}

/// Binary extended GCD for odd `m` and `x < m`.
///
/// Keeps `a = u·x` and `b = v·x` modulo `m`, starting from `a = x, b = m`.
/// Each round halves `a` after making it even, so `2 * bits` rounds bring
/// `a` to zero with the GCD left in `b`.
fn inverse_odd(x: &[Digit], m: &[Digit]) -> (Scratch, Choice) {
    let len = m.len();
    let mut a = Zeroizing::new(x.to_vec());
    let mut b = Zeroizing::new(m.to_vec());
    let mut u = scratch(len);
    u[0] = 1;
    let mut v = scratch(len);
    let mut difference = scratch(len);
    let mut half = scratch(len + 1);
    let mut correction = scratch(len);

    for _ in 0..2 * len * DIGIT_BITS {
        let odd = Limbs::new(&a).is_odd();
        let swap = odd & Limbs::new(&a).ct_lt(&b);
        Limbs::new_mut(&mut a).conditional_swap(Limbs::new_mut(&mut b), swap);
        Limbs::new_mut(&mut u).conditional_swap(Limbs::new_mut(&mut v), swap);

        difference.copy_from_slice(&a);
        sub_assign_borrow(&mut difference, &b);
        Limbs::new_mut(&mut a).conditional_assign(&difference, odd);
        sub_mod(&mut difference, &u, &v, m);
        Limbs::new_mut(&mut u).conditional_assign(&difference, odd);

        // a is even now, u is halved modulo m
        shr_assign(&mut a, 1, 0);
        let u_odd = Limbs::new(&u).is_odd();
        for (limb, modulus) in correction.iter_mut().zip(m) {
            *limb = Digit::conditional_select(&0, modulus, u_odd);
        }
        half[..len].copy_from_slice(&u);
        half[len] = 0;
        add_assign_carry(&mut half, &correction);
        shr_assign(&mut half, 1, 0);
        u.copy_from_slice(&half[..len]);
    }

    let mut one = scratch(len);
    one[0] = 1;
    let coprime = Limbs::new(&b).ct_eq(&one);
    (v, coprime)
}

/// Arazi's lemma: $x^{-1} = (1 + m(x - (m^{-1}\text{ mod }x))) / x\text{ mod }m$.
///
/// Meaningful for odd `x` only; `x` is forced odd so the work does not
/// depend on its parity.
fn inverse_even(x: &[Digit], m: &[Digit], secret: bool) -> Result<Scratch> {
    let len = m.len();
    let mut odd_x = Zeroizing::new(x.to_vec());
    odd_x[0] |= 1;

    let m_mod_x = reduce(m, &odd_x, secret)?;
    let (y, _) = inverse_odd(&m_mod_x, &odd_x);

    let mut factor = odd_x.clone();
    sub_assign_borrow(&mut factor, &y);
    let mut numerator = scratch(2 * len + 1);
    mul_into(&mut numerator, m, &factor);
    add_assign_carry(&mut numerator, &[1]);

    let (quotient, _) = div_rem(&numerator, &odd_x, secret)?;
    reduce(&quotient, m, secret)
}

/// Candidate for $x^{-1}\text{ mod }m$, `x < m` of the same length, and
/// whether it is one.
///
/// For secret operands both paths run and the parity of `m` selects.
pub(crate) fn inverse(x: &[Digit], m: &[Digit], secret: bool) -> Result<(Scratch, Choice)> {
    if bool::from(Limbs::new(m).is_zero()) {
        return Err(Error::DivideByZero);
    }
    let len = m.len();
    let m_odd = Limbs::new(m).is_odd();

    let candidate = if secret {
        let (odd, _) = inverse_odd(x, m);
        let mut candidate = inverse_even(x, m, true)?;
        Limbs::new_mut(&mut candidate).conditional_assign(&odd, m_odd);
        candidate
    } else if bool::from(m_odd) {
        inverse_odd(x, m).0
    } else {
        inverse_even(x, m, false)?
    };

    let mut product = scratch(2 * len);
    mul_into(&mut product, x, &candidate);
    let residue = reduce(&product, m, secret)?;
    let mut one = scratch(len);
    one[0] = 1;
    let one = reduce(&one, m, secret)?;
    let verified = Limbs::new(&residue).ct_eq(&one);
    Ok((candidate, verified))
}

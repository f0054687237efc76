//! Montgomery multiplication for odd moduli.
//!
//! Residues $x$ are represented as $xR\text{ mod }n$, with $R = 2^{B \cdot L}$
//! for $L$ limbs of $B$ bits. Reduction after multiplication is then a
//! right shift by whole limbs instead of a long division.
//!
//! Only used for public moduli: computing $R^2\text{ mod }n$ runs the
//! variable-time long division.

use subtle::Choice;

use super::divide::{reduce, scratch, Scratch};
use super::multiply::mac_digit;
use super::subtract::sub_assign_borrow;
use crate::digit::DIGIT_BITS;
use crate::numbers::Limbs;
use crate::{Digit, Result};

/// Inverse of odd number modulo power of two: $e^{-1}\text{ mod }2^{|f|}$
///
/// This has $\mathcal{O}(\log n)$ loops in `Digit::BITS`:
/// 5 iterations for u32, 6 iterations for u64.
///
/// Source: Fig. 1 from
/// [GCD-Free Algorithms for Computing Modular Inverses (2003)][joy-paillier]
///
/// Note that this source is highly confusing! What they mean to say
/// is to iterate $y \leftarrow y(2 - ey)$ in $\mathbb{Z}/2^{|f|}$,
/// where the output is an inverse of $e$ modulo $2^{2i}$.
///
/// Cf. [Crypto StackExchange][cse].
///
/// [joy-paillier]: https://api.semanticscholar.org/CorpusID:17736455
/// [cse]: https://crypto.stackexchange.com/a/47496
pub(crate) fn e_inverse_digit_joye_paillier(e: Digit) -> Digit {
    debug_assert_ne!(e & 1, 0);

    // log_2(32) = 5, log_2(64) = 6.
    #[allow(non_snake_case)]
    let T = Digit::BITS.trailing_zeros();
    let mut y: Digit = 1;
    let two: Digit = 2;

    for _ in 1..=T {
        y = y.wrapping_mul(two.wrapping_sub(e.wrapping_mul(y)));
    }
    y
}

/// $Q_0 = -P_0^{-1}\text{(mod }2^{w}\text{)}$
fn digit_minus_inverse(p0: Digit) -> Digit {
    e_inverse_digit_joye_paillier(p0).wrapping_neg()
}

pub(crate) struct Montgomery<'n> {
    n: &'n [Digit],
    n_prime: Digit,
    r2: Scratch,
}

impl<'n> Montgomery<'n> {
    /// Context for the odd modulus `n`. Residues have as many limbs as `n`.
    pub fn new(n: &'n [Digit]) -> Result<Self> {
        debug_assert!(bool::from(Limbs::new(n).is_odd()));
        let len = n.len();
        let mut r_squared = scratch(2 * len + 1);
        r_squared[2 * len] = 1;
        let r2 = reduce(&r_squared, n, false)?;
        Ok(Montgomery { n, n_prime: digit_minus_inverse(n[0]), r2 })
    }

    /// $xyR^{-1}\text{ mod }n$ for $x, y < n$.
    ///
    /// Coarsely integrated operand scanning, with a final subtraction that
    /// is always computed and kept by mask.
    pub fn mul(&self, x: &[Digit], y: &[Digit]) -> Scratch {
        let len = self.n.len();
        // t < 2n throughout, plus room for one multiply-accumulate
        let mut t = scratch(len + 2);

        for xi in x.iter() {
            mac_digit(&mut t, y, *xi);
            let m = t[0].wrapping_mul(self.n_prime);
            mac_digit(&mut t, self.n, m);
            // t[0] is now zero
            t.copy_within(1.., 0);
            t[len + 1] = 0;
        }

        let mut reduced = scratch(len + 1);
        reduced.copy_from_slice(&t[..len + 1]);
        let borrow = sub_assign_borrow(&mut reduced, self.n);
        let keep = Choice::from((!borrow & 1) as u8);
        Limbs::new_mut(&mut t[..len + 1]).conditional_assign(&reduced, keep);

        let mut out = scratch(len);
        out.copy_from_slice(&t[..len]);
        out
    }

    pub fn to_montgomery(&self, x: &[Digit]) -> Scratch {
        self.mul(x, &self.r2)
    }

    pub fn to_modular(&self, x: &[Digit]) -> Scratch {
        let mut one = scratch(self.n.len());
        one[0] = 1;
        self.mul(x, &one)
    }

    /// $x^e\text{ mod }n$ for $x < n$, square-and-multiply over every bit of `exponent`.
    ///
    /// For a secret exponent the product is always formed and kept by mask.
    pub fn power(&self, x: &[Digit], exponent: &[Digit], secret: bool) -> Scratch {
        let mut one = scratch(self.n.len());
        one[0] = 1;
        let mut result = self.to_montgomery(&one);
        let x = self.to_montgomery(x);

        for i in (0..exponent.len() * DIGIT_BITS).rev() {
            result = self.mul(&result, &result);
            let bit = Limbs::new(exponent).bit(i);
            if secret {
                let product = self.mul(&result, &x);
                Limbs::new_mut(&mut result).conditional_assign(&product, bit);
            } else if bool::from(bit) {
                result = self.mul(&result, &x);
            }
        }
        self.to_modular(&result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::*;
    use crate::numbers::digits_from_bytes;
    use hex_literal::hex;

    fn limbs(big_endian: &[u8]) -> Scratch {
        let mut little_endian = big_endian.to_vec();
        little_endian.reverse();
        digits_from_bytes(&little_endian)
    }

    #[test]
    fn f4_inverse_digit() {
        let e: Digit = 65537;
        let candidate = e_inverse_digit_joye_paillier(e);
        assert_eq!(candidate.wrapping_mul(e), 1);

        #[cfg(feature = "u32")]
        assert_eq!(candidate, 4294901761);
        #[cfg(feature = "u64")]
        assert_eq!(candidate, 18446462603027742721);

        for odd_number in (e..=(e + 1001)).step_by(2) {
            let candidate = e_inverse_digit_joye_paillier(odd_number);
            assert_eq!(candidate.wrapping_mul(odd_number), 1);
        }
        assert_eq!(digit_minus_inverse(e).wrapping_mul(e), Digit::MAX);
    }

    #[test]
    fn round_trip() {
        let n = limbs(&P256);
        let mont = Montgomery::new(&n).unwrap();
        let q = limbs(&Q256);
        assert_eq!(&mont.to_modular(&mont.to_montgomery(&q))[..], &q[..]);
    }

    #[test]
    fn power() {
        let p = limbs(&P256);
        let mont = Montgomery::new(&p).unwrap();
        let q = limbs(&Q256);

        for secret in [false, true].iter().copied() {
            // a^1
            assert_eq!(&mont.power(&q, &[1], secret)[..], &q[..]);

            // a^2
            let expected = limbs(&hex!("a9011f55fff270e6480e624c330b99139ecfa3d321853ed16ea89a98463830cd"));
            assert_eq!(&mont.power(&q, &[2], secret)[..], &expected[..]);

            // a^37
            let expected = limbs(&hex!("e3e25a634b71560eb4c3799c35395f295aa4f7acc945126597cdb59426227351"));
            assert_eq!(&mont.power(&q, &[37], secret)[..], &expected[..]);

            // a^c
            let c = limbs(&C256);
            let expected = limbs(&hex!("1fad10eb21f2edc19fc7ab419412b799a683bb70ef10883a6be7480c99fbf778"));
            assert_eq!(&mont.power(&q, &c, secret)[..], &expected[..]);
        }
    }

    #[test]
    fn single_limb() {
        let n = [497];
        let mont = Montgomery::new(&n).unwrap();
        assert_eq!(&mont.power(&[4], &[13], false)[..], &[445]);
        assert_eq!(&mont.power(&[4], &[0], true)[..], &[1]);
    }
}

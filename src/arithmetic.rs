//! Bigint arithmetic.
//!
//! Limb-level algorithms live in the submodules and work on slices of
//! [`Digit`]s. The entry points load their operands off the heap, check
//! that they have the same type, compute in scratch buffers and store the
//! result in the destination array.
//!
//! Secrecy is contagious: a result is secret if any operand is. Whenever
//! an operand is secret, the algorithms only branch on lengths and widths,
//! never on values.
//!
//! Modular operations treat the modulus as an unsigned number of its own
//! width. Operands of any type are first reduced into $[0, m)$ and the
//! result has the type of the modulus (unsigned).

use crate::array::{ComparisonType, Ordering};
use crate::heap::Heap;
use crate::numbers::{Limbs, Number};
use crate::{Array, Digit, Error, Result};

pub(crate) mod add;
pub(crate) mod divide;
pub(crate) mod inverse;
pub(crate) mod montgomery;
pub(crate) mod multiply;
pub(crate) mod shift;
pub(crate) mod subtract;

use divide::{reduce, scratch, Scratch};
use montgomery::Montgomery;

/// Limbs of a modulus, plus the taint of everything that went into the operation.
struct Modulus {
    number: Number,
    secret: bool,
}

impl Modulus {
    fn digits(&self) -> &[Digit] {
        &self.number.digits
    }

    fn len(&self) -> usize {
        self.number.limbs()
    }

    /// `x mod m` in $[0, m)$, for `x` of any type.
    fn reduce(&self, x: &Number) -> Result<Scratch> {
        let negative = x.is_negative();
        let mut magnitude = x.extended(x.limbs() + 1);
        Limbs::new_mut(&mut magnitude).conditional_negate(negative);
        let mut residue = reduce(&magnitude, self.digits(), self.secret)?;

        // -r is m - r, except that -0 stays 0
        let mut negated = self.number.digits.clone();
        subtract::sub_assign_borrow(&mut negated, &residue);
        let flip = negative & !Limbs::new(&residue).is_zero();
        Limbs::new_mut(&mut residue).conditional_assign(&negated, flip);
        Ok(residue)
    }

    /// `x * y mod m` for reduced `x` and `y`.
    fn mul(&self, x: &[Digit], y: &[Digit]) -> Result<Scratch> {
        let mut product = scratch(2 * self.len());
        multiply::mul_into(&mut product, x, y);
        reduce(&product, self.digits(), self.secret)
    }

    fn one(&self) -> Result<Scratch> {
        let mut one = scratch(self.len());
        one[0] = 1;
        reduce(&one, self.digits(), self.secret)
    }

    fn result(&self, digits: Scratch) -> Number {
        Number {
            digits,
            width: self.number.width,
            signed: false,
            secret: self.secret,
        }
    }
}

impl Heap {
    /// Both operands of a binary operation, which must have the same type.
    pub(crate) fn operands(&self, a: &Array, b: &Array) -> Result<(Number, Number)> {
        let a = self.load(a)?;
        let b = self.load(b)?;
        a.same_type(&b)?;
        Ok((a, b))
    }

    fn modulus(&self, modulus: &Array, operands: &[&Number]) -> Result<Modulus> {
        let number = self.load(modulus)?;
        if bool::from(number.is_negative()) {
            return Err(Error::InvalidArgument("negative modulus"));
        }
        if bool::from(Limbs::new(&number.digits).is_zero()) {
            return Err(Error::DivideByZero);
        }
        let secret = number.secret || operands.iter().any(|operand| operand.secret);
        Ok(Modulus { number, secret })
    }

    fn bitwise(&mut self, dest: &mut Array, a: &Array, b: &Array, op: fn(Digit, Digit) -> Digit) -> Result<()> {
        let (a, b) = self.operands(a, b)?;
        let mut result = a.clone();
        for (x, y) in result.digits.iter_mut().zip(b.digits.iter()) {
            *x = op(*x, *y);
        }
        result.secret = a.secret || b.secret;
        self.store(dest, &result)
    }

    pub fn bigint_and(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.bitwise(dest, a, b, |x, y| x & y)
    }

    pub fn bigint_or(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.bitwise(dest, a, b, |x, y| x | y)
    }

    pub fn bigint_xor(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.bitwise(dest, a, b, |x, y| x ^ y)
    }

    /// Compare two bigints of the same type, signed-aware.
    ///
    /// Always constant-time: one subtraction over all limbs decides.
    pub fn compare_bigints(&self, compare_type: ComparisonType, a: &Array, b: &Array) -> Result<bool> {
        let (a, b) = self.operands(a, b)?;
        let len = a.limbs() + 1;
        let mut difference = a.extended(len);
        subtract::sub_assign_borrow(&mut difference, &b.extended(len));

        let less = Limbs::new(&difference).bit(len * crate::digit::DIGIT_BITS - 1);
        let equal = Limbs::new(&a.digits).ct_eq(&b.digits);
        let order = Ordering { less, equal, greater: !less & !equal };
        Ok(order.satisfies(compare_type).into())
    }

    pub fn modular_add(&mut self, dest: &mut Array, a: &Array, b: &Array, modulus: &Array) -> Result<()> {
        let (a, b) = (self.load(a)?, self.load(b)?);
        let m = self.modulus(modulus, &[&a, &b])?;
        let (x, y) = (m.reduce(&a)?, m.reduce(&b)?);
        let mut sum = scratch(m.len() + 1);
        sum[..m.len()].copy_from_slice(&x);
        add::add_assign_carry(&mut sum, &y);
        let result = m.result(reduce(&sum, m.digits(), m.secret)?);
        self.store(dest, &result)
    }

    pub fn modular_sub(&mut self, dest: &mut Array, a: &Array, b: &Array, modulus: &Array) -> Result<()> {
        let (a, b) = (self.load(a)?, self.load(b)?);
        let m = self.modulus(modulus, &[&a, &b])?;
        let (x, y) = (m.reduce(&a)?, m.reduce(&b)?);
        let mut difference = scratch(m.len());
        inverse::sub_mod(&mut difference, &x, &y, m.digits());
        let result = m.result(difference);
        self.store(dest, &result)
    }

    pub fn modular_mul(&mut self, dest: &mut Array, a: &Array, b: &Array, modulus: &Array) -> Result<()> {
        let (a, b) = (self.load(a)?, self.load(b)?);
        let m = self.modulus(modulus, &[&a, &b])?;
        let (x, y) = (m.reduce(&a)?, m.reduce(&b)?);
        let result = m.result(m.mul(&x, &y)?);
        self.store(dest, &result)
    }

    pub fn modular_negate(&mut self, dest: &mut Array, source: &Array, modulus: &Array) -> Result<()> {
        let a = self.load(source)?;
        let m = self.modulus(modulus, &[&a])?;
        let x = m.reduce(&a)?;
        let mut negated = scratch(m.len());
        inverse::sub_mod(&mut negated, &scratch(m.len()), &x, m.digits());
        let result = m.result(negated);
        self.store(dest, &result)
    }

    /// `dest = source^-1 mod modulus`.
    ///
    /// Returns whether the inverse exists, i.e. `gcd(source, modulus) = 1`.
    /// Otherwise `dest` holds an unspecified value of the right type.
    pub fn modular_inverse(&mut self, dest: &mut Array, source: &Array, modulus: &Array) -> Result<bool> {
        let a = self.load(source)?;
        let m = self.modulus(modulus, &[&a])?;
        let x = m.reduce(&a)?;
        let (candidate, invertible) = inverse::inverse(&x, m.digits(), m.secret)?;
        let result = m.result(candidate);
        self.store(dest, &result)?;
        Ok(invertible.into())
    }

    /// `dest = a * b^-1 mod modulus`; `NotInvertible` if `b` has no inverse.
    pub fn modular_div(&mut self, dest: &mut Array, a: &Array, b: &Array, modulus: &Array) -> Result<()> {
        let (a, b) = (self.load(a)?, self.load(b)?);
        let m = self.modulus(modulus, &[&a, &b])?;
        let (x, y) = (m.reduce(&a)?, m.reduce(&b)?);
        let (inverse, invertible) = inverse::inverse(&y, m.digits(), m.secret)?;
        if !bool::from(invertible) {
            return Err(Error::NotInvertible);
        }
        let result = m.result(m.mul(&x, &inverse)?);
        self.store(dest, &result)
    }

    /// `dest = base^exponent mod modulus`, square-and-multiply over every
    /// bit of the exponent's width.
    ///
    /// A public odd modulus goes through Montgomery multiplication. With
    /// any secret input, every multiplication is performed and its result
    /// kept or dropped by mask.
    pub fn modular_exp(&mut self, dest: &mut Array, base: &Array, exponent: &Array, modulus: &Array) -> Result<()> {
        let (base, exponent) = (self.load(base)?, self.load(exponent)?);
        if bool::from(exponent.is_negative()) {
            return Err(Error::InvalidArgument("negative exponent"));
        }
        let m = self.modulus(modulus, &[&base, &exponent])?;
        let x = m.reduce(&base)?;

        let power = if !m.number.secret && bool::from(Limbs::new(m.digits()).is_odd()) {
            Montgomery::new(m.digits())?.power(&x, &exponent.digits, m.secret)
        } else {
            let mut result = m.one()?;
            for i in (0..exponent.limbs() * crate::digit::DIGIT_BITS).rev() {
                result = m.mul(&result, &result)?;
                let bit = Limbs::new(&exponent.digits).bit(i);
                if m.secret {
                    let product = m.mul(&result, &x)?;
                    Limbs::new_mut(&mut result).conditional_assign(&product, bit);
                } else if bool::from(bit) {
                    result = m.mul(&result, &x)?;
                }
            }
            result
        };
        let result = m.result(power);
        self.store(dest, &result)
    }
}

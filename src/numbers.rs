//! Bigints stored in heap arrays.
//!
//! A bigint is an array of [`Digit`]s. Element 0 is the header digit:
//!
//! ```text
//!   top bit         secret
//!   next bit        signed
//!   remaining bits  width in bits
//! ```
//!
//! followed by `limbs_for(width)` little-endian limbs holding the low
//! `width` bits of the value (two's complement when signed). Bits above the
//! width are always zero.
//!
//! Arithmetic never works on the heap bytes directly: operands are loaded
//! into a [`Number`], the result is computed in scratch buffers and stored
//! back in one go.

use alloc::vec::Vec;

use rand_core::{CryptoRng, RngCore};
use ref_cast::RefCast;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::{Zeroize, Zeroizing};

use crate::arithmetic::subtract::sbb;
use crate::digit::{DoubleDigit, SignedDoubleDigit, DIGIT_BITS};
use crate::heap::Heap;
use crate::secret::SecretBool;
use crate::{Array, Digit, Error, Result, DIGIT_BYTES};

mod encoding;

const SECRET_BIT: Digit = 1 << (DIGIT_BITS - 1);
const SIGNED_BIT: Digit = 1 << (DIGIT_BITS - 2);
const WIDTH_MASK: Digit = SIGNED_BIT - 1;

/// Widest bigint accepted, in bits.
pub const MAX_WIDTH: usize = 1 << 24;

/// Limbs needed for `width` bits.
pub(crate) fn limbs_for(width: usize) -> usize {
    (width + DIGIT_BITS - 1) / DIGIT_BITS
}

/// Valid bits of the top limb of a `width` bit number.
pub(crate) fn top_mask(width: usize) -> Digit {
    match width % DIGIT_BITS {
        0 => Digit::MAX,
        bits => ((1 as Digit) << bits) - 1,
    }
}

/// Bits of limb `index` at or above bit position `from`.
fn mask_from(index: usize, from: usize) -> Digit {
    let low = index * DIGIT_BITS;
    if from <= low {
        Digit::MAX
    } else if from >= low + DIGIT_BITS {
        0
    } else {
        Digit::MAX << (from - low)
    }
}

pub(crate) fn check_width(width: usize) -> Result<()> {
    if width == 0 || width > MAX_WIDTH {
        return Err(Error::InvalidArgument("bigint width out of range"));
    }
    Ok(())
}

/// Whether the two's complement value in `value` is representable in
/// `width` bits. Looks at every limb.
pub(crate) fn fits(value: &[Digit], width: usize, signed: bool) -> Choice {
    let top = value.last().copied().unwrap_or(0) >> (DIGIT_BITS - 1);
    let (fill, from, negative) = if signed {
        ((0 as Digit).wrapping_sub(top), width - 1, 0)
    } else {
        // negative values never fit an unsigned type
        (0, width, top)
    };
    let excess = value
        .iter()
        .enumerate()
        .fold(negative, |excess, (index, limb)| excess | ((limb ^ fill) & mask_from(index, from)));
    excess.ct_eq(&0)
}

fn digit_from(chunk: &[u8]) -> Digit {
    let mut raw = [0u8; DIGIT_BYTES];
    raw.copy_from_slice(chunk);
    Digit::from_ne_bytes(raw)
}

pub(crate) fn digits_from_bytes(bytes: &[u8]) -> Zeroizing<Vec<Digit>> {
    Zeroizing::new(bytes.chunks_exact(DIGIT_BYTES).map(digit_from).collect())
}

fn write_digits(bytes: &mut [u8], digits: &[Digit]) {
    for (chunk, digit) in bytes.chunks_exact_mut(DIGIT_BYTES).zip(digits) {
        chunk.copy_from_slice(&digit.to_ne_bytes());
    }
}

/// Limb slice with constant-time helpers.
#[derive(RefCast)]
#[repr(transparent)]
pub(crate) struct Limbs(pub [Digit]);

impl Limbs {
    pub fn new(digits: &[Digit]) -> &Self {
        Limbs::ref_cast(digits)
    }

    pub fn new_mut(digits: &mut [Digit]) -> &mut Self {
        Limbs::ref_cast_mut(digits)
    }

    pub fn is_zero(&self) -> Choice {
        self.0.iter().fold(0, |acc, limb| acc | limb).ct_eq(&0)
    }

    pub fn is_odd(&self) -> Choice {
        Choice::from((self.0.first().copied().unwrap_or(0) & 1) as u8)
    }

    pub fn bit(&self, index: usize) -> Choice {
        Choice::from(((self.0[index / DIGIT_BITS] >> (index % DIGIT_BITS)) & 1) as u8)
    }

    /// Equality of two limb slices of the same length.
    pub fn ct_eq(&self, other: &[Digit]) -> Choice {
        debug_assert_eq!(self.0.len(), other.len());
        self.0.ct_eq(other)
    }

    /// Unsigned `self < other`, both of the same length.
    pub fn ct_lt(&self, other: &[Digit]) -> Choice {
        debug_assert_eq!(self.0.len(), other.len());
        let mut borrow: SignedDoubleDigit = 0;
        for (x, y) in self.0.iter().zip(other) {
            sbb(*x, *y, &mut borrow);
        }
        Choice::from((borrow & 1) as u8)
    }

    pub fn conditional_assign(&mut self, other: &[Digit], choice: Choice) {
        debug_assert_eq!(self.0.len(), other.len());
        for (limb, other) in self.0.iter_mut().zip(other) {
            limb.conditional_assign(other, choice);
        }
    }

    pub fn conditional_swap(&mut self, other: &mut Limbs, choice: Choice) {
        debug_assert_eq!(self.0.len(), other.0.len());
        for (x, y) in self.0.iter_mut().zip(other.0.iter_mut()) {
            Digit::conditional_swap(x, y, choice);
        }
    }

    /// Two's complement negation modulo `2^(len * DIGIT_BITS)` if `choice` is set.
    pub fn conditional_negate(&mut self, choice: Choice) {
        let mask = (0 as Digit).wrapping_sub(choice.unwrap_u8() as Digit);
        let mut carry = choice.unwrap_u8() as DoubleDigit;
        for limb in self.0.iter_mut() {
            carry += (*limb ^ mask) as DoubleDigit;
            *limb = carry as Digit;
            carry >>= DIGIT_BITS;
        }
    }
}

/// A bigint loaded off the heap.
#[derive(Clone, Debug, Zeroize)]
pub(crate) struct Number {
    /// `limbs_for(width)` limbs, bits above `width` clear.
    pub digits: Zeroizing<Vec<Digit>>,
    pub width: usize,
    pub signed: bool,
    pub secret: bool,
}

impl Number {
    pub fn zero(width: usize, signed: bool, secret: bool) -> Result<Self> {
        check_width(width)?;
        Ok(Number {
            digits: Zeroizing::new(alloc::vec![0; limbs_for(width)]),
            width,
            signed,
            secret,
        })
    }

    pub fn limbs(&self) -> usize {
        self.digits.len()
    }

    fn header(&self) -> Digit {
        let mut header = self.width as Digit;
        if self.signed {
            header |= SIGNED_BIT;
        }
        if self.secret {
            header |= SECRET_BIT;
        }
        header
    }

    /// Sign bit of a signed number, clear for unsigned ones.
    pub fn is_negative(&self) -> Choice {
        let top = Limbs::new(&self.digits).bit(self.width - 1);
        top & Choice::from(self.signed as u8)
    }

    /// The value sign-extended (or zero-extended) to `len >= self.limbs()` limbs.
    pub fn extended(&self, len: usize) -> Zeroizing<Vec<Digit>> {
        debug_assert!(len >= self.limbs());
        let mut out = Zeroizing::new(alloc::vec![0; len]);
        let limbs = self.limbs();
        out[..limbs].copy_from_slice(&self.digits);
        let fill = (0 as Digit).wrapping_sub(self.is_negative().unwrap_u8() as Digit);
        out[limbs - 1] |= fill & !top_mask(self.width);
        for limb in out[limbs..].iter_mut() {
            *limb = fill;
        }
        out
    }

    /// The number of the given type holding `value`.
    ///
    /// `value` is two's complement over all of its limbs. Without
    /// `truncate`, a value the type cannot represent is an overflow;
    /// with it, the value wraps.
    pub fn from_extended(value: &[Digit], width: usize, signed: bool, secret: bool, truncate: bool) -> Result<Self> {
        check_width(width)?;
        let limbs = limbs_for(width);
        debug_assert!(value.len() >= limbs);
        if !truncate && !bool::from(fits(value, width, signed)) {
            trace!("result does not fit {} bits", width);
            return Err(Error::Overflow);
        }
        let mut digits = Zeroizing::new(value[..limbs].to_vec());
        digits[limbs - 1] &= top_mask(width);
        Ok(Number { digits, width, signed, secret })
    }

    pub fn same_type(&self, other: &Number) -> Result<()> {
        if self.width != other.width || self.signed != other.signed {
            return Err(Error::Mismatch("bigint operands differ in width or signedness"));
        }
        Ok(())
    }
}

impl Heap {
    pub(crate) fn load(&self, bigint: &Array) -> Result<Number> {
        let (_, header) = self
            .locate(bigint)?
            .ok_or(Error::InvalidArgument("the empty array is not a bigint"))?;
        if header.element_size != DIGIT_BYTES || header.has_sub_arrays {
            return Err(Error::Mismatch("array does not hold limbs"));
        }
        let raw = digits_from_bytes(self.bytes(bigint)?);
        let head = raw.first().copied().unwrap_or(0);
        let width = head & WIDTH_MASK;
        if width == 0 || width > MAX_WIDTH as Digit || raw.len() != 1 + limbs_for(width as usize) {
            return Err(Error::InvalidArgument("malformed bigint header"));
        }
        let width = width as usize;
        let mut digits = Zeroizing::new(raw[1..].to_vec());
        let top = digits.len() - 1;
        digits[top] &= top_mask(width);
        Ok(Number {
            digits,
            width,
            signed: head & SIGNED_BIT != 0,
            secret: head & SECRET_BIT != 0,
        })
    }

    /// Write `number` into `dest`, reusing its block when the shape matches.
    pub(crate) fn store(&mut self, dest: &mut Array, number: &Number) -> Result<()> {
        let len = 1 + number.limbs();
        let reusable = match self.locate(dest)? {
            Some((_, header)) => {
                header.element_size == DIGIT_BYTES && !header.has_sub_arrays && dest.num_elements == len
            }
            None => false,
        };
        if !reusable {
            let fresh = self.allocate(len, DIGIT_BYTES, false)?;
            let mut previous = core::mem::replace(dest, fresh);
            self.free(&mut previous)?;
        }
        let bytes = self.bytes_mut(dest)?;
        let (head, limbs) = bytes.split_at_mut(DIGIT_BYTES);
        write_digits(head, &[number.header()]);
        write_digits(limbs, &number.digits);
        Ok(())
    }

    pub fn bigint_width(&self, bigint: &Array) -> Result<usize> {
        Ok(self.load(bigint)?.width)
    }

    pub fn bigint_signed(&self, bigint: &Array) -> Result<bool> {
        Ok(self.load(bigint)?.signed)
    }

    pub fn bigint_secret(&self, bigint: &Array) -> Result<bool> {
        Ok(self.load(bigint)?.secret)
    }

    /// Set or clear the secret flag. Clearing it is the only way a value
    /// derived from a secret becomes public again.
    pub fn bigint_set_secret(&mut self, bigint: &Array, secret: bool) -> Result<()> {
        let number = self.load(bigint)?;
        debug!("bigint of {} bits marked {}", number.width, if secret { "secret" } else { "public" });
        let head = Number { secret, ..number }.header();
        write_digits(&mut self.bytes_mut(bigint)?[..DIGIT_BYTES], &[head]);
        Ok(())
    }

    pub fn bigint_zero(&self, bigint: &Array) -> Result<SecretBool> {
        Ok(Limbs::new(&self.load(bigint)?.digits).is_zero().into())
    }

    pub fn bigint_negative(&self, bigint: &Array) -> Result<SecretBool> {
        Ok(self.load(bigint)?.is_negative().into())
    }

    /// Copy of `source` under a new type.
    ///
    /// The result is secret if `secret` is set or `source` is secret.
    /// Without `truncate`, a value the new type cannot hold is an overflow.
    pub fn bigint_cast(
        &mut self,
        dest: &mut Array,
        source: &Array,
        width: usize,
        signed: bool,
        secret: bool,
        truncate: bool,
    ) -> Result<()> {
        check_width(width)?;
        let number = self.load(source)?;
        let value = number.extended(number.limbs().max(limbs_for(width)) + 1);
        let result = Number::from_extended(&value, width, signed, secret || number.secret, truncate)?;
        self.store(dest, &result)
    }

    /// Value copy of `source` into `dest`.
    pub fn bigint_set(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        let number = self.load(source)?;
        self.store(dest, &number)
    }

    /// Uniformly random unsigned bigint of `width` bits, marked secret.
    pub fn random_bigint<R: RngCore + CryptoRng>(&mut self, dest: &mut Array, width: usize, rng: &mut R) -> Result<()> {
        check_width(width)?;
        let limbs = limbs_for(width);
        let mut bytes = Zeroizing::new(alloc::vec![0u8; limbs * DIGIT_BYTES]);
        rng.fill_bytes(&mut bytes);
        let mut digits = digits_from_bytes(&bytes);
        digits[limbs - 1] &= top_mask(width);
        self.store(dest, &Number { digits, width, signed: false, secret: true })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::CountingRng;

    fn number(digits: &[Digit], width: usize, signed: bool) -> Number {
        Number {
            digits: Zeroizing::new(digits.to_vec()),
            width,
            signed,
            secret: false,
        }
    }

    #[test]
    fn limb_counts() {
        assert_eq!(limbs_for(1), 1);
        assert_eq!(limbs_for(DIGIT_BITS), 1);
        assert_eq!(limbs_for(DIGIT_BITS + 1), 2);
        assert_eq!(top_mask(DIGIT_BITS), Digit::MAX);
        assert_eq!(top_mask(3), 0b111);
    }

    #[test]
    fn fitting() {
        let minus_one = [Digit::MAX, Digit::MAX];
        assert!(bool::from(fits(&minus_one, 1, true)));
        assert!(!bool::from(fits(&minus_one, 64, false)));
        assert!(bool::from(fits(&[0x80, 0], 8, false)));
        assert!(!bool::from(fits(&[0x80, 0], 8, true)));
        assert!(bool::from(fits(&[0x7f, 0], 8, true)));
        assert!(!bool::from(fits(&[0x100, 0], 8, false)));
    }

    #[test]
    fn extension() {
        let minus_two = number(&[0b1110], 4, true);
        assert!(bool::from(minus_two.is_negative()));
        let extended = minus_two.extended(2);
        assert_eq!(&extended[..], &[Digit::MAX - 1, Digit::MAX]);

        let fourteen = number(&[0b1110], 4, false);
        assert_eq!(&fourteen.extended(2)[..], &[14, 0]);
    }

    #[test]
    fn limbs_helpers() {
        let mut x = [1 as Digit, 0];
        Limbs::new_mut(&mut x).conditional_negate(Choice::from(1));
        assert_eq!(x, [Digit::MAX, Digit::MAX]);
        assert!(bool::from(Limbs::new(&[1, 2]).ct_lt(&[2, 2])));
        assert!(!bool::from(Limbs::new(&[3, 2]).ct_lt(&[2, 2])));
        assert!(bool::from(Limbs::new(&[0, 0]).is_zero()));
        assert!(bool::from(Limbs::new(&[1 << 1]).bit(1)));

        let (mut a, mut b) = ([1 as Digit], [2 as Digit]);
        Limbs::new_mut(&mut a).conditional_swap(Limbs::new_mut(&mut b), Choice::from(1));
        assert_eq!((a, b), ([2], [1]));
    }

    #[test]
    fn header_round_trip() {
        let mut heap = Heap::default();
        let mut x = Array::empty();
        heap.store(&mut x, &Number { secret: true, ..number(&[5, 0], DIGIT_BITS + 3, true) }).unwrap();
        assert_eq!(x.len(), 3);
        assert_eq!(heap.bigint_width(&x).unwrap(), DIGIT_BITS + 3);
        assert!(heap.bigint_signed(&x).unwrap());
        assert!(heap.bigint_secret(&x).unwrap());

        heap.bigint_set_secret(&x, false).unwrap();
        assert!(!heap.bigint_secret(&x).unwrap());
        assert_eq!(&heap.load(&x).unwrap().digits[..], &[5, 0]);
    }

    #[test]
    fn store_reuses_matching_blocks() {
        let mut heap = Heap::default();
        let mut x = Array::empty();
        heap.store(&mut x, &number(&[1], 8, false)).unwrap();
        let block = x.block;
        heap.store(&mut x, &number(&[2], 8, true)).unwrap();
        assert_eq!(x.block, block);
        heap.store(&mut x, &number(&[2, 3], DIGIT_BITS + 1, false)).unwrap();
        assert_ne!(x.block, block);
        assert_eq!(heap.stats().frees, 1);
    }

    #[test]
    fn malformed_arrays() {
        let mut heap = Heap::default();
        assert!(heap.load(&Array::empty()).is_err());
        let bytes = heap.array_from_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(heap.load(&bytes).unwrap_err(), Error::Mismatch("array does not hold limbs"));
        let limbs = heap.allocate(3, DIGIT_BYTES, false).unwrap();
        assert_eq!(heap.load(&limbs).unwrap_err(), Error::InvalidArgument("malformed bigint header"));
    }

    #[test]
    fn casts() {
        let mut heap = Heap::default();
        let (mut x, mut y) = (Array::empty(), Array::empty());
        heap.integer_to_bigint(&mut x, -1i64 as u64, 16, true, false).unwrap();

        assert_eq!(heap.bigint_cast(&mut y, &x, 16, false, false, false), Err(Error::Overflow));
        heap.bigint_cast(&mut y, &x, 16, false, false, true).unwrap();
        assert_eq!(heap.bigint_to_integer(&y).unwrap(), 0xffff);

        heap.bigint_cast(&mut y, &x, 200, true, true, false).unwrap();
        assert_eq!(heap.bigint_to_integer(&y).unwrap(), -1i64 as u64);
        assert!(heap.bigint_secret(&y).unwrap());

        // the taint survives a cast that does not ask for it
        let mut z = Array::empty();
        heap.bigint_cast(&mut z, &y, 8, true, false, false).unwrap();
        assert!(heap.bigint_secret(&z).unwrap());

        heap.bigint_set(&mut x, &z).unwrap();
        assert_eq!(heap.bigint_width(&x).unwrap(), 8);
    }

    #[test]
    fn zero_and_negative() {
        let mut heap = Heap::default();
        let mut x = Array::empty();
        heap.integer_to_bigint(&mut x, 0, 70, true, true).unwrap();
        assert!(heap.bigint_zero(&x).unwrap().reveal());
        assert!(!heap.bigint_negative(&x).unwrap().reveal());
        heap.integer_to_bigint(&mut x, -5i64 as u64, 70, true, true).unwrap();
        assert!(!heap.bigint_zero(&x).unwrap().reveal());
        assert!(heap.bigint_negative(&x).unwrap().reveal());
    }

    #[test]
    fn random_values_are_secret_and_in_range() {
        let mut heap = Heap::default();
        let mut rng = CountingRng::default();
        let mut x = Array::empty();
        heap.random_bigint(&mut x, 13, &mut rng).unwrap();
        assert!(heap.bigint_secret(&x).unwrap());
        assert!(!heap.bigint_signed(&x).unwrap());
        assert!(heap.bigint_to_integer(&x).unwrap() < 1 << 13);
        assert!(heap.random_bigint(&mut x, 0, &mut rng).is_err());
    }
}

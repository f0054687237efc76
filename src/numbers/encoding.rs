use alloc::vec::Vec;

use zeroize::Zeroizing;

use super::{check_width, fits, limbs_for, top_mask, Limbs, Number};
use crate::arithmetic::divide::div_rem_assign_digit;
use crate::array::strings::{check_base, digit_char};
use crate::digit::DIGIT_BITS;
use crate::heap::Heap;
use crate::{Array, Digit, Error, Result, DIGIT_BYTES};

const U64_LIMBS: usize = (64 + DIGIT_BITS - 1) / DIGIT_BITS;

fn low_u64(digits: &[Digit]) -> u64 {
    digits
        .iter()
        .take(U64_LIMBS)
        .enumerate()
        .fold(0, |value, (index, digit)| value | (*digit as u64) << (index * DIGIT_BITS))
}

/// Bytes needed for `width` bits.
fn bytes_for(width: usize) -> usize {
    (width + 7) / 8
}

impl Heap {
    /// Bigint holding the native integer `value`.
    ///
    /// With `signed`, `value` is read as an `i64`. A value that does not fit
    /// `width` bits is an overflow.
    pub fn integer_to_bigint(&mut self, dest: &mut Array, value: u64, width: usize, signed: bool, secret: bool) -> Result<()> {
        check_width(width)?;
        let mut extended = Zeroizing::new(alloc::vec![0; limbs_for(width).max(U64_LIMBS) + 1]);
        // sign extension without looking at the sign
        let fill = (0 as Digit).wrapping_sub(((value >> 63) as Digit) & signed as Digit);
        for (index, limb) in extended.iter_mut().enumerate() {
            *limb = if index < U64_LIMBS { (value >> (index * DIGIT_BITS)) as Digit } else { fill };
        }
        let number = Number::from_extended(&extended, width, signed, secret, false)?;
        self.store(dest, &number)
    }

    fn extended_for_u64(&self, source: &Array) -> Result<(Number, Zeroizing<Vec<Digit>>)> {
        let number = self.load(source)?;
        let extended = number.extended(number.limbs().max(U64_LIMBS) + 1);
        Ok((number, extended))
    }

    /// The value as a native integer, `i64` bits for signed bigints.
    pub fn bigint_to_integer(&self, source: &Array) -> Result<u64> {
        let (number, extended) = self.extended_for_u64(source)?;
        if !bool::from(fits(&extended, 64, number.signed)) {
            return Err(Error::Overflow);
        }
        Ok(low_u64(&extended))
    }

    /// Low 64 bits of the sign-extended value.
    pub fn bigint_to_integer_trunc(&self, source: &Array) -> Result<u64> {
        let (_, extended) = self.extended_for_u64(source)?;
        Ok(low_u64(&extended))
    }

    pub fn bigint_to_u32(&self, source: &Array) -> Result<u32> {
        let (_, extended) = self.extended_for_u64(source)?;
        if !bool::from(fits(&extended, 32, false)) {
            return Err(Error::Overflow);
        }
        Ok(low_u64(&extended) as u32)
    }

    fn decode(&mut self, dest: &mut Array, source: &Array, width: usize, signed: bool, secret: bool, big_endian: bool) -> Result<()> {
        check_width(width)?;
        self.check_array(source, 1, false)?;
        let bytes = self.bytes(source)?;
        if bytes.len() > bytes_for(width) {
            return Err(Error::OutOfRange { lower: 0, upper: bytes.len(), len: bytes_for(width) });
        }

        let limbs = limbs_for(width);
        let mut digits = Zeroizing::new(alloc::vec![0 as Digit; limbs]);
        let mut place = |index: usize, byte: u8| {
            digits[index / DIGIT_BYTES] |= (byte as Digit) << (8 * (index % DIGIT_BYTES));
        };
        if big_endian {
            bytes.iter().rev().enumerate().for_each(|(index, byte)| place(index, *byte));
        } else {
            bytes.iter().enumerate().for_each(|(index, byte)| place(index, *byte));
        }
        if digits[limbs - 1] & !top_mask(width) != 0 {
            return Err(Error::Overflow);
        }

        self.store(dest, &Number { digits, width, signed, secret })
    }

    fn encode(&mut self, dest: &mut Array, source: &Array, big_endian: bool) -> Result<()> {
        let number = self.load(source)?;
        let mut bytes = Zeroizing::new(alloc::vec![0u8; bytes_for(number.width)]);
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = (number.digits[index / DIGIT_BYTES] >> (8 * (index % DIGIT_BYTES))) as u8;
        }
        if big_endian {
            bytes.reverse();
        }
        self.replace_with_bytes(dest, &bytes)
    }

    /// Bigint of `width` bits from the little-endian byte array `source`.
    ///
    /// `source` holds the bit pattern: at most `(width + 7) / 8` bytes, and
    /// no bits set at or above `width`.
    pub fn decode_little_endian(&mut self, dest: &mut Array, source: &Array, width: usize, signed: bool, secret: bool) -> Result<()> {
        self.decode(dest, source, width, signed, secret, false)
    }

    pub fn decode_big_endian(&mut self, dest: &mut Array, source: &Array, width: usize, signed: bool, secret: bool) -> Result<()> {
        self.decode(dest, source, width, signed, secret, true)
    }

    /// The bit pattern of `source` as `(width + 7) / 8` little-endian bytes.
    pub fn encode_little_endian(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.encode(dest, source, false)
    }

    pub fn encode_big_endian(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.encode(dest, source, true)
    }

    /// Render `source` in `base`, lowercase, with a leading `-` when negative.
    ///
    /// This is output, so the value is declassified: the running time
    /// depends on the number of digits.
    pub fn bigint_to_string(&mut self, dest: &mut Array, source: &Array, base: u32) -> Result<()> {
        check_base(base)?;
        let number = self.load(source)?;
        let negative = number.is_negative();
        let mut magnitude = number.extended(number.limbs() + 1);
        Limbs::new_mut(&mut magnitude).conditional_negate(negative);

        let mut text = Vec::new();
        loop {
            let digit = div_rem_assign_digit(&mut magnitude, base as Digit);
            text.push(digit_char(digit as u8));
            if bool::from(Limbs::new(&magnitude).is_zero()) {
                break;
            }
        }
        if bool::from(negative) {
            text.push(b'-');
        }
        text.reverse();
        self.replace_with_bytes(dest, &text)
    }
}

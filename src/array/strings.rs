use crate::heap::Heap;
use crate::{Array, Error, Result};

/// Lowercase hex digit of a nibble, without a table lookup.
fn hex_digit(nibble: u8) -> u8 {
    // all ones above 9
    let letter = ((9i16 - nibble as i16) >> 8) as u8;
    nibble + b'0' + (letter & (b'a' - b'0' - 10))
}

fn hex_value(digit: u8) -> Result<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(Error::InvalidArgument("not a hex digit")),
    }
}

/// Digit characters for bases up to 36.
pub(crate) fn digit_char(value: u8) -> u8 {
    b"0123456789abcdefghijklmnopqrstuvwxyz"[value as usize]
}

pub(crate) fn check_base(base: u32) -> Result<()> {
    if (2..=36).contains(&base) {
        Ok(())
    } else {
        Err(Error::InvalidArgument("base must be between 2 and 36"))
    }
}

impl Heap {
    /// Replace `dest` with a byte array holding `bytes`.
    pub(crate) fn replace_with_bytes(&mut self, dest: &mut Array, bytes: &[u8]) -> Result<()> {
        let result = self.array_from_bytes(bytes)?;
        let mut previous = core::mem::replace(dest, result);
        self.free(&mut previous)
    }

    /// Two lowercase hex digits per byte of `source`.
    pub fn string_to_hex(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.check_array(source, 1, false)?;
        let len = source.num_elements.checked_mul(2).ok_or(Error::Overflow)?;
        let result = self.allocate(len, 1, false)?;

        let (from, to) = (self.live_range(source)?, self.live_range(&result)?);
        let bytes = self.all_bytes_mut();
        for i in 0..from.len() {
            let byte = bytes[from.start + i];
            bytes[to.start + 2 * i] = hex_digit(byte >> 4);
            bytes[to.start + 2 * i + 1] = hex_digit(byte & 0xf);
        }

        let mut previous = core::mem::replace(dest, result);
        self.free(&mut previous)
    }

    /// Inverse of [`Heap::string_to_hex`]; either case is accepted.
    pub fn hex_to_string(&mut self, dest: &mut Array, source: &Array) -> Result<()> {
        self.check_array(source, 1, false)?;
        if source.num_elements % 2 != 0 {
            return Err(Error::InvalidArgument("hex string of odd length"));
        }
        let result = self.allocate(source.num_elements / 2, 1, false)?;

        let (from, to) = (self.live_range(source)?, self.live_range(&result)?);
        let bytes = self.all_bytes_mut();
        let mut decoded = Ok(());
        for i in 0..to.len() {
            match (hex_value(bytes[from.start + 2 * i]), hex_value(bytes[from.start + 2 * i + 1])) {
                (Ok(high), Ok(low)) => bytes[to.start + i] = high << 4 | low,
                _ => {
                    decoded = Err(Error::InvalidArgument("not a hex digit"));
                    break;
                }
            }
        }

        let mut previous = match decoded {
            Ok(()) => core::mem::replace(dest, result),
            Err(error) => {
                let mut result = result;
                self.free(&mut result)?;
                return Err(error);
            }
        };
        self.free(&mut previous)
    }

    fn search_area<'a>(&'a self, haystack: &Array, needle: &Array, offset: usize) -> Result<Option<(&'a [u8], &'a [u8])>> {
        self.check_array(haystack, 1, false)?;
        self.check_array(needle, 1, false)?;
        let (haystack, needle) = (self.bytes(haystack)?, self.bytes(needle)?);
        if offset > haystack.len() {
            return Ok(None);
        }
        Ok(Some((&haystack[offset..], needle)))
    }

    /// Index of the first occurrence of `needle` starting at or after `offset`.
    pub fn string_find(&self, haystack: &Array, needle: &Array, offset: usize) -> Result<Option<usize>> {
        Ok(match self.search_area(haystack, needle, offset)? {
            None => None,
            Some((_, needle)) if needle.is_empty() => Some(offset),
            Some((area, needle)) => area.windows(needle.len()).position(|window| window == needle).map(|i| i + offset),
        })
    }

    /// Index of the last occurrence of `needle` starting at or after `offset`.
    pub fn string_rfind(&self, haystack: &Array, needle: &Array, offset: usize) -> Result<Option<usize>> {
        Ok(match self.search_area(haystack, needle, offset)? {
            None => None,
            Some((area, needle)) if needle.is_empty() => Some(offset + area.len()),
            Some((area, needle)) => area.windows(needle.len()).rposition(|window| window == needle).map(|i| i + offset),
        })
    }

    /// Render a native integer in `base`, with a leading `-` for negative signed values.
    pub fn native_int_to_string(&mut self, dest: &mut Array, value: u64, base: u32, signed: bool) -> Result<()> {
        check_base(base)?;
        let negative = signed && (value as i64) < 0;
        let mut magnitude = if negative { value.wrapping_neg() } else { value };

        let mut buffer = [0u8; 65];
        let mut start = buffer.len();
        loop {
            start -= 1;
            buffer[start] = digit_char((magnitude % base as u64) as u8);
            magnitude /= base as u64;
            if magnitude == 0 {
                break;
            }
        }
        if negative {
            start -= 1;
            buffer[start] = b'-';
        }
        self.replace_with_bytes(dest, &buffer[start..])
    }
}

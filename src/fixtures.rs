//! Values and helpers shared by the unit tests.

use hex_literal::hex;
use rand_core::{CryptoRng, RngCore};

use crate::{Array, Heap};

/// The NIST P-256 prime.
pub const P256: [u8; 32] = hex!("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");
pub const Q256: [u8; 32] = hex!("756a33dea26163dfae8303747b3db15dc071fc5a0d75de209881a570678b33bb");
pub const C256: [u8; 32] = hex!("a0aa5df2567cc062788a64714276c5373f2240589874d2143401dd9c3c2efae1");
/// `P256 + 1`, an even modulus.
pub const E256: [u8; 32] = hex!("ffffffff00000001000000000000000000000001000000000000000000000000");

/// Deterministic stand-in for a true-random source (a Weyl sequence).
#[derive(Default)]
pub struct CountingRng(u64);

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        self.0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for CountingRng {}

pub fn uint(heap: &mut Heap, value: u64, width: usize) -> Array {
    let mut x = Array::empty();
    heap.integer_to_bigint(&mut x, value, width, false, false).unwrap();
    x
}

pub fn int(heap: &mut Heap, value: i64, width: usize) -> Array {
    let mut x = Array::empty();
    heap.integer_to_bigint(&mut x, value as u64, width, true, false).unwrap();
    x
}

pub fn secret_uint(heap: &mut Heap, value: u64, width: usize) -> Array {
    let mut x = Array::empty();
    heap.integer_to_bigint(&mut x, value, width, false, true).unwrap();
    x
}

/// Unsigned bigint of `8 * bytes.len()` bits from big-endian bytes.
pub fn big(heap: &mut Heap, bytes: &[u8], secret: bool) -> Array {
    let mut source = heap.array_from_bytes(bytes).unwrap();
    let mut x = Array::empty();
    heap.decode_big_endian(&mut x, &source, 8 * bytes.len(), false, secret).unwrap();
    heap.free(&mut source).unwrap();
    x
}

pub fn big_endian(heap: &mut Heap, x: &Array) -> Vec<u8> {
    let mut out = Array::empty();
    heap.encode_big_endian(&mut out, x).unwrap();
    let bytes = heap.bytes(&out).unwrap().to_vec();
    heap.free(&mut out).unwrap();
    bytes
}

pub fn value(heap: &Heap, x: &Array) -> i64 {
    heap.bigint_to_integer(x).unwrap() as i64
}

/// One limb of a bigint. Bigints are arrays of these.
///
/// Feature `u32` forces 32-bit limbs even on 64-bit architectures,
/// feature `u64` forces 64-bit limbs even on 32-bit architectures.
/// Both limb widths share the same header layout, see [`crate::numbers`].
pub type Digit = digit::Digit;

/// Unsigned type with twice as many bits as [`Digit`].
pub(crate) type DoubleDigit = digit::DoubleDigit;
/// Signed type with twice as many bits as [`Digit`].
pub(crate) type SignedDoubleDigit = digit::SignedDoubleDigit;

/// Size of a limb as stored in an array element.
pub const DIGIT_BYTES: usize = core::mem::size_of::<Digit>();
pub(crate) const DIGIT_BITS: usize = Digit::BITS as usize;

#[cfg(not(any(feature = "u32", feature = "u64")))]
compile_error!("Either feature u32 or feature u64!");

#[cfg(all(feature = "u32", feature = "u64"))]
compile_error!("Either feature u32 or feature u64, not both!");

#[cfg(feature = "u32")]
mod digit {
    pub type Digit = u32;
    pub type DoubleDigit = u64;
    pub type SignedDoubleDigit = i64;
}

#[cfg(feature = "u64")]
mod digit {
    pub type Digit = u64;
    pub type DoubleDigit = u128;
    pub type SignedDoubleDigit = i128;
}

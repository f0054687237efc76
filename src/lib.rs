//! Memory and numeric substrate for a sandboxed language runtime.
//!
//! Two parts, the second built on the first:
//!
//! - a compacting [`Heap`] of variable-length [`Array`]s, the only dynamic
//!   memory the generated code uses (strings, vectors, nested containers);
//! - arbitrary-precision integers stored in those arrays, with a secrecy
//!   taint that forces constant-time algorithms for anything derived from
//!   a secret value.
//!
//! Machine-word arithmetic with the same semantics lives in [`smallnum`],
//! branchless booleans and selection in [`SecretBool`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate delog;
generate_macros!();

mod digit;
pub use digit::{Digit, DIGIT_BYTES};
mod error;
pub use error::{Error, Result};
mod heap;
pub use heap::{Config, Heap, Stats, Word, WORD_BYTES};
mod array;
pub use array::{Array, ComparisonType, ElementType, ARRAY_HANDLE_BYTES};
mod numbers;
pub use numbers::MAX_WIDTH;
mod arithmetic;
mod secret;
pub use secret::{select_u32, select_u64, SecretBool};
pub mod smallnum;

#[cfg(test)]
mod fixtures;

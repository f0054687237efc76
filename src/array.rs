//! Array handles and the allocation-family operations on them.
//!
//! An [`Array`] is a plain descriptor: the block it owns plus an element
//! count. It is deliberately neither `Clone` nor `Copy`; duplicating
//! storage goes through [`Heap::copy`], transferring it through
//! [`Heap::move_array`]. A handle has to be given back with
//! [`Heap::free`], the heap has no way of noticing a dropped one.

mod compare;
mod operations;
pub(crate) mod strings;

pub(crate) use compare::Ordering;

use core::convert::TryInto;

use crate::heap::{check_layout, BlockRef, Heap, WORD_BYTES};
use crate::{Error, Result};

/// Bytes a handle takes up when stored as an element of a nested array.
pub const ARRAY_HANDLE_BYTES: usize = 2 * WORD_BYTES;

/// Descriptor of a heap array. The empty handle owns nothing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Array {
    pub(crate) block: Option<BlockRef>,
    pub(crate) num_elements: usize,
}

impl Array {
    pub const fn empty() -> Self {
        Array { block: None, num_elements: 0 }
    }

    /// Number of elements (not bytes).
    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }
}

/// The six orderings understood by [`Heap::compare`] and [`Heap::compare_bigints`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonType {
    Lt,
    Le,
    Gt,
    Ge,
    Equal,
    NotEqual,
}

/// How the bytes of an element are interpreted by comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Uint,
    Int,
    Float,
    Double,
}

/// Native-endian unsigned integer of 1, 2, 4 or 8 bytes.
pub(crate) fn read_uint(bytes: &[u8]) -> u64 {
    match bytes.len() {
        1 => bytes[0] as u64,
        2 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u64,
        4 => u32::from_ne_bytes(bytes.try_into().unwrap_or([0; 4])) as u64,
        _ => u64::from_ne_bytes(bytes.try_into().unwrap_or([0; 8])),
    }
}

pub(crate) fn write_uint(bytes: &mut [u8], value: u64) {
    match bytes.len() {
        1 => bytes[0] = value as u8,
        2 => bytes.copy_from_slice(&(value as u16).to_ne_bytes()),
        4 => bytes.copy_from_slice(&(value as u32).to_ne_bytes()),
        _ => bytes.copy_from_slice(&value.to_ne_bytes()),
    }
}

fn check_scalar(element_size: usize) -> Result<()> {
    match element_size {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(Error::Mismatch("element is not a 1, 2, 4 or 8 byte integer")),
    }
}

impl Heap {
    pub fn element_size(&self, array: &Array) -> Result<Option<usize>> {
        Ok(self.locate(array)?.map(|(_, header)| header.element_size))
    }

    pub fn has_sub_arrays(&self, array: &Array) -> Result<bool> {
        Ok(self.locate(array)?.map_or(false, |(_, header)| header.has_sub_arrays))
    }

    /// Element `index` read as an unsigned integer.
    pub fn element(&self, array: &Array, index: usize) -> Result<u64> {
        let (offset, header) = self.element_at(array, index)?;
        let size = header.element_size;
        let range = Self::byte_range(offset, index * size, (index + 1) * size);
        Ok(read_uint(&self.all_bytes()[range]))
    }

    /// Store the low bytes of `value` into element `index`.
    pub fn set_element(&mut self, array: &Array, index: usize, value: u64) -> Result<()> {
        let (offset, header) = self.element_at(array, index)?;
        let size = header.element_size;
        let range = Self::byte_range(offset, index * size, (index + 1) * size);
        write_uint(&mut self.all_bytes_mut()[range], value);
        Ok(())
    }

    fn element_at(&self, array: &Array, index: usize) -> Result<(usize, crate::heap::Header)> {
        if index >= array.num_elements {
            return Err(Error::OutOfRange { lower: index, upper: index + 1, len: array.num_elements });
        }
        let (offset, header) = self.locate(array)?.ok_or(Error::StaleHandle)?;
        if header.has_sub_arrays {
            return Err(Error::Mismatch("element is an array handle"));
        }
        check_scalar(header.element_size)?;
        Ok((offset, header))
    }

    fn nested_at(&self, parent: &Array, index: usize) -> Result<usize> {
        if index >= parent.num_elements {
            return Err(Error::OutOfRange { lower: index, upper: index + 1, len: parent.num_elements });
        }
        let (offset, header) = self.locate(parent)?.ok_or(Error::StaleHandle)?;
        if !header.has_sub_arrays {
            return Err(Error::Mismatch("array has no sub-arrays"));
        }
        Ok(offset)
    }

    /// Move nested array `index` out of `parent`, leaving the empty handle behind.
    pub fn take_sub_array(&mut self, parent: &Array, index: usize) -> Result<Array> {
        let offset = self.nested_at(parent, index)?;
        let child = self.read_handle(offset, index);
        self.write_handle(offset, index, &Array::empty());
        Ok(child)
    }

    /// Move `child` into slot `index` of `parent`, freeing what was there.
    pub fn put_sub_array(&mut self, parent: &Array, index: usize, child: Array) -> Result<()> {
        let offset = self.nested_at(parent, index)?;
        let mut previous = self.read_handle(offset, index);
        self.write_handle(offset, index, &Array::empty());
        self.free(&mut previous)?;
        // freeing never moves blocks, `offset` is still good
        self.write_handle(offset, index, &child);
        Ok(())
    }

    /// Length of nested array `index` without taking it out.
    pub fn sub_array_len(&self, parent: &Array, index: usize) -> Result<usize> {
        let offset = self.nested_at(parent, index)?;
        Ok(self.read_handle(offset, index).num_elements)
    }

    /// Byte array holding a copy of `bytes`.
    pub fn array_from_bytes(&mut self, bytes: &[u8]) -> Result<Array> {
        let array = self.allocate(bytes.len(), 1, false)?;
        self.bytes_mut(&array)?.copy_from_slice(bytes);
        Ok(array)
    }

    /// Nested array of byte strings.
    pub fn array_of_strings(&mut self, strings: &[&[u8]]) -> Result<Array> {
        let mut outer = self.allocate(strings.len(), ARRAY_HANDLE_BYTES, true)?;
        for (index, string) in strings.iter().enumerate() {
            let inner = match self.array_from_bytes(string) {
                Ok(inner) => inner,
                Err(error) => {
                    self.free(&mut outer)?;
                    return Err(error);
                }
            };
            self.put_sub_array(&outer, index, inner)?;
        }
        Ok(outer)
    }

    /// Like [`Heap::array_of_strings`], rejecting anything that is not UTF-8.
    pub fn array_of_utf8_strings(&mut self, strings: &[&[u8]]) -> Result<Array> {
        if strings.iter().any(|string| core::str::from_utf8(string).is_err()) {
            return Err(Error::InvalidArgument("string is not valid UTF-8"));
        }
        self.array_of_strings(strings)
    }

    pub(crate) fn check_array(&self, array: &Array, element_size: usize, has_sub_arrays: bool) -> Result<()> {
        check_layout(element_size, has_sub_arrays)?;
        if let Some((_, header)) = self.locate(array)? {
            if header.element_size != element_size || header.has_sub_arrays != has_sub_arrays {
                return Err(Error::Mismatch("array layout differs from the one given"));
            }
        }
        Ok(())
    }
}

use crate::array::ARRAY_HANDLE_BYTES;
use crate::heap::{check_layout, Heap};
use crate::{Array, Error, Result};

impl Heap {
    /// Independently owned copy of elements `lower..upper` of `source`.
    ///
    /// Nested arrays are copied too, never shared.
    pub(crate) fn duplicate_range(&mut self, source: &Array, lower: usize, upper: usize) -> Result<Array> {
        let header = match self.locate(source)? {
            None => return Ok(Array::empty()),
            Some((_, header)) => header,
        };
        let mut copy = self.allocate(upper - lower, header.element_size, header.has_sub_arrays)?;
        if let Err(error) = self.copy_elements(&copy, 0, source, lower, upper) {
            self.free(&mut copy)?;
            return Err(error);
        }
        Ok(copy)
    }

    pub(crate) fn duplicate(&mut self, source: &Array) -> Result<Array> {
        self.duplicate_range(source, 0, source.num_elements)
    }

    /// Copy elements `lower..upper` of `source` into `dest`'s storage from element `at` on.
    ///
    /// `dest` must already have the capacity; its length is not touched.
    fn copy_elements(&mut self, dest: &Array, at: usize, source: &Array, lower: usize, upper: usize) -> Result<()> {
        if lower == upper {
            return Ok(());
        }
        let (source_offset, header) = self.locate(source)?.ok_or(Error::StaleHandle)?;
        if !header.has_sub_arrays {
            let (dest_offset, _) = self.locate(dest)?.ok_or(Error::StaleHandle)?;
            let size = header.element_size;
            let from = Self::byte_range(source_offset, lower * size, upper * size);
            let to = Self::byte_range(dest_offset, at * size, at * size).start;
            self.all_bytes_mut().copy_within(from, to);
            return Ok(());
        }
        for (written, index) in (lower..upper).enumerate() {
            let copy = match self.duplicate_child(source, index) {
                Ok(copy) => copy,
                Err(error) => {
                    self.release_children(dest, at, at + written)?;
                    return Err(error);
                }
            };
            let (dest_offset, _) = self.locate(dest)?.ok_or(Error::StaleHandle)?;
            self.write_handle(dest_offset, at + written, &copy);
        }
        Ok(())
    }

    fn duplicate_child(&mut self, parent: &Array, index: usize) -> Result<Array> {
        // every copy allocates, which may compact
        let (offset, _) = self.locate(parent)?.ok_or(Error::StaleHandle)?;
        let child = self.read_handle(offset, index);
        self.duplicate(&child)
    }

    /// Free the nested arrays in slots `from..to` of `parent`, leaving empty handles.
    fn release_children(&mut self, parent: &Array, from: usize, to: usize) -> Result<()> {
        for index in from..to {
            let (offset, _) = self.locate(parent)?.ok_or(Error::StaleHandle)?;
            let mut child = self.read_handle(offset, index);
            self.write_handle(offset, index, &Array::empty());
            self.free(&mut child)?;
        }
        Ok(())
    }

    /// Replace `dest` with a deep copy of `source`.
    ///
    /// On failure `dest` is left as it was.
    pub fn copy(&mut self, dest: &mut Array, source: &Array, element_size: usize, has_sub_arrays: bool) -> Result<()> {
        self.check_array(source, element_size, has_sub_arrays)?;
        let copy = self.duplicate(source)?;
        let mut previous = core::mem::replace(dest, copy);
        self.free(&mut previous)
    }

    /// Transfer `source`'s storage to `dest`. `source` becomes empty.
    pub fn move_array(&mut self, dest: &mut Array, source: &mut Array) -> Result<()> {
        self.free(dest)?;
        *dest = core::mem::take(source);
        Ok(())
    }

    /// Replace `dest` with a copy of the elements `lower..upper` of `source`.
    pub fn slice(
        &mut self,
        dest: &mut Array,
        source: &Array,
        lower: usize,
        upper: usize,
        element_size: usize,
        has_sub_arrays: bool,
    ) -> Result<()> {
        if lower > upper || upper > source.num_elements {
            return Err(Error::OutOfRange { lower, upper, len: source.num_elements });
        }
        self.check_array(source, element_size, has_sub_arrays)?;
        let copy = self.duplicate_range(source, lower, upper)?;
        let mut previous = core::mem::replace(dest, copy);
        self.free(&mut previous)
    }

    /// Append copies of all of `source`'s elements to `dest`.
    pub fn concat(&mut self, dest: &mut Array, source: &Array, element_size: usize, has_sub_arrays: bool) -> Result<()> {
        self.check_array(dest, element_size, has_sub_arrays)?;
        self.check_array(source, element_size, has_sub_arrays)?;
        if source.is_empty() {
            return Ok(());
        }
        let len = dest.num_elements;
        let new_len = len.checked_add(source.num_elements).ok_or(Error::Overflow)?;
        self.ensure_capacity(dest, new_len, element_size, has_sub_arrays, true)?;
        self.copy_elements(dest, len, source, 0, source.num_elements)?;
        dest.num_elements = new_len;
        Ok(())
    }

    /// Append one element given as its `element_size` raw bytes.
    pub fn append(&mut self, array: &mut Array, element: &[u8], element_size: usize) -> Result<()> {
        check_layout(element_size, false)?;
        if element.len() != element_size {
            return Err(Error::Mismatch("element bytes differ from element size"));
        }
        self.check_array(array, element_size, false)?;
        let len = array.num_elements;
        self.ensure_capacity(array, len + 1, element_size, false, true)?;
        let (offset, _) = self.locate(array)?.ok_or(Error::StaleHandle)?;
        let range = Self::byte_range(offset, len * element_size, (len + 1) * element_size);
        self.all_bytes_mut()[range].copy_from_slice(element);
        array.num_elements = len + 1;
        Ok(())
    }

    /// Append `child` to a nested array, taking ownership of it.
    pub fn append_array(&mut self, parent: &mut Array, child: Array) -> Result<()> {
        let len = parent.num_elements;
        let grown = self
            .check_array(parent, ARRAY_HANDLE_BYTES, true)
            .and_then(|_| self.ensure_capacity(parent, len + 1, ARRAY_HANDLE_BYTES, true, true));
        if let Err(error) = grown {
            let mut child = child;
            self.free(&mut child)?;
            return Err(error);
        }
        let (offset, _) = self.locate(parent)?.ok_or(Error::StaleHandle)?;
        self.write_handle(offset, len, &child);
        parent.num_elements = len + 1;
        Ok(())
    }

    /// Reverse the element order in place. Nested arrays keep their contents.
    pub fn reverse(&mut self, array: &Array, element_size: usize, has_sub_arrays: bool) -> Result<()> {
        self.check_array(array, element_size, has_sub_arrays)?;
        let range = self.live_range(array)?;
        let bytes = &mut self.all_bytes_mut()[range];
        let len = array.num_elements;
        for i in 0..len / 2 {
            let j = len - 1 - i;
            for k in 0..element_size {
                bytes.swap(i * element_size + k, j * element_size + k);
            }
        }
        Ok(())
    }

    /// `dest = a ^ b` byte-wise; the shorter operand is padded with zeros.
    pub fn xor_strings(&mut self, dest: &mut Array, a: &Array, b: &Array) -> Result<()> {
        self.check_array(a, 1, false)?;
        self.check_array(b, 1, false)?;
        let len = a.num_elements.max(b.num_elements);
        let result = self.allocate(len, 1, false)?;

        let (a_range, b_range, result_range) = (self.live_range(a)?, self.live_range(b)?, self.live_range(&result)?);
        let bytes = self.all_bytes_mut();
        for i in 0..len {
            let x = if i < a_range.len() { bytes[a_range.start + i] } else { 0 };
            let y = if i < b_range.len() { bytes[b_range.start + i] } else { 0 };
            bytes[result_range.start + i] = x ^ y;
        }

        let mut previous = core::mem::replace(dest, result);
        self.free(&mut previous)
    }
}

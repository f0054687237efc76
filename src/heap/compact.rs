use alloc::vec::Vec;

use super::{BlockRef, Header, Heap};
use crate::array::read_uint;
use crate::{Array, Error, Result};

impl Heap {
    /// Slide every live block down over the holes left by frees.
    ///
    /// Blocks move in ascending address order, so a block only ever moves
    /// into space that is already vacated. Only slot offsets change;
    /// handles, lengths and contents are untouched. Holding `&mut self`
    /// keeps the mutator out for the whole pass.
    pub fn compact(&mut self) {
        let mut read = 0;
        let mut write = 0;
        let mut moved = 0;
        while read < self.top {
            let header = Header::read(&self.words, read);
            let total = header.total_words();
            assert!(read + total <= self.top, "heap corruption: block at {} overruns the heap", read);
            if let Some(index) = header.back_pointer {
                if read != write {
                    self.words.copy_within(read..read + total, write);
                    self.slots[index as usize].offset = write + Header::WORDS;
                    moved += total;
                }
                write += total;
            }
            read += total;
        }
        self.words[write..self.top].fill(0);
        debug!(
            "compacted {} words to {}, moved {}",
            self.top, write, moved
        );
        self.top = write;
        self.free_words = 0;
        self.stats.compactions += 1;
        self.stats.moved_words += moved;
    }

    /// Check every header against the slot table.
    pub fn verify_heap(&self) -> Result<()> {
        let mut at = 0;
        let mut live_blocks = 0;
        let mut hole_words = 0;
        while at < self.top {
            let header = Header::read(&self.words, at);
            let total = header.total_words();
            if at + total > self.top {
                return Err(Error::HeapCorruption("block overruns the used heap"));
            }
            match header.back_pointer {
                None => hole_words += total,
                Some(index) => {
                    match self.slots.get(index as usize) {
                        Some(slot) if slot.live && slot.offset == at + Header::WORDS => {}
                        _ => return Err(Error::HeapCorruption("back-pointer and slot disagree")),
                    }
                    live_blocks += 1;
                }
            }
            at += total;
        }
        if live_blocks != self.slots.iter().filter(|slot| slot.live).count() {
            return Err(Error::HeapCorruption("live slot without a block"));
        }
        if hole_words != self.free_words {
            return Err(Error::HeapCorruption("free word count is off"));
        }
        Ok(())
    }

    /// Trace `roots` through their nested arrays, failing if any block is
    /// reachable twice. Returns the number of blocks reached.
    pub fn verify_roots(&self, roots: &[&Array]) -> Result<usize> {
        let mut marks: Vec<u64> = alloc::vec![0; (self.slots.len() + 63) / 64];
        let mut pending: Vec<BlockRef> = roots.iter().filter_map(|root| root.block).collect();
        let mut reached = 0;

        while let Some(block) = pending.pop() {
            let (offset, header) = self.resolve(block)?;
            let (word, bit) = (block.index as usize / 64, block.index as usize % 64);
            if marks[word] & (1 << bit) != 0 {
                return Err(Error::HeapCorruption("block reachable from two handles"));
            }
            marks[word] |= 1 << bit;
            reached += 1;

            if header.has_sub_arrays {
                for index in 0..header.allocated_words / 2 {
                    if let Some(child) = self.read_handle(offset, index).block {
                        pending.push(child);
                    }
                }
            }
        }
        Ok(reached)
    }

    /// Call `callback` on every object reference stored `depth` levels below `array`.
    ///
    /// At depth zero the elements are references of `ref_width` bytes
    /// (1, 2, 4 or 8); above that, every level must be a nested array.
    pub fn foreach_array_object<F>(&self, array: &Array, ref_width: usize, depth: u32, mut callback: F) -> Result<()>
    where
        F: FnMut(u64),
    {
        if ![1, 2, 4, 8].contains(&ref_width) {
            return Err(Error::InvalidArgument("reference width must be 1, 2, 4 or 8 bytes"));
        }
        self.visit_objects(array, ref_width, depth, &mut callback)
    }

    fn visit_objects(&self, array: &Array, ref_width: usize, depth: u32, callback: &mut dyn FnMut(u64)) -> Result<()> {
        let (offset, header) = match self.locate(array)? {
            None => return Ok(()),
            Some(found) => found,
        };
        if depth == 0 {
            if header.has_sub_arrays || header.element_size != ref_width {
                return Err(Error::Mismatch("leaf elements are not references of this width"));
            }
            let range = Self::byte_range(offset, 0, array.num_elements * ref_width);
            for reference in self.all_bytes()[range].chunks_exact(ref_width) {
                callback(read_uint(reference));
            }
        } else {
            if !header.has_sub_arrays {
                return Err(Error::Mismatch("array is not nested that deeply"));
            }
            for index in 0..array.num_elements {
                let child = self.read_handle(offset, index);
                self.visit_objects(&child, ref_width, depth - 1, callback)?;
            }
        }
        Ok(())
    }
}

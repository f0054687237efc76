//! Arena heap backing every [`Array`].
//!
//! All array data lives in one growable buffer of [`Word`]s. Each block is
//! preceded by a [`Header`] and owned by exactly one handle. A handle names
//! a slot of the slot table instead of an address: compaction slides blocks
//! and rewrites slot offsets, and handles never need fixing up.
//!
//! Blocks are bump allocated at the top of the used region. Freed blocks
//! are wiped and left in place as holes until the next compaction, which
//! runs when an allocation does not fit. The buffer doubles (up to
//! [`Config::max_words`]) when compaction is not enough.

mod compact;
mod header;

pub(crate) use header::Header;

use alloc::vec::Vec;
use core::cell::Cell;
use core::convert::TryFrom;
use core::ops::Range;

use zeroize::Zeroize;

use crate::array::ARRAY_HANDLE_BYTES;
use crate::{Array, Error, Result};

/// Unit of heap storage.
pub type Word = u64;
pub const WORD_BYTES: usize = core::mem::size_of::<Word>();

/// Sizing of a [`Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Words reserved up front.
    pub initial_words: usize,
    /// Allocations that would grow the heap past this fail with [`Error::OutOfMemory`].
    pub max_words: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            initial_words: 1 << 12,
            max_words: 1 << 27,
        }
    }
}

/// Counters describing the heap's history and current state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub allocations: usize,
    pub frees: usize,
    pub compactions: usize,
    /// Words slid by all compactions so far.
    pub moved_words: usize,
    /// Words in live blocks, headers included.
    pub live_words: usize,
    pub heap_words: usize,
    /// Elements examined by array comparisons.
    pub compare_steps: u64,
}

/// Slot index plus the generation the slot had when the block was handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockRef {
    pub index: u32,
    pub generation: u32,
}

impl BlockRef {
    /// Encoding used when a handle is stored inside another array. Zero is "no block".
    pub fn to_word(self) -> Word {
        (self.generation as Word) << 32 | (self.index as Word + 1)
    }

    pub fn from_word(word: Word) -> Option<Self> {
        match word as u32 {
            0 => None,
            index => Some(BlockRef {
                index: index - 1,
                generation: (word >> 32) as u32,
            }),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    /// Offset of the block's first data word.
    offset: usize,
    generation: u32,
    live: bool,
}

/// The array heap. One per mutator; see the crate docs for the threading model.
pub struct Heap {
    words: Vec<Word>,
    /// End of the used region.
    top: usize,
    max_words: usize,
    /// Words held by holes below `top`, headers included.
    free_words: usize,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    counter: Word,
    stats: Stats,
    compare_steps: Cell<u64>,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new(Config::default())
    }
}

/// Words needed to hold `num_elements` elements of `element_size` bytes.
pub(crate) fn words_for(num_elements: usize, element_size: usize) -> Result<usize> {
    let bytes = num_elements.checked_mul(element_size).ok_or(Error::Overflow)?;
    Ok((bytes + WORD_BYTES - 1) / WORD_BYTES)
}

pub(crate) fn check_layout(element_size: usize, has_sub_arrays: bool) -> Result<()> {
    if element_size == 0 {
        return Err(Error::InvalidArgument("element size must be positive"));
    }
    if has_sub_arrays && element_size != ARRAY_HANDLE_BYTES {
        return Err(Error::Mismatch("elements of nested arrays are array handles"));
    }
    Ok(())
}

fn check_header(header: &Header, element_size: usize, has_sub_arrays: bool) -> Result<()> {
    if header.element_size != element_size {
        return Err(Error::Mismatch("element size differs from allocation"));
    }
    if header.has_sub_arrays != has_sub_arrays {
        return Err(Error::Mismatch("sub-array flag differs from allocation"));
    }
    Ok(())
}

fn words_as_bytes(words: &[Word]) -> &[u8] {
    // u8 has no alignment requirement and no invalid bit patterns
    unsafe { core::slice::from_raw_parts(words.as_ptr() as *const u8, words.len() * WORD_BYTES) }
}

fn words_as_bytes_mut(words: &mut [Word]) -> &mut [u8] {
    unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut u8, words.len() * WORD_BYTES) }
}

impl Heap {
    pub fn new(config: Config) -> Self {
        let initial = config.initial_words.min(config.max_words);
        debug!("heap of {} words, limit {}", initial, config.max_words);
        Heap {
            words: alloc::vec![0; initial],
            top: 0,
            max_words: config.max_words,
            free_words: 0,
            slots: Vec::new(),
            free_slots: Vec::new(),
            counter: 0,
            stats: Stats::default(),
            compare_steps: Cell::new(0),
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            live_words: self.top - self.free_words,
            heap_words: self.words.len(),
            compare_steps: self.compare_steps.get(),
            ..self.stats
        }
    }

    pub(crate) fn count_compare_step(&self) {
        self.compare_steps.set(self.compare_steps.get() + 1);
    }

    // ------------------------------------------------------------------
    // Slot table
    // ------------------------------------------------------------------

    fn claim_slot(&mut self) -> Result<BlockRef> {
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.live = true;
            return Ok(BlockRef { index, generation: slot.generation });
        }
        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|index| *index < u32::MAX)
            .ok_or(Error::OutOfMemory { requested_words: 0 })?;
        self.slots.push(Slot { offset: 0, generation: 0, live: true });
        Ok(BlockRef { index, generation: 0 })
    }

    fn release_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(index);
    }

    /// Data offset and header of a live block.
    pub(crate) fn resolve(&self, block: BlockRef) -> Result<(usize, Header)> {
        let slot = match self.slots.get(block.index as usize) {
            Some(slot) if slot.live && slot.generation == block.generation => *slot,
            _ => {
                error!("stale handle: slot {} generation {}", block.index, block.generation);
                return Err(Error::StaleHandle);
            }
        };
        if slot.offset < Header::WORDS || slot.offset > self.top {
            return Err(Error::HeapCorruption("slot offset outside the used heap"));
        }
        let header = Header::read(&self.words, slot.offset - Header::WORDS);
        if header.back_pointer != Some(block.index) {
            error!("block at {} is owned by {:?}, not slot {}", slot.offset, header.back_pointer, block.index);
            return Err(Error::HeapCorruption("back-pointer does not name the owning handle"));
        }
        Ok((slot.offset, header))
    }

    /// Data offset and header of a non-empty handle, `None` for the empty one.
    pub(crate) fn locate(&self, array: &Array) -> Result<Option<(usize, Header)>> {
        let block = match array.block {
            None => return Ok(None),
            Some(block) => block,
        };
        let (offset, header) = self.resolve(block)?;
        let fits = array
            .num_elements
            .checked_mul(header.element_size)
            .map_or(false, |bytes| bytes <= header.allocated_words * WORD_BYTES);
        if !fits {
            return Err(Error::HeapCorruption("handle length exceeds its block"));
        }
        Ok(Some((offset, header)))
    }

    // ------------------------------------------------------------------
    // Raw views
    // ------------------------------------------------------------------

    pub(crate) fn all_bytes(&self) -> &[u8] {
        words_as_bytes(&self.words)
    }

    pub(crate) fn all_bytes_mut(&mut self) -> &mut [u8] {
        words_as_bytes_mut(&mut self.words)
    }

    /// Byte range `from..to` of the block whose data starts at word `offset`.
    pub(crate) fn byte_range(offset: usize, from: usize, to: usize) -> Range<usize> {
        offset * WORD_BYTES + from..offset * WORD_BYTES + to
    }

    /// Where the live bytes of `array` sit in [`Heap::all_bytes`].
    pub(crate) fn live_range(&self, array: &Array) -> Result<Range<usize>> {
        Ok(match self.locate(array)? {
            None => 0..0,
            Some((offset, header)) => Self::byte_range(offset, 0, array.num_elements * header.element_size),
        })
    }

    /// Nested handle number `index` of the block at `offset`.
    ///
    /// The result aliases the parent's element; callers either overwrite
    /// that element or treat the result as borrowed.
    pub(crate) fn read_handle(&self, offset: usize, index: usize) -> Array {
        let at = offset + 2 * index;
        Array {
            block: BlockRef::from_word(self.words[at]),
            num_elements: self.words[at + 1] as usize,
        }
    }

    pub(crate) fn write_handle(&mut self, offset: usize, index: usize, array: &Array) {
        let at = offset + 2 * index;
        self.words[at] = array.block.map_or(0, BlockRef::to_word);
        self.words[at + 1] = array.num_elements as Word;
    }

    /// Live byte range of a flat array. Nested arrays hold handles,
    /// which are only reachable through the sub-array operations.
    fn flat_range(&self, array: &Array) -> Result<Range<usize>> {
        match self.locate(array)? {
            None => Ok(0..0),
            Some((_, header)) if header.has_sub_arrays => Err(Error::Mismatch("elements are array handles")),
            Some((offset, header)) => Ok(Self::byte_range(offset, 0, array.num_elements * header.element_size)),
        }
    }

    /// Live bytes of `array`: `len * element_size` of them.
    pub fn bytes(&self, array: &Array) -> Result<&[u8]> {
        let range = self.flat_range(array)?;
        Ok(&self.all_bytes()[range])
    }

    pub fn bytes_mut(&mut self, array: &Array) -> Result<&mut [u8]> {
        let range = self.flat_range(array)?;
        Ok(&mut self.all_bytes_mut()[range])
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    fn grow(&mut self, min_words: usize) -> Result<()> {
        if min_words > self.max_words {
            warn!("heap limit of {} words reached, {} requested", self.max_words, min_words);
            return Err(Error::OutOfMemory { requested_words: min_words });
        }
        let len = self.words.len().saturating_mul(2).max(min_words).min(self.max_words);
        self.words.resize(len, 0);
        info!("heap grown to {} words", len);
        Ok(())
    }

    /// Reserves header and data words at the top, compacting or growing
    /// first if needed. Returns the data offset; the words are zeroed.
    fn reserve(&mut self, data_words: usize) -> Result<usize> {
        let total = data_words
            .checked_add(Header::WORDS)
            .ok_or(Error::OutOfMemory { requested_words: data_words })?;
        if self.words.len() - self.top < total {
            if self.free_words > 0 {
                self.compact();
            }
            if self.words.len() - self.top < total {
                let end = self
                    .top
                    .checked_add(total)
                    .ok_or(Error::OutOfMemory { requested_words: total })?;
                self.grow(end)?;
            }
        }
        let at = self.top;
        self.top += total;
        self.words[at..self.top].fill(0);
        Ok(at + Header::WORDS)
    }

    pub(crate) fn allocate_block(
        &mut self,
        data_words: usize,
        element_size: usize,
        has_sub_arrays: bool,
    ) -> Result<BlockRef> {
        let block = self.claim_slot()?;
        let offset = match self.reserve(data_words) {
            Ok(offset) => offset,
            Err(error) => {
                self.release_slot(block.index);
                return Err(error);
            }
        };
        self.slots[block.index as usize].offset = offset;
        self.counter += 1;
        Header {
            allocated_words: data_words,
            has_sub_arrays,
            back_pointer: Some(block.index),
            element_size,
            counter: self.counter,
        }
        .write(&mut self.words, offset - Header::WORDS);
        self.stats.allocations += 1;
        Ok(block)
    }

    /// A zeroed array of `num_elements` elements.
    ///
    /// Zero elements yield the empty handle without touching the heap.
    pub fn allocate(&mut self, num_elements: usize, element_size: usize, has_sub_arrays: bool) -> Result<Array> {
        check_layout(element_size, has_sub_arrays)?;
        if num_elements == 0 {
            return Ok(Array::empty());
        }
        let data_words = words_for(num_elements, element_size)?;
        let block = self.allocate_block(data_words, element_size, has_sub_arrays)?;
        Ok(Array { block: Some(block), num_elements })
    }

    /// Grow or shrink `array` to `num_elements`, keeping the common prefix.
    ///
    /// New elements are zero (empty handles for nested arrays). Dropped
    /// nested arrays are freed. The handle may be repointed to a new block.
    pub fn resize(
        &mut self,
        array: &mut Array,
        num_elements: usize,
        element_size: usize,
        has_sub_arrays: bool,
    ) -> Result<()> {
        check_layout(element_size, has_sub_arrays)?;
        let (offset, header) = match self.locate(array)? {
            None => {
                *array = self.allocate(num_elements, element_size, has_sub_arrays)?;
                return Ok(());
            }
            Some(found) => found,
        };
        check_header(&header, element_size, has_sub_arrays)?;
        if num_elements == 0 {
            return self.free(array);
        }
        if num_elements < array.num_elements {
            self.truncate_elements(offset, &header, num_elements, array.num_elements)?;
        } else {
            self.ensure_capacity(array, num_elements, element_size, has_sub_arrays, false)?;
        }
        array.num_elements = num_elements;
        Ok(())
    }

    /// Frees nested arrays among elements `len..old_len` and wipes their bytes.
    pub(crate) fn truncate_elements(
        &mut self,
        offset: usize,
        header: &Header,
        len: usize,
        old_len: usize,
    ) -> Result<()> {
        if header.has_sub_arrays {
            for index in len..old_len {
                if let Some(child) = self.read_handle(offset, index).block {
                    self.free_block(child)?;
                }
            }
        }
        let range = Self::byte_range(offset, len * header.element_size, old_len * header.element_size);
        self.all_bytes_mut()[range].zeroize();
        Ok(())
    }

    /// Make room for at least `num_elements` elements without changing the length.
    ///
    /// With `geometric`, a block that has to grow at least doubles, which
    /// keeps repeated appends linear overall.
    pub(crate) fn ensure_capacity(
        &mut self,
        array: &mut Array,
        num_elements: usize,
        element_size: usize,
        has_sub_arrays: bool,
        geometric: bool,
    ) -> Result<()> {
        let needed = words_for(num_elements, element_size)?;
        let block = match array.block {
            None => {
                check_layout(element_size, has_sub_arrays)?;
                array.block = Some(self.allocate_block(needed, element_size, has_sub_arrays)?);
                array.num_elements = 0;
                return Ok(());
            }
            Some(block) => block,
        };
        let (offset, header) = self.resolve(block)?;
        check_header(&header, element_size, has_sub_arrays)?;
        if needed <= header.allocated_words {
            return Ok(());
        }
        let capacity = if geometric {
            needed.max(header.allocated_words.saturating_mul(2))
        } else {
            needed
        };
        self.grow_block(block, offset, header, capacity)
    }

    fn grow_block(&mut self, block: BlockRef, offset: usize, mut header: Header, capacity: usize) -> Result<()> {
        let end = offset + header.allocated_words;
        if end == self.top {
            let new_end = offset.saturating_add(capacity);
            if new_end <= self.words.len() || self.grow(new_end).is_ok() {
                self.words[end..new_end].fill(0);
                self.top = new_end;
                header.allocated_words = capacity;
                header.write(&mut self.words, offset - Header::WORDS);
                return Ok(());
            }
        }

        let new_offset = self.reserve(capacity)?;
        // reserving may have compacted
        let (old_offset, old_header) = self.resolve(block)?;
        self.words
            .copy_within(old_offset..old_offset + old_header.allocated_words, new_offset);
        Header { allocated_words: capacity, ..old_header }.write(&mut self.words, new_offset - Header::WORDS);
        self.slots[block.index as usize].offset = new_offset;
        self.release_block(old_offset, old_header);
        trace!("block of slot {} moved from {} to {}", block.index, old_offset, new_offset);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Release
    // ------------------------------------------------------------------

    /// Release `array`'s block (and, recursively, its nested arrays).
    ///
    /// The handle becomes empty. Freeing the empty handle is a no-op.
    pub fn free(&mut self, array: &mut Array) -> Result<()> {
        if let Some(block) = array.block {
            self.free_block(block)?;
        }
        *array = Array::empty();
        Ok(())
    }

    pub(crate) fn free_block(&mut self, block: BlockRef) -> Result<()> {
        let (offset, header) = self.resolve(block)?;
        if header.has_sub_arrays {
            for index in 0..header.allocated_words / 2 {
                if let Some(child) = self.read_handle(offset, index).block {
                    self.free_block(child)?;
                }
            }
        }
        self.release_block(offset, header);
        self.release_slot(block.index);
        self.stats.frees += 1;
        Ok(())
    }

    /// Wipe a block and turn it into a hole. Its slot is left alone.
    fn release_block(&mut self, offset: usize, mut header: Header) {
        let at = offset - Header::WORDS;
        let end = offset + header.allocated_words;
        self.words[offset..end].zeroize();
        if end == self.top {
            self.words[at..offset].zeroize();
            self.top = at;
        } else {
            header.back_pointer = None;
            header.has_sub_arrays = false;
            header.write(&mut self.words, at);
            self.free_words += header.total_words();
        }
    }
}

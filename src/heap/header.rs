use super::Word;

/// Metadata stored in the words right before a block's data.
///
/// The back-pointer names the slot that owns the block rather than an
/// address, so it survives compaction untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub allocated_words: usize,
    pub has_sub_arrays: bool,
    /// `None` once the block has been freed.
    pub back_pointer: Option<u32>,
    pub element_size: usize,
    /// Allocation order. Only stored in debug builds.
    pub counter: Word,
}

impl Header {
    pub const WORDS: usize = 3 + cfg!(debug_assertions) as usize;

    pub fn read(words: &[Word], at: usize) -> Self {
        let size = words[at];
        Header {
            allocated_words: (size >> 1) as usize,
            has_sub_arrays: size & 1 != 0,
            back_pointer: match words[at + 1] {
                0 => None,
                slot => Some((slot - 1) as u32),
            },
            element_size: words[at + 2] as usize,
            counter: if cfg!(debug_assertions) { words[at + 3] } else { 0 },
        }
    }

    pub fn write(&self, words: &mut [Word], at: usize) {
        words[at] = (self.allocated_words as Word) << 1 | self.has_sub_arrays as Word;
        words[at + 1] = self.back_pointer.map_or(0, |slot| slot as Word + 1);
        words[at + 2] = self.element_size as Word;
        if cfg!(debug_assertions) {
            words[at + 3] = self.counter;
        }
    }

    /// Header plus data.
    pub fn total_words(&self) -> usize {
        Self::WORDS + self.allocated_words
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn packs_flag_next_to_size() {
        let mut words = [0; 8];
        let header = Header {
            allocated_words: 5,
            has_sub_arrays: true,
            back_pointer: Some(0),
            element_size: 16,
            counter: 7,
        };
        header.write(&mut words, 1);

        assert_eq!(words[1], 11);
        // slot 0 must not read back as "free"
        assert_eq!(words[2], 1);
        assert_eq!(Header::read(&words, 1).back_pointer, Some(0));
        assert_eq!(Header::read(&words, 1).total_words(), Header::WORDS + 5);
    }
}

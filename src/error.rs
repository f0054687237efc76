use core::fmt;

/// Everything that can go wrong in the heap or the arithmetic engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Checked arithmetic result does not fit the declared width.
    Overflow,
    /// The heap cannot satisfy a request, even after compaction.
    OutOfMemory { requested_words: usize },
    /// Index or range outside `[0, len]`, or `lower > upper`.
    OutOfRange { lower: usize, upper: usize, len: usize },
    /// Operands disagree on element size, width or signedness.
    Mismatch(&'static str),
    /// The handle refers to a freed block, or to a block of another heap.
    StaleHandle,
    /// Header and slot table disagree.
    HeapCorruption(&'static str),
    DivideByZero,
    /// Modular division by a value sharing a factor with the modulus.
    NotInvertible,
    InvalidArgument(&'static str),
}

/// [`Error`] or success.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub fn is_overflow(&self) -> bool {
        matches!(self, Error::Overflow)
    }

    /// Structural violations: continuing after one of these risks further damage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::HeapCorruption(_) | Error::OutOfMemory { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Overflow => write!(f, "integer overflow"),
            Error::OutOfMemory { requested_words } => {
                write!(f, "out of memory: cannot reserve {} words", requested_words)
            }
            Error::OutOfRange { lower, upper, len } => {
                write!(f, "range {}..{} out of bounds for length {}", lower, upper, len)
            }
            Error::Mismatch(what) => write!(f, "mismatched operands: {}", what),
            Error::StaleHandle => write!(f, "use of a freed or foreign array handle"),
            Error::HeapCorruption(what) => write!(f, "heap corruption: {}", what),
            Error::DivideByZero => write!(f, "division by zero"),
            Error::NotInvertible => write!(f, "value has no inverse for this modulus"),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
        }
    }
}

use std::{error, fmt};

/// An error with allocating or deallocating memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator has no memory left that satisfies the request.
    OutOfMemory,
    /// The request is larger than anything the allocator can ever provide.
    RequestTooLarge,
    /// The requested capacity does not fit the size type, or its byte size exceeds `isize::MAX`.
    CapacityOverflow,
    /// The requested alignment is stricter than the allocator supports.
    AlignmentTooLarge,
    PointerOutsideRange,
    PointerNotAligned,
    BlockAlreadyFree,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::OutOfMemory => "out of memory",
            Self::RequestTooLarge => "request is larger than the allocator can provide",
            Self::CapacityOverflow => "capacity overflow",
            Self::AlignmentTooLarge => "alignment is larger than the allocator supports",
            Self::PointerOutsideRange => "pointer is outside the allocator's memory region",
            Self::PointerNotAligned => "pointer does not point to the start of a block",
            Self::BlockAlreadyFree => "block is already free",
        };
        f.write_str(msg)
    }
}

impl error::Error for AllocError {}

/// An error returned by [`GrowVec`](crate::GrowVec) operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The allocator hook could not provide the storage. The vector is unchanged.
    Alloc(AllocError),
    /// A checked access named a slot at or past the length.
    OutOfBounds { index: usize, len: usize },
    /// `resize` asked for fewer slots than there are elements.
    ShrinkBelowLength { requested: usize, len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc(err) => write!(f, "allocation failed: {err}"),
            Self::OutOfBounds { index, len } => {
                write!(f, "index {index} is out of bounds for length {len}")
            }
            Self::ShrinkBelowLength { requested, len } => {
                write!(f, "cannot resize to {requested} slots while holding {len} elements")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Alloc(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}

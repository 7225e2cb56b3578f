use std::io;

use thiserror::Error;

/// Error type shared by every phase of the sort pipeline.
#[derive(Debug, Error)]
pub enum SortError {
    /// Scratch buffer allocation failed
    #[error("allocation failure")]
    Alloc,

    /// The entropy source refused to produce bytes
    #[error("entropy source failure")]
    Rng,

    /// A transport send, recv or wait returned non-OK
    #[error("transport failure")]
    Transport,

    /// Every rank reported an empty active slice during pivot selection
    #[error("all ranks empty")]
    AllRanksEmpty,

    /// A peer delivered a message whose size does not fit the protocol
    #[error("message size mismatch: got {got} bytes, expected {expected}")]
    MessageSize { got: usize, expected: usize },

    /// Invalid argument provided
    #[error("invalid argument")]
    InvalidArgument,

    /// Requested sort variant is not implemented in this crate
    #[error("not supported")]
    NotSupported,
}

impl From<io::Error> for SortError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::InvalidInput => SortError::InvalidArgument,
            io::ErrorKind::OutOfMemory => SortError::Alloc,
            _ => SortError::Transport,
        }
    }
}

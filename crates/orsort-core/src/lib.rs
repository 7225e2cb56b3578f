pub mod elem;
pub mod error;
pub mod oswap;
pub mod pool;
pub mod rng;
pub mod timer;
pub mod transport;
pub mod tunables;

// Re-export primary types for convenience
pub use elem::{Elem, PAYLOAD_SIZE, elems_as_bytes, elems_from_bytes};
pub use error::SortError;
pub use oswap::{oswap_bytes, oswap_elems};
pub use pool::{ErrorCell, ThreadPool};
pub use rng::{SortRng, fill_entropy};
pub use timer::{PhaseTimers, now};
pub use transport::{
    ANY_SOURCE, ANY_TAG, Completion, QUICKSELECT_TAG, RecvStatus, Request, SAMPLE_PARTITION_TAG,
    Transport, WaitOutcome,
};

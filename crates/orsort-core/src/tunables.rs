//! Compile-time tunables for the sort pipeline.

/// Bytes processed per step of the constant-time swap loop.
pub const SWAP_CHUNK_SIZE: usize = 4096;

/// Number of 32-bit coins drawn per batch while marking cells for the
/// shuffle.
pub const MARK_COINS: usize = 2048;

/// Fan-in of the external merge sort: chunk size of the first pass and
/// number of runs merged per group in later passes.
pub const MERGE_FANOUT: usize = 1024;

/// Elements per in-flight sample-partition chunk, bounding both outgoing
/// and incoming transfer sizes per peer.
pub const SAMPLE_PARTITION_BUF: usize = 512;

//! Contract over the point-to-point channel between ranks.
//!
//! The channel itself (encryption, authentication, the wire) lives
//! outside this workspace; the algorithms consume only this facade.
//! Delivery is reliable and FIFO per `(sender, receiver, tag)`.

use crate::error::SortError;

/// Wildcard source rank for `recv`/`irecv`.
pub const ANY_SOURCE: usize = usize::MAX;

/// Wildcard message tag for `recv`/`irecv`.
pub const ANY_TAG: u16 = u16::MAX;

/// Tag reserved for pivot-selection coordination.
pub const QUICKSELECT_TAG: u16 = 0x7151;

/// Tag reserved for sample-partition element streams.
pub const SAMPLE_PARTITION_TAG: u16 = 0x7150;

/// Completion status of a receive.
#[derive(Debug, Clone, Copy)]
pub struct RecvStatus {
    /// Rank the message came from.
    pub source: usize,
    /// Tag the message was sent with.
    pub tag: u16,
    /// Bytes actually received. May be less than the posted capacity.
    pub count: usize,
}

/// Opaque handle for an in-flight asynchronous operation.
///
/// The transport owns the staging buffer behind a request until the
/// matching wait consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request(pub u64);

/// What a completed request produced.
#[derive(Debug)]
pub enum Completion {
    /// An isend's staging buffer was handed to the channel.
    Send,
    /// An irecv matched a message; `data` holds the received bytes.
    Recv { status: RecvStatus, data: Vec<u8> },
}

/// Result of `wait_any`: which slot completed and what it produced.
#[derive(Debug)]
pub struct WaitOutcome {
    pub index: usize,
    pub completion: Completion,
}

/// Point-to-point transport between the N ranks of one job.
pub trait Transport: Send + Sync {
    /// This process's rank in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of cooperating ranks.
    fn size(&self) -> usize;

    /// Blocking send of `buf` to `dest` under `tag`.
    fn send(&self, buf: &[u8], dest: usize, tag: u16) -> Result<(), SortError>;

    /// Blocking receive into `buf` from `source` (or `ANY_SOURCE`) under
    /// `tag` (or `ANY_TAG`). A message larger than `buf` is a
    /// `MessageSize` error.
    fn recv(&self, buf: &mut [u8], source: usize, tag: u16) -> Result<RecvStatus, SortError>;

    /// Non-blocking send. The transport copies `buf` into its own
    /// staging; the caller's borrow ends at return.
    fn isend(&self, buf: &[u8], dest: usize, tag: u16) -> Result<Request, SortError>;

    /// Non-blocking receive of up to `capacity` bytes.
    fn irecv(&self, capacity: usize, source: usize, tag: u16) -> Result<Request, SortError>;

    /// Block until exactly one of the pending requests completes.
    /// The completed slot is consumed (set to `None`); the others stay
    /// pending. Calling with no pending request is an `InvalidArgument`
    /// error.
    fn wait_any(&self, requests: &mut [Option<Request>]) -> Result<WaitOutcome, SortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tags_distinct() {
        assert_ne!(QUICKSELECT_TAG, SAMPLE_PARTITION_TAG);
        assert_ne!(QUICKSELECT_TAG, ANY_TAG);
        assert_ne!(SAMPLE_PARTITION_TAG, ANY_TAG);
    }
}

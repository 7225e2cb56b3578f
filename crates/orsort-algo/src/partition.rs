//! Sample partition: stream every element to the rank owning its
//! splitter interval.
//!
//! The local array arrives coarsely partitioned by the quickselect
//! pass, so the slice destined for peer `p` is contiguous. Outgoing
//! traffic runs one bounded chunk per peer at a time; incoming traffic
//! runs one bounded wildcard receive, re-posted until the destination
//! buffer is full. The wait-any loop provides the backpressure.

use orsort_core::elem::Elem;
use orsort_core::elems_as_bytes;
use orsort_core::elems_from_bytes;
use orsort_core::error::SortError;
use orsort_core::transport::{
    ANY_SOURCE, Completion, Request, SAMPLE_PARTITION_TAG, Transport,
};
use orsort_core::tunables::SAMPLE_PARTITION_BUF;
use tracing::debug;

fn post_chunk(
    transport: &dyn Transport,
    src: &[Elem],
    cursor: &mut usize,
    end: usize,
    peer: usize,
) -> Result<Option<Request>, SortError> {
    if *cursor >= end {
        return Ok(None);
    }
    let hi = (*cursor + SAMPLE_PARTITION_BUF).min(end);
    let req = transport.isend(elems_as_bytes(&src[*cursor..hi]), peer, SAMPLE_PARTITION_TAG)?;
    *cursor = hi;
    Ok(Some(req))
}

/// Redistribute `src` according to the per-rank cut points, collecting
/// this rank's partition (exactly `dst_len` elements) into `dst`.
///
/// `cuts` holds one local index per splitter (`size - 1` of them,
/// non-decreasing); slice `p` of the local array, bounded by cut `p-1`
/// and cut `p` (with 0 and `src.len()` at the ends), belongs to rank
/// `p`. Received elements land in arrival order after this rank's own
/// slice.
pub fn sample_partition(
    transport: &dyn Transport,
    src: &[Elem],
    cuts: &[usize],
    dst: &mut Vec<Elem>,
    dst_len: usize,
) -> Result<(), SortError> {
    let me = transport.rank();
    let size = transport.size();
    if cuts.len() + 1 != size {
        return Err(SortError::InvalidArgument);
    }

    let mut bounds = Vec::with_capacity(size + 1);
    bounds.push(0usize);
    bounds.extend_from_slice(cuts);
    bounds.push(src.len());
    if bounds.windows(2).any(|w| w[0] > w[1]) {
        return Err(SortError::InvalidArgument);
    }

    dst.clear();
    dst.try_reserve(dst_len).map_err(|_| SortError::Alloc)?;
    dst.extend_from_slice(&src[bounds[me]..bounds[me + 1]]);

    if size == 1 {
        assert_eq!(dst.len(), dst_len);
        return Ok(());
    }

    let mut received = dst.len();
    let mut cursors: Vec<usize> = bounds[..size].to_vec();

    // Slot p < size carries the in-flight send to peer p; the last slot
    // carries the single in-flight receive.
    let mut requests: Vec<Option<Request>> = vec![None; size + 1];
    for p in 0..size {
        if p != me {
            requests[p] = post_chunk(transport, src, &mut cursors[p], bounds[p + 1], p)?;
        }
    }
    if received < dst_len {
        requests[size] = Some(transport.irecv(
            SAMPLE_PARTITION_BUF * Elem::SIZE,
            ANY_SOURCE,
            SAMPLE_PARTITION_TAG,
        )?);
    }

    while requests.iter().any(Option::is_some) {
        let outcome = transport.wait_any(&mut requests)?;
        match outcome.completion {
            Completion::Send => {
                let p = outcome.index;
                requests[p] = post_chunk(transport, src, &mut cursors[p], bounds[p + 1], p)?;
            }
            Completion::Recv { status, data } => {
                let elems = elems_from_bytes(&data).ok_or(SortError::MessageSize {
                    got: status.count,
                    expected: status.count / Elem::SIZE * Elem::SIZE,
                })?;
                received += elems.len();
                assert!(received <= dst_len, "peer overfilled the partition");
                dst.extend_from_slice(&elems);
                if received < dst_len {
                    requests[size] = Some(transport.irecv(
                        SAMPLE_PARTITION_BUF * Elem::SIZE,
                        ANY_SOURCE,
                        SAMPLE_PARTITION_TAG,
                    )?);
                }
            }
        }
    }

    assert_eq!(received, dst_len, "partition short of elements");
    debug!(rank = me, received, "sample partition complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orsort_transport_local::LocalCluster;
    use std::thread;

    fn elems(keys: std::ops::Range<u64>) -> Vec<Elem> {
        keys.map(Elem::with_key).collect()
    }

    fn sorted_keys(elems: &[Elem]) -> Vec<u64> {
        let mut keys: Vec<u64> = elems.iter().map(|e| e.key).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_single_rank_straight_copy() {
        let endpoints = LocalCluster::endpoints(1);
        let src = elems(0..8);
        let mut dst = Vec::new();
        sample_partition(&endpoints[0], &src, &[], &mut dst, 8).unwrap();
        assert_eq!(sorted_keys(&dst), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_two_ranks_exchange_buckets() {
        let mut handles = Vec::new();
        for (rank, ep) in LocalCluster::endpoints(2).into_iter().enumerate() {
            handles.push(thread::spawn(move || {
                // Rank 0 holds {10..14} for itself and {20..24} for rank
                // 1; rank 1 holds {14..18} for rank 0 and {24..28} for
                // itself.
                let src = if rank == 0 {
                    let mut v = elems(10..14);
                    v.extend(elems(20..24));
                    v
                } else {
                    let mut v = elems(14..18);
                    v.extend(elems(24..28));
                    v
                };
                let mut dst = Vec::new();
                sample_partition(&ep, &src, &[4], &mut dst, 8).unwrap();
                sorted_keys(&dst)
            }));
        }
        let results: Vec<Vec<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0], (10..18).collect::<Vec<_>>());
        assert_eq!(results[1], (20..28).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunked_transfer_exceeds_buf() {
        // One peer slice needs three chunks at SAMPLE_PARTITION_BUF
        // elements per send.
        let big = SAMPLE_PARTITION_BUF as u64 * 2 + 100;
        let mut handles = Vec::new();
        for (rank, ep) in LocalCluster::endpoints(2).into_iter().enumerate() {
            handles.push(thread::spawn(move || {
                let (src, cuts, dst_len) = if rank == 0 {
                    // Everything here belongs to rank 1.
                    (elems(1000..1000 + big), vec![0usize], 0usize)
                } else {
                    (Vec::new(), vec![0usize], big as usize)
                };
                let mut dst = Vec::new();
                sample_partition(&ep, &src, &cuts, &mut dst, dst_len).unwrap();
                sorted_keys(&dst)
            }));
        }
        let results: Vec<Vec<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results[0].is_empty());
        assert_eq!(results[1], (1000..1000 + big).collect::<Vec<_>>());
    }

    #[test]
    fn test_bad_cut_count_rejected() {
        let endpoints = LocalCluster::endpoints(1);
        let src = elems(0..4);
        let mut dst = Vec::new();
        assert!(matches!(
            sample_partition(&endpoints[0], &src, &[1, 2], &mut dst, 4),
            Err(SortError::InvalidArgument)
        ));
    }

    #[test]
    fn test_unordered_cuts_rejected() {
        // Validation fails before any traffic, so every rank errors out
        // locally.
        let mut handles = Vec::new();
        for ep in LocalCluster::endpoints(3) {
            handles.push(thread::spawn(move || {
                let src = elems(0..4);
                let mut dst = Vec::new();
                sample_partition(&ep, &src, &[3, 1], &mut dst, 4)
            }));
        }
        for handle in handles {
            assert!(matches!(
                handle.join().unwrap(),
                Err(SortError::InvalidArgument)
            ));
        }
    }
}

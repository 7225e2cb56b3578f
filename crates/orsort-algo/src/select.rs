//! Distributed quickselect for global partition pivots.
//!
//! Selects the elements at the requested global order statistics over
//! the union of all ranks' arrays, returning their `(key, orp_id)`
//! pairs and, per rank, the local index splitting the array at each
//! selected element. As a side effect the local array ends up coarsely
//! partitioned around every selected pivot, which is exactly the layout
//! the sample partition consumes.

use orsort_core::elem::Elem;
use orsort_core::error::SortError;
use orsort_core::transport::{QUICKSELECT_TAG, Transport};
use tracing::trace;

fn recv_exact(
    transport: &dyn Transport,
    buf: &mut [u8],
    source: usize,
) -> Result<(), SortError> {
    let expected = buf.len();
    let status = transport.recv(buf, source, QUICKSELECT_TAG)?;
    if status.count != expected {
        return Err(SortError::MessageSize {
            got: status.count,
            expected,
        });
    }
    Ok(())
}

fn recv_flag(transport: &dyn Transport, source: usize) -> Result<bool, SortError> {
    let mut buf = [0u8; 1];
    recv_exact(transport, &mut buf, source)?;
    Ok(buf[0] != 0)
}

fn recv_u64(transport: &dyn Transport, source: usize) -> Result<u64, SortError> {
    let mut buf = [0u8; 8];
    recv_exact(transport, &mut buf, source)?;
    Ok(u64::from_le_bytes(buf))
}

fn recv_elem(transport: &dyn Transport, source: usize) -> Result<Elem, SortError> {
    let mut buf = [0u8; Elem::SIZE];
    recv_exact(transport, &mut buf, source)?;
    Ok(Elem::from_bytes(&buf))
}

/// Two-pointer partition of `data[lo..hi)` around `pivot`.
///
/// Returns the boundary `i` with `data[lo..i) < pivot` and
/// `data[i..hi) >= pivot` under the `(key, orp_id)` order.
fn hoare_partition(data: &mut [Elem], lo: usize, hi: usize, pivot: &Elem) -> usize {
    let mut i = lo;
    let mut j = hi;
    loop {
        while i < j && data[i] < *pivot {
            i += 1;
        }
        while i < j && data[j - 1] >= *pivot {
            j -= 1;
        }
        if i >= j {
            break;
        }
        data.swap(i, j - 1);
        i += 1;
        j -= 1;
    }
    i
}

#[allow(clippy::too_many_arguments)]
fn select_rec(
    transport: &dyn Transport,
    data: &mut [Elem],
    left: usize,
    right: usize,
    targets: &[u64],
    base: u64,
    out_pairs: &mut [(u64, u64)],
    out_idxs: &mut [usize],
) -> Result<(), SortError> {
    if targets.is_empty() {
        return Ok(());
    }
    let me = transport.rank();
    let size = transport.size();

    // Master election: every rank broadcasts its ready flag; the lowest
    // ready rank leads this round.
    let ready = left < right;
    for p in 0..size {
        if p != me {
            transport.send(&[ready as u8], p, QUICKSELECT_TAG)?;
        }
    }
    let mut master = None;
    for p in 0..size {
        let flag = if p == me { ready } else { recv_flag(transport, p)? };
        if flag && master.is_none() {
            master = Some(p);
        }
    }
    let Some(master) = master else {
        return Err(SortError::AllRanksEmpty);
    };
    let is_master = master == me;

    // Pivot broadcast. The master's pivot slot is excluded from its own
    // partition range.
    let (pivot, lo) = if is_master {
        let pivot = data[left];
        let bytes = pivot.to_bytes();
        for p in 0..size {
            if p != me {
                transport.send(&bytes, p, QUICKSELECT_TAG)?;
            }
        }
        (pivot, left + 1)
    } else {
        (recv_elem(transport, master)?, left)
    };

    let store = hoare_partition(data, lo, right, &pivot);
    let (partition_left, partition_right) = if is_master {
        // Park the pivot between the two sides; it stays put for the
        // rest of the recursion.
        data.swap(left, store - 1);
        (store, store - 1)
    } else {
        (store, store)
    };

    // The pivot's global order statistic over the active slices.
    let local_below = (partition_right - left) as u64;
    let cur_pivot = if is_master {
        let mut total = local_below;
        for p in 0..size {
            if p != me {
                total += recv_u64(transport, p)?;
            }
        }
        let cur = base + total;
        let bytes = cur.to_le_bytes();
        for p in 0..size {
            if p != me {
                transport.send(&bytes, p, QUICKSELECT_TAG)?;
            }
        }
        cur
    } else {
        transport.send(&local_below.to_le_bytes(), master, QUICKSELECT_TAG)?;
        recv_u64(transport, master)?
    };
    trace!(master, cur_pivot, key = pivot.key, "quickselect round");

    let k = targets.partition_point(|&t| t < cur_pivot);
    let matched = k < targets.len() && targets[k] == cur_pivot;
    if matched {
        out_pairs[k] = (pivot.key, pivot.orp_id);
        out_idxs[k] = partition_right;
    }

    select_rec(
        transport,
        data,
        left,
        partition_right,
        &targets[..k],
        base,
        &mut out_pairs[..k],
        &mut out_idxs[..k],
    )?;
    let skip = k + matched as usize;
    select_rec(
        transport,
        data,
        partition_left,
        right,
        &targets[skip..],
        cur_pivot + 1,
        &mut out_pairs[skip..],
        &mut out_idxs[skip..],
    )
}

/// Select the elements at global order statistics `targets` (0-based,
/// strictly increasing) over the union of every rank's `data`.
///
/// Returns the selected `(key, orp_id)` pairs and, for this rank, the
/// local index at which each selected element splits the array. Every
/// rank must call this with the same `targets`.
pub fn distributed_quickselect(
    transport: &dyn Transport,
    data: &mut [Elem],
    targets: &[u64],
) -> Result<(Vec<(u64, u64)>, Vec<usize>), SortError> {
    if targets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SortError::InvalidArgument);
    }
    let mut pairs = vec![(0u64, 0u64); targets.len()];
    let mut idxs = vec![0usize; targets.len()];
    let len = data.len();
    select_rec(transport, data, 0, len, targets, 0, &mut pairs, &mut idxs)?;
    Ok((pairs, idxs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orsort_transport_local::LocalCluster;
    use std::thread;

    fn run_ranks<R: Send + 'static>(
        n: usize,
        f: impl Fn(usize, &dyn Transport) -> R + Send + Sync + Clone + 'static,
    ) -> Vec<R> {
        let endpoints = LocalCluster::endpoints(n);
        let mut handles = Vec::new();
        for (rank, ep) in endpoints.into_iter().enumerate() {
            let f = f.clone();
            handles.push(thread::spawn(move || f(rank, &ep)));
        }
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    fn elems(keys: &[u64]) -> Vec<Elem> {
        keys.iter().map(|&k| Elem::with_key(k)).collect()
    }

    #[test]
    fn test_partition_boundary() {
        let mut data = elems(&[5, 1, 9, 3, 7, 2]);
        let pivot = Elem::with_key(5);
        let store = hoare_partition(&mut data, 0, 6, &pivot);
        assert_eq!(store, 3);
        assert!(data[..store].iter().all(|e| *e < pivot));
        assert!(data[store..].iter().all(|e| *e >= pivot));
    }

    #[test]
    fn test_single_rank_selects_targets() {
        let results = run_ranks(1, |_, t| {
            let mut data = elems(&[7, 3, 5, 1, 6, 2, 4, 0]);
            distributed_quickselect(t, &mut data, &[2, 5]).unwrap()
        });
        let (pairs, idxs) = &results[0];
        assert_eq!(pairs.iter().map(|p| p.0).collect::<Vec<_>>(), vec![2, 5]);
        // With identity keys, rank == key, so the cut index equals the
        // target.
        assert_eq!(idxs, &vec![2, 5]);
    }

    #[test]
    fn test_four_ranks_splitter_precision() {
        // {0..15} scattered over four ranks; targets 4, 8, 12.
        let inputs: Vec<Vec<u64>> = vec![
            vec![12, 0, 9, 5],
            vec![3, 15, 6, 10],
            vec![1, 13, 8, 4],
            vec![7, 2, 11, 14],
        ];
        let results = run_ranks(4, move |rank, t| {
            let mut data = elems(&inputs[rank]);
            distributed_quickselect(t, &mut data, &[4, 8, 12]).unwrap()
        });
        for (pairs, _) in &results {
            assert_eq!(pairs.iter().map(|p| p.0).collect::<Vec<_>>(), vec![4, 8, 12]);
        }
        // Each target equals the number of elements below its splitter,
        // summed over the per-rank cut indexes.
        for (k, &target) in [4u64, 8, 12].iter().enumerate() {
            let below: usize = results.iter().map(|(_, idxs)| idxs[k]).sum();
            assert_eq!(below as u64, target);
        }
    }

    #[test]
    fn test_empty_everywhere_is_protocol_error() {
        let results = run_ranks(2, |_, t| {
            let mut data: Vec<Elem> = Vec::new();
            distributed_quickselect(t, &mut data, &[1])
        });
        for result in results {
            assert!(matches!(result, Err(SortError::AllRanksEmpty)));
        }
    }

    #[test]
    fn test_unsorted_targets_rejected() {
        let results = run_ranks(1, |_, t| {
            let mut data = elems(&[1, 0]);
            distributed_quickselect(t, &mut data, &[3, 3])
        });
        assert!(matches!(results[0], Err(SortError::InvalidArgument)));
    }

    #[test]
    fn test_uneven_active_slices() {
        // Rank 1 holds nothing; selection still works off rank 0's data.
        let results = run_ranks(2, |rank, t| {
            let mut data = if rank == 0 {
                elems(&[4, 2, 8, 6])
            } else {
                Vec::new()
            };
            distributed_quickselect(t, &mut data, &[1, 3]).unwrap()
        });
        for (pairs, _) in &results {
            assert_eq!(pairs.iter().map(|p| p.0).collect::<Vec<_>>(), vec![4, 8]);
        }
        assert_eq!(results[0].1, vec![1, 3]);
        assert_eq!(results[1].1, vec![0, 0]);
    }
}

//! Local external merge sort of the received partition.
//!
//! The array is already shuffled when this runs, so the comparison
//! pattern reveals nothing about the input keys. First pass
//! sorts fanout-sized chunks in place; each later pass B-way-merges up
//! to `fanout` consecutive runs per group into the opposite buffer.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use orsort_core::elem::Elem;
use orsort_core::pool::ThreadPool;

use crate::shared::{SharedElems, SharedElemsRef};

/// Merge the runs of `src` (each `run_length` long, last one ragged)
/// into `dst` with a min-heap of run heads.
fn merge_group(src: &[Elem], dst: &mut [Elem], run_length: usize) {
    debug_assert_eq!(src.len(), dst.len());
    let num_runs = src.len().div_ceil(run_length);
    let mut cursors: Vec<usize> = (0..num_runs).map(|r| r * run_length).collect();

    let mut heap: BinaryHeap<Reverse<((u64, u64), usize)>> = BinaryHeap::with_capacity(num_runs);
    for (r, &cursor) in cursors.iter().enumerate() {
        heap.push(Reverse((src[cursor].sort_pair(), r)));
    }

    let mut out = 0;
    while let Some(Reverse((_, r))) = heap.pop() {
        dst[out] = src[cursors[r]];
        out += 1;
        cursors[r] += 1;
        let run_end = ((r + 1) * run_length).min(src.len());
        if cursors[r] < run_end {
            heap.push(Reverse((src[cursors[r]].sort_pair(), r)));
        }
    }
    debug_assert_eq!(out, dst.len());
}

/// Sort `data` in place by `(key, orp_id)`, using `scratch` as the
/// second buffer of the merge passes.
///
/// `fanout` is the chunk size of the first pass and the number of runs
/// merged per group afterwards; tests pass a small value to exercise
/// several passes, production callers pass `MERGE_FANOUT`.
pub fn merge_sort(pool: &ThreadPool, data: &mut [Elem], scratch: &mut [Elem], fanout: usize) {
    let n = data.len();
    assert_eq!(scratch.len(), n);
    assert!(fanout >= 2);
    if n <= 1 {
        return;
    }

    // First pass: independent chunks, sorted in place.
    {
        let view = SharedElems::new(data);
        pool.run_iter(n.div_ceil(fanout), &|c| {
            let lo = c * fanout;
            let hi = (lo + fanout).min(n);
            // SAFETY: chunk ranges are disjoint across iterations.
            let chunk = unsafe { view.range(lo, hi) };
            chunk.sort_unstable();
        });
    }

    // Merge passes, swapping buffer roles each time.
    let mut run_length = fanout;
    let mut live_in_data = true;
    while run_length < n {
        let group_span = run_length.saturating_mul(fanout);
        {
            let (src, dst): (&[Elem], &mut [Elem]) = if live_in_data {
                (&*data, &mut *scratch)
            } else {
                (&*scratch, &mut *data)
            };
            let src_view = SharedElemsRef::new(src);
            let dst_view = SharedElems::new(dst);
            pool.run_iter(n.div_ceil(group_span), &|g| {
                let lo = g * group_span;
                let hi = (lo + group_span).min(n);
                // SAFETY: group ranges are disjoint across iterations,
                // and src is not written during this pass.
                let dst_group = unsafe { dst_view.range(lo, hi) };
                merge_group(src_view.range(lo, hi), dst_group, run_length);
            });
        }
        live_in_data = !live_in_data;
        run_length = group_span;
    }

    if !live_in_data {
        data.copy_from_slice(scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orsort_core::tunables::MERGE_FANOUT;

    fn scrambled(n: u64) -> Vec<Elem> {
        // Deterministic scatter over [0, n).
        (0..n)
            .map(|i| Elem::with_key(i.wrapping_mul(2654435761) % n))
            .collect()
    }

    fn assert_sorted(elems: &[Elem]) {
        assert!(elems.windows(2).all(|w| w[0] <= w[1]));
    }

    fn sort_with(pool: &ThreadPool, mut data: Vec<Elem>, fanout: usize) -> Vec<Elem> {
        let mut scratch = vec![Elem::with_key(0); data.len()];
        merge_sort(pool, &mut data, &mut scratch, fanout);
        data
    }

    #[test]
    fn test_merge_group_interleaves_runs() {
        let src: Vec<Elem> = [1u64, 4, 7, 2, 5, 8, 0, 3]
            .iter()
            .map(|&k| Elem::with_key(k))
            .collect();
        let mut dst = vec![Elem::with_key(0); src.len()];
        merge_group(&src, &mut dst, 3);
        let keys: Vec<u64> = dst.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4, 5, 7, 8]);
    }

    #[test]
    fn test_sizes_around_pass_boundaries() {
        let pool = ThreadPool::new(3);
        // fanout 4: one in-place pass at n<=4, one merge pass up to 16,
        // two passes up to 64, three passes beyond.
        for &n in &[0u64, 1, 3, 4, 5, 16, 17, 20, 64, 65, 300] {
            let out = sort_with(&pool, scrambled(n), 4);
            assert_sorted(&out);
            let mut keys: Vec<u64> = out.iter().map(|e| e.key).collect();
            keys.sort_unstable();
            let mut expect: Vec<u64> = scrambled(n).iter().map(|e| e.key).collect();
            expect.sort_unstable();
            assert_eq!(keys, expect);
        }
    }

    #[test]
    fn test_payload_travels_with_key() {
        let pool = ThreadPool::new(2);
        let mut data: Vec<Elem> = (0..50u64)
            .rev()
            .map(|k| {
                let mut e = Elem::with_key(k);
                e.payload[0] = k as u8;
                e
            })
            .collect();
        let mut scratch = vec![Elem::with_key(0); data.len()];
        merge_sort(&pool, &mut data, &mut scratch, 4);
        for (i, e) in data.iter().enumerate() {
            assert_eq!(e.key, i as u64);
            assert_eq!(e.payload[0], i as u8);
        }
    }

    #[test]
    fn test_equal_keys_ordered_by_orp_id() {
        let pool = ThreadPool::new(2);
        let mut data: Vec<Elem> = (0..40u64)
            .map(|i| {
                let mut e = Elem::with_key(i % 4);
                e.orp_id = 39 - i;
                e
            })
            .collect();
        let mut scratch = vec![Elem::with_key(0); data.len()];
        merge_sort(&pool, &mut data, &mut scratch, 4);
        assert!(data.windows(2).all(|w| w[0].sort_pair() <= w[1].sort_pair()));
    }

    #[test]
    fn test_default_fanout_single_pass() {
        let pool = ThreadPool::new(2);
        let out = sort_with(&pool, scrambled(700), MERGE_FANOUT);
        assert_sorted(&out);
    }
}

//! Oblivious random shuffle (ORShuffle).
//!
//! Uniformly permutes a power-of-two array with data-independent memory
//! accesses: mark exactly half the cells at random, compact the marked
//! half to the front, recurse on both halves. Control flow depends only
//! on the length and on fresh coins, never on element values.

use orsort_core::elem::Elem;
use orsort_core::error::SortError;
use orsort_core::oswap::oswap_elems;
use orsort_core::pool::{ErrorCell, ThreadPool};
use orsort_core::rng::{SortRng, fill_entropy};
use orsort_core::tunables::MARK_COINS;
use tracing::debug;

use crate::compact::or_compact;
use crate::shared::{SharedElems, shard_bounds};

/// Mark exactly `len/2` cells uniformly at random, maintaining the
/// running prefix sums.
///
/// Reservoir sampling without replacement: cell `i` is marked with
/// probability `still_needed / still_left`, drawn by comparing a 32-bit
/// coin against the scaled threshold. Coins are consumed in batches of
/// up to `MARK_COINS`.
pub(crate) fn mark_half(
    rng: &mut SortRng,
    marked: &mut [bool],
    prefix: &mut [u64],
) -> Result<(), SortError> {
    let n = marked.len();
    debug_assert_eq!(prefix.len(), n);

    let mut to_mark = (n / 2) as u64;
    let mut left = n as u64;
    let mut sum = 0u64;
    let mut coins = [0u32; MARK_COINS];

    let mut i = 0;
    while i < n {
        let batch = (n - i).min(MARK_COINS);
        rng.coins(&mut coins[..batch])?;
        for &coin in &coins[..batch] {
            // (coin * left) >> 32 is uniform over [0, left); comparing
            // against to_mark draws with probability to_mark / left.
            let mark = (coin as u128 * left as u128) >> 32 < to_mark as u128;
            marked[i] = mark;
            sum += mark as u64;
            prefix[i] = sum;
            to_mark -= mark as u64;
            left -= 1;
            i += 1;
        }
    }
    debug_assert_eq!(to_mark, 0);
    Ok(())
}

fn shuffle_rec(
    rng: &mut SortRng,
    elems: &mut [Elem],
    marked: &mut [bool],
    prefix: &mut [u64],
) -> Result<(), SortError> {
    let n = elems.len();
    if n < 2 {
        return Ok(());
    }
    if n == 2 {
        let bit = rng.bit()?;
        let (a, b) = elems.split_at_mut(1);
        oswap_elems(&mut a[0], &mut b[0], bit);
        return Ok(());
    }

    mark_half(rng, &mut marked[..n], &mut prefix[..n])?;
    or_compact(elems, &marked[..n], &prefix[..n], 0);

    let half = n / 2;
    let (left, right) = elems.split_at_mut(half);
    shuffle_rec(rng, left, marked, prefix)?;
    shuffle_rec(rng, right, marked, prefix)?;
    Ok(())
}

/// Shuffle `elems` into a uniformly random permutation.
///
/// The length must be a power of two. On error the array contents are
/// undefined and the caller must discard them.
pub fn or_shuffle(rng: &mut SortRng, elems: &mut [Elem]) -> Result<(), SortError> {
    let n = elems.len();
    if n < 2 {
        return Ok(());
    }
    if !n.is_power_of_two() {
        return Err(SortError::InvalidArgument);
    }
    debug!(length = n, "oblivious shuffle");

    let mut marked = Vec::new();
    marked
        .try_reserve_exact(n)
        .map_err(|_| SortError::Alloc)?;
    marked.resize(n, false);
    let mut prefix = Vec::new();
    prefix
        .try_reserve_exact(n)
        .map_err(|_| SortError::Alloc)?;
    prefix.resize(n, 0u64);

    shuffle_rec(rng, elems, &mut marked, &mut prefix)
}

/// Elements whose ORP IDs are refreshed per entropy fill.
const ORP_BATCH: usize = 256;

/// Fill every element's ORP ID with fresh random bytes.
///
/// Runs as one iteration kernel with `num_threads` shards over the full
/// range; each shard draws from the OS entropy source in batches.
pub fn assign_orp_ids(pool: &ThreadPool, elems: &mut [Elem]) -> Result<(), SortError> {
    let shards = pool.num_threads();
    let len = elems.len();
    let shared = SharedElems::new(elems);
    let errors = ErrorCell::new();

    pool.run_iter(shards, &|i| {
        let (lo, hi) = shard_bounds(len, shards, i);
        // SAFETY: shard ranges are disjoint across iterations.
        let slice = unsafe { shared.range(lo, hi) };
        let mut buf = [0u8; 8 * ORP_BATCH];
        for chunk in slice.chunks_mut(ORP_BATCH) {
            if let Err(err) = fill_entropy(&mut buf[..8 * chunk.len()]) {
                errors.record(err);
                return;
            }
            for (e, bytes) in chunk.iter_mut().zip(buf.chunks_exact(8)) {
                e.orp_id = u64::from_le_bytes(bytes.try_into().unwrap());
            }
        }
    });

    errors.check()
}

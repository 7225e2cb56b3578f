//! The shuffle-sort pipeline and the sort-variant dispatch.

use orsort_core::elem::Elem;
use orsort_core::error::SortError;
use orsort_core::pool::ThreadPool;
use orsort_core::rng::SortRng;
use orsort_core::timer::{
    PHASE_MERGE, PHASE_PARTITION, PHASE_SELECT, PHASE_SHUFFLE, PhaseTimers, now,
};
use orsort_core::transport::Transport;
use orsort_core::tunables::MERGE_FANOUT;
use tracing::debug;

use crate::merge::merge_sort;
use crate::partition::sample_partition;
use crate::select::distributed_quickselect;
use crate::shuffle::{assign_orp_ids, or_shuffle};

/// Per-job state: the channel to the other ranks, the worker pool and
/// the job RNG. Built once per job, torn down with it.
pub struct SortContext<'a> {
    pub transport: &'a dyn Transport,
    pub pool: &'a ThreadPool,
    pub rng: SortRng,
}

impl<'a> SortContext<'a> {
    pub fn new(transport: &'a dyn Transport, pool: &'a ThreadPool) -> Result<Self, SortError> {
        Ok(Self {
            transport,
            pool,
            rng: SortRng::from_entropy()?,
        })
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn world_size(&self) -> usize {
        self.transport.size()
    }
}

/// The sort pipelines sharing the pool and the transport. Only the
/// shuffle pipeline lives in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortVariant {
    OrShuffle,
    Bitonic,
    Bucket,
    Opaque,
}

/// Dispatch a sort job to the selected pipeline.
pub fn sort(
    ctx: &mut SortContext<'_>,
    variant: SortVariant,
    data: &mut Vec<Elem>,
    total_length: u64,
) -> Result<PhaseTimers, SortError> {
    match variant {
        SortVariant::OrShuffle => shuffle_sort(ctx, data, total_length),
        SortVariant::Bitonic | SortVariant::Bucket | SortVariant::Opaque => {
            Err(SortError::NotSupported)
        }
    }
}

/// Number of elements rank `rank` holds out of `total` over `size`
/// ranks.
pub fn local_share(total: u64, rank: usize, size: usize) -> usize {
    let r = rank as u64;
    let n = size as u64;
    ((total * (r + 1)).div_ceil(n) - (total * r).div_ceil(n)) as usize
}

/// Sort the dataset sharded as `data` across all ranks.
///
/// On success `data` holds this rank's slice of the globally sorted
/// output: the concatenation over ranks is non-decreasing in
/// `(key, orp_id)`. On error the contents of `data` are undefined.
///
/// Preconditions: `total_length` and the local length are powers of two,
/// the rank count divides `total_length`, and every rank calls with the
/// same `total_length`.
pub fn shuffle_sort(
    ctx: &mut SortContext<'_>,
    data: &mut Vec<Elem>,
    total_length: u64,
) -> Result<PhaseTimers, SortError> {
    let size = ctx.world_size();
    let rank = ctx.rank();

    if total_length == 0 || !total_length.is_power_of_two() {
        return Err(SortError::InvalidArgument);
    }
    if total_length % size as u64 != 0 {
        return Err(SortError::InvalidArgument);
    }
    if data.len() != local_share(total_length, rank, size) {
        return Err(SortError::InvalidArgument);
    }
    debug!(rank, size, local = data.len(), "shuffle sort start");

    let mut timers = PhaseTimers::default();

    // Oblivious phase: shuffle, then tag every element with a random
    // tiebreak. After this point the access pattern no longer depends
    // on the input keys.
    let start = now();
    or_shuffle(&mut ctx.rng, data)?;
    assign_orp_ids(ctx.pool, data)?;
    timers.elapsed[PHASE_SHUFFLE] = now() - start;

    // Global splitters at the bucket boundaries.
    let start = now();
    let targets: Vec<u64> = (1..size as u64)
        .map(|k| total_length * k / size as u64)
        .collect();
    let (_, cuts) = distributed_quickselect(ctx.transport, data, &targets)?;
    timers.elapsed[PHASE_SELECT] = now() - start;

    // Stream every element to the rank owning its bucket.
    let start = now();
    let dst_len = local_share(total_length, rank, size);
    let mut dst = Vec::new();
    sample_partition(ctx.transport, data, &cuts, &mut dst, dst_len)?;
    timers.elapsed[PHASE_PARTITION] = now() - start;

    // Sort the received partition locally.
    let start = now();
    let mut scratch = Vec::new();
    scratch
        .try_reserve_exact(dst.len())
        .map_err(|_| SortError::Alloc)?;
    scratch.resize(dst.len(), Elem::with_key(0));
    merge_sort(ctx.pool, &mut dst, &mut scratch, MERGE_FANOUT);
    timers.elapsed[PHASE_MERGE] = now() - start;

    *data = dst;
    debug!(rank, total = timers.total(), "shuffle sort done");
    Ok(timers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orsort_transport_local::LocalCluster;

    #[test]
    fn test_local_share_even_split() {
        for rank in 0..4 {
            assert_eq!(local_share(16, rank, 4), 4);
        }
        assert_eq!(local_share(8, 0, 1), 8);
    }

    #[test]
    fn test_variant_dispatch_rejects_unimplemented() {
        let endpoints = LocalCluster::endpoints(1);
        let pool = ThreadPool::new(1);
        let mut ctx = SortContext {
            transport: &endpoints[0],
            pool: &pool,
            rng: SortRng::from_seed_u64(0),
        };
        let mut data = vec![Elem::with_key(0)];
        for variant in [SortVariant::Bitonic, SortVariant::Bucket, SortVariant::Opaque] {
            assert!(matches!(
                sort(&mut ctx, variant, &mut data, 1),
                Err(SortError::NotSupported)
            ));
        }
    }

    #[test]
    fn test_preconditions_checked() {
        let endpoints = LocalCluster::endpoints(1);
        let pool = ThreadPool::new(1);
        let mut ctx = SortContext {
            transport: &endpoints[0],
            pool: &pool,
            rng: SortRng::from_seed_u64(0),
        };

        // Not a power of two.
        let mut data: Vec<Elem> = (0..6).map(Elem::with_key).collect();
        assert!(matches!(
            shuffle_sort(&mut ctx, &mut data, 6),
            Err(SortError::InvalidArgument)
        ));

        // Local length disagrees with the derived share.
        let mut data: Vec<Elem> = (0..4).map(Elem::with_key).collect();
        assert!(matches!(
            shuffle_sort(&mut ctx, &mut data, 8),
            Err(SortError::InvalidArgument)
        ));
    }
}

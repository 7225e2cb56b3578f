use std::thread;

use orsort_algo::{SortContext, SortVariant, local_share, sort};
use orsort_core::elem::Elem;
use orsort_core::error::SortError;
use orsort_core::pool::ThreadPool;
use orsort_core::timer::PhaseTimers;
use orsort_transport_local::LocalCluster;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Order-independent fingerprint of a key multiset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct KeyDigest {
    count: u64,
    sum: u64,
    xor: u64,
}

impl KeyDigest {
    fn absorb(&mut self, key: u64) {
        self.count += 1;
        self.sum = self.sum.wrapping_add(key);
        self.xor ^= key;
    }

    fn merge(&mut self, other: &KeyDigest) {
        self.count += other.count;
        self.sum = self.sum.wrapping_add(other.sum);
        self.xor ^= other.xor;
    }
}

/// What one rank thread reports back after a repetition.
struct RankOutcome {
    timers: PhaseTimers,
    locally_sorted: bool,
    first: Option<(u64, u64)>,
    last: Option<(u64, u64)>,
    input: KeyDigest,
    output: KeyDigest,
}

/// One repetition's reduced result.
pub struct RepResult {
    pub rep: u32,
    pub timers: PhaseTimers,
    pub verified: bool,
}

/// Run one sort job with `ranks` threads and reduce the outcome.
pub fn run_rep(
    total_length: u64,
    ranks: usize,
    threads: usize,
    variant: SortVariant,
    seed: u64,
    rep: u32,
    verify: bool,
) -> Result<RepResult, SortError> {
    let mut handles = Vec::new();
    for (rank, ep) in LocalCluster::endpoints(ranks).into_iter().enumerate() {
        handles.push(thread::spawn(move || -> Result<RankOutcome, SortError> {
            let pool = ThreadPool::new(threads);
            let mut ctx = SortContext::new(&ep, &pool)?;

            let local_len = local_share(total_length, rank, ranks);
            let mut input_rng =
                StdRng::seed_from_u64(seed ^ ((rep as u64) << 32) ^ rank as u64);
            let mut input = KeyDigest::default();
            let mut data: Vec<Elem> = (0..local_len)
                .map(|_| {
                    let key = input_rng.r#gen::<u64>();
                    input.absorb(key);
                    Elem::with_key(key)
                })
                .collect();

            let timers = sort(&mut ctx, variant, &mut data, total_length)?;

            let mut output = KeyDigest::default();
            for e in &data {
                output.absorb(e.key);
            }
            Ok(RankOutcome {
                timers,
                locally_sorted: data.windows(2).all(|w| w[0] <= w[1]),
                first: data.first().map(Elem::sort_pair),
                last: data.last().map(Elem::sort_pair),
                input,
                output,
            })
        }));
    }

    let mut outcomes = Vec::with_capacity(ranks);
    for handle in handles {
        outcomes.push(handle.join().expect("rank thread panicked")?);
    }

    Ok(RepResult {
        rep,
        timers: reduce_timers(&outcomes),
        verified: !verify || verify_outcomes(&outcomes),
    })
}

/// Per-phase maximum over ranks: the job is as slow as its slowest
/// rank.
fn reduce_timers(outcomes: &[RankOutcome]) -> PhaseTimers {
    let mut reduced = PhaseTimers::default();
    for outcome in outcomes {
        for (slot, &value) in reduced
            .elapsed
            .iter_mut()
            .zip(outcome.timers.elapsed.iter())
        {
            *slot = slot.max(value);
        }
    }
    reduced
}

/// Global sortedness plus key-multiset preservation.
fn verify_outcomes(outcomes: &[RankOutcome]) -> bool {
    if !outcomes.iter().all(|o| o.locally_sorted) {
        return false;
    }
    // Rank boundaries must be non-decreasing.
    let mut prev_last: Option<(u64, u64)> = None;
    for outcome in outcomes {
        if let (Some(prev), Some(first)) = (prev_last, outcome.first) {
            if prev > first {
                return false;
            }
        }
        if outcome.last.is_some() {
            prev_last = outcome.last;
        }
    }
    let mut input = KeyDigest::default();
    let mut output = KeyDigest::default();
    for outcome in outcomes {
        input.merge(&outcome.input);
        output.merge(&outcome.output);
    }
    input == output
}

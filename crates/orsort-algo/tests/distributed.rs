//! End-to-end sort jobs over the loopback transport, one thread per
//! rank.

use std::thread;

use orsort_algo::{SortContext, SortVariant, local_share, sort};
use orsort_core::elem::Elem;
use orsort_core::pool::ThreadPool;
use orsort_core::rng::SortRng;
use orsort_transport_local::LocalCluster;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Run one sort job: `inputs[r]` is rank r's local key array. Returns
/// each rank's output keys in rank order.
fn sort_job(inputs: Vec<Vec<u64>>, threads: usize) -> Vec<Vec<u64>> {
    let size = inputs.len();
    let total: u64 = inputs.iter().map(|v| v.len() as u64).sum();
    let mut handles = Vec::new();
    for (rank, (keys, ep)) in inputs
        .into_iter()
        .zip(LocalCluster::endpoints(size))
        .enumerate()
    {
        handles.push(thread::spawn(move || {
            let pool = ThreadPool::new(threads);
            let mut ctx = SortContext {
                transport: &ep,
                pool: &pool,
                rng: SortRng::from_seed_u64(0x0b5e55ed + rank as u64),
            };
            let mut data: Vec<Elem> = keys.into_iter().map(Elem::with_key).collect();
            sort(&mut ctx, SortVariant::OrShuffle, &mut data, total).unwrap();
            data.into_iter().map(|e| e.key).collect::<Vec<u64>>()
        }));
    }
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_globally_sorted(outputs: &[Vec<u64>]) {
    let flat: Vec<u64> = outputs.iter().flatten().copied().collect();
    assert!(
        flat.windows(2).all(|w| w[0] <= w[1]),
        "concatenated output not sorted"
    );
}

#[test]
fn test_single_rank_identity() {
    let outputs = sort_job(vec![vec![7, 3, 5, 1, 6, 2, 4, 0]], 2);
    assert_eq!(outputs[0], vec![0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_two_ranks_cross_partition() {
    // Rank 0 starts with the high half, rank 1 with the low half.
    let outputs = sort_job(vec![vec![6, 4, 7, 5], vec![2, 0, 3, 1]], 2);
    assert_eq!(outputs[0], vec![0, 1, 2, 3]);
    assert_eq!(outputs[1], vec![4, 5, 6, 7]);
}

#[test]
fn test_four_ranks_random_keys() {
    let size = 4;
    let per_rank = 64usize;
    let mut rng = StdRng::seed_from_u64(99);
    let inputs: Vec<Vec<u64>> = (0..size)
        .map(|_| (0..per_rank).map(|_| rng.r#gen::<u64>() >> 8).collect())
        .collect();
    let mut expected: Vec<u64> = inputs.iter().flatten().copied().collect();
    expected.sort_unstable();

    let outputs = sort_job(inputs, 3);
    assert_globally_sorted(&outputs);
    for (rank, out) in outputs.iter().enumerate() {
        assert_eq!(out.len(), local_share(256, rank, size));
    }
    let flat: Vec<u64> = outputs.iter().flatten().copied().collect();
    assert_eq!(flat, expected);
}

#[test]
fn test_duplicate_keys_complete() {
    // Heavy duplication: the ORP tiebreak must keep buckets exact.
    let inputs: Vec<Vec<u64>> = vec![vec![1; 32], vec![1; 32]];
    let outputs = sort_job(inputs, 2);
    assert_eq!(outputs[0], vec![1; 32]);
    assert_eq!(outputs[1], vec![1; 32]);
}

#[test]
fn test_sort_twice_is_stable_on_keys() {
    let first = sort_job(vec![vec![9, 2, 11, 5, 14, 7, 0, 4], vec![3, 12, 6, 1, 13, 8, 10, 15]], 2);
    let second = sort_job(first.clone(), 2);
    assert_eq!(first, second);
}

#[test]
fn test_orp_ids_mostly_unique() {
    let size = 2;
    let per_rank = 512usize;
    let total = (size * per_rank) as u64;
    let mut handles = Vec::new();
    for (rank, ep) in LocalCluster::endpoints(size).into_iter().enumerate() {
        handles.push(thread::spawn(move || {
            let pool = ThreadPool::new(2);
            let mut ctx = SortContext {
                transport: &ep,
                pool: &pool,
                rng: SortRng::from_seed_u64(rank as u64),
            };
            let mut data: Vec<Elem> = (0..per_rank as u64).map(Elem::with_key).collect();
            sort(&mut ctx, SortVariant::OrShuffle, &mut data, total).unwrap();
            data.into_iter().map(|e| e.orp_id).collect::<Vec<u64>>()
        }));
    }
    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let before = ids.len();
    ids.sort_unstable();
    ids.dedup();
    // 64 random bits across ~1k elements: collisions are practically
    // impossible.
    assert_eq!(ids.len(), before);
}

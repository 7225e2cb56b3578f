use orsort_core::timer::PhaseTimers;

use crate::runner::RepResult;

const MEGA: f64 = 1_000_000.0;

/// Sort throughput in elements per second.
pub fn throughput(total_length: u64, timers: &PhaseTimers) -> f64 {
    let total = timers.total();
    if total > 0.0 {
        total_length as f64 / total
    } else {
        0.0
    }
}

/// Print table header.
pub fn print_header() {
    println!();
    println!(
        "{:<6} {:>12} {:>11} {:>11} {:>12} {:>11} {:>11} {:>9}",
        "iter",
        "Melems/s",
        "shuffle(s)",
        "select(s)",
        "partition(s)",
        "merge(s)",
        "total(s)",
        "verified"
    );
    println!(
        "{:<6} {:>12} {:>11} {:>11} {:>12} {:>11} {:>11} {:>9}",
        "----",
        "--------",
        "----------",
        "---------",
        "------------",
        "--------",
        "--------",
        "--------"
    );
}

/// Print one repetition row.
pub fn print_result(result: &RepResult, total_length: u64) {
    println!(
        "{:<6} {:>12.2} {:>11.6} {:>11.6} {:>12.6} {:>11.6} {:>11.6} {:>9}",
        result.rep,
        throughput(total_length, &result.timers) / MEGA,
        result.timers.shuffle(),
        result.timers.select(),
        result.timers.partition(),
        result.timers.merge(),
        result.timers.total(),
        if result.verified { "yes" } else { "NO" },
    );
}

/// Spread of one per-repetition metric across a run.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpread {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

/// Reduce `metric` over the repetitions in one pass.
pub fn spread_of(results: &[RepResult], metric: impl Fn(&RepResult) -> f64) -> MetricSpread {
    if results.is_empty() {
        return MetricSpread {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            stddev: 0.0,
        };
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for result in results {
        let v = metric(result);
        min = min.min(v);
        max = max.max(v);
        sum += v;
        sum_sq += v * v;
    }
    let n = results.len() as f64;
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    MetricSpread {
        min,
        max,
        mean,
        stddev: variance.sqrt(),
    }
}

/// Print the summary over all repetitions.
pub fn print_summary(results: &[RepResult], total_length: u64) {
    if results.is_empty() {
        return;
    }
    let tput_stats = spread_of(results, |r| throughput(total_length, &r.timers) / MEGA);
    let time_stats = spread_of(results, |r| r.timers.total());

    println!();
    println!("Summary of all repetitions:");
    println!(
        "{:<14} {:>10} {:>10} {:>10} {:>10}",
        "Metric", "Max", "Min", "Mean", "StdDev"
    );
    println!(
        "{:<14} {:>10} {:>10} {:>10} {:>10}",
        "------", "---", "---", "----", "------"
    );
    println!(
        "{:<14} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
        "Melems/s", tput_stats.max, tput_stats.min, tput_stats.mean, tput_stats.stddev
    );
    println!(
        "{:<14} {:>10.5} {:>10.5} {:>10.5} {:>10.5}",
        "total(s)", time_stats.max, time_stats.min, time_stats.mean, time_stats.stddev
    );

    let failures = results.iter().filter(|r| !r.verified).count();
    if failures > 0 {
        println!();
        println!("WARNING: {} repetition(s) failed verification", failures);
    }
}

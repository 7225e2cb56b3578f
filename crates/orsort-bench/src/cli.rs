use clap::Parser;
use orsort_algo::SortVariant;

/// Distributed shuffle-sort benchmark over the in-process transport.
#[derive(Parser, Debug)]
#[command(name = "orsort-bench", about = "Distributed shuffle-sort benchmark")]
pub struct CliArgs {
    /// Total elements across all ranks, a power of two (supports k/m/g suffixes)
    #[arg(short = 'l', long = "total-length", default_value = "64k")]
    pub total_length: String,

    /// Number of ranks, run as threads of this process
    #[arg(short = 'n', long = "ranks", default_value_t = 2)]
    pub ranks: usize,

    /// Worker threads per rank
    #[arg(short = 't', long = "threads", default_value_t = 2)]
    pub threads: usize,

    /// Number of repetitions
    #[arg(short = 'i', long = "repetitions", default_value_t = 1)]
    pub repetitions: u32,

    /// Seed for input generation (the sort's own randomness stays fresh)
    #[arg(short = 's', long = "seed", default_value_t = 1)]
    pub seed: u64,

    /// Sort pipeline to run
    #[arg(short = 'a', long = "variant", default_value = "orshuffle")]
    pub variant: String,

    /// Skip the sortedness / multiset verification pass
    #[arg(long = "no-verify")]
    pub no_verify: bool,

    /// Output results as JSON to stdout (suppresses text output)
    #[arg(long = "json")]
    pub json: bool,

    /// Output results as JSON to file (text output still printed)
    #[arg(long = "json-file")]
    pub json_file: Option<String>,
}

/// Parse a size string with optional k/m/g suffix (case-insensitive).
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (num_str, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    num_str
        .trim()
        .parse::<u64>()
        .ok()
        .map(|v| v * multiplier)
}

/// Map a variant name to the pipeline dispatch value.
pub fn parse_variant(s: &str) -> Option<SortVariant> {
    match s.to_ascii_lowercase().as_str() {
        "orshuffle" => Some(SortVariant::OrShuffle),
        "bitonic" => Some(SortVariant::Bitonic),
        "bucket" => Some(SortVariant::Bucket),
        "opaque" => Some(SortVariant::Opaque),
        _ => None,
    }
}

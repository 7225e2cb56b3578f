mod cli;
mod json_output;
mod report;
mod runner;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::CliArgs;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let args = CliArgs::parse();

    let Some(total_length) = cli::parse_size(&args.total_length) else {
        eprintln!("ERROR: invalid total length: {}", args.total_length);
        std::process::exit(2);
    };
    let Some(variant) = cli::parse_variant(&args.variant) else {
        eprintln!("ERROR: unknown sort variant: {}", args.variant);
        std::process::exit(2);
    };
    if !total_length.is_power_of_two() || total_length % args.ranks as u64 != 0 {
        eprintln!(
            "ERROR: total length must be a power of two divisible by the rank count (got {} over {})",
            total_length, args.ranks
        );
        std::process::exit(2);
    }

    let json_mode = args.json || args.json_file.is_some();
    let print_text = !args.json;

    if print_text {
        println!("orsort-bench");
        println!("  variant        = {}", args.variant);
        println!("  total_length   = {}", total_length);
        println!("  ranks          = {}", args.ranks);
        println!("  threads/rank   = {}", args.threads);
        println!("  repetitions    = {}", args.repetitions);
        println!("  seed           = {}", args.seed);
        println!("  verify         = {}", !args.no_verify);
        report::print_header();
    }

    let mut results = Vec::new();
    for rep in 0..args.repetitions {
        match runner::run_rep(
            total_length,
            args.ranks,
            args.threads,
            variant,
            args.seed,
            rep,
            !args.no_verify,
        ) {
            Ok(result) => {
                if print_text {
                    report::print_result(&result, total_length);
                }
                results.push(result);
            }
            Err(e) => {
                eprintln!("ERROR: repetition {} failed: {}", rep, e);
                std::process::exit(1);
            }
        }
    }

    if print_text {
        report::print_summary(&results, total_length);
    }

    if json_mode {
        let doc = json_output::build_document(
            json_output::JsonParameters {
                total_length,
                ranks: args.ranks,
                threads: args.threads,
                repetitions: args.repetitions,
                variant: args.variant.clone(),
                seed: args.seed,
            },
            &results,
            &command_line,
        );
        let json = serde_json::to_string_pretty(&doc).expect("failed to serialize JSON");
        if args.json {
            println!("{}", json);
        }
        if let Some(ref path) = args.json_file {
            if let Err(e) = std::fs::write(path, &json) {
                eprintln!("ERROR: failed to write JSON file: {}", e);
            }
        }
    }

    if results.iter().any(|r| !r.verified) {
        std::process::exit(1);
    }
}

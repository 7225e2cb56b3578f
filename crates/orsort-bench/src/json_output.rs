use serde::Serialize;

use crate::report::{spread_of, throughput};
use crate::runner::RepResult;

#[derive(Serialize)]
pub struct JsonDocument {
    pub command_line: String,
    pub parameters: JsonParameters,
    pub results: Vec<JsonResult>,
    pub summary: JsonSummary,
}

#[derive(Serialize)]
pub struct JsonParameters {
    #[serde(rename = "totalLength")]
    pub total_length: u64,
    pub ranks: usize,
    pub threads: usize,
    pub repetitions: u32,
    pub variant: String,
    pub seed: u64,
}

#[derive(Serialize)]
pub struct JsonResult {
    pub rep: u32,
    #[serde(rename = "elemsPerSec")]
    pub elems_per_sec: f64,
    #[serde(rename = "shuffleTime")]
    pub shuffle_time: f64,
    #[serde(rename = "selectTime")]
    pub select_time: f64,
    #[serde(rename = "partitionTime")]
    pub partition_time: f64,
    #[serde(rename = "mergeTime")]
    pub merge_time: f64,
    #[serde(rename = "totalTime")]
    pub total_time: f64,
    pub verified: bool,
}

#[derive(Serialize)]
pub struct JsonSummary {
    #[serde(rename = "elemsPerSecMax")]
    pub elems_per_sec_max: f64,
    #[serde(rename = "elemsPerSecMin")]
    pub elems_per_sec_min: f64,
    #[serde(rename = "elemsPerSecMean")]
    pub elems_per_sec_mean: f64,
    #[serde(rename = "elemsPerSecStdDev")]
    pub elems_per_sec_stddev: f64,
    #[serde(rename = "allVerified")]
    pub all_verified: bool,
}

/// Build the JSON document for one benchmark invocation.
pub fn build_document(
    parameters: JsonParameters,
    results: &[RepResult],
    command_line: &str,
) -> JsonDocument {
    let total_length = parameters.total_length;
    let json_results: Vec<JsonResult> = results
        .iter()
        .map(|r| JsonResult {
            rep: r.rep,
            elems_per_sec: throughput(total_length, &r.timers),
            shuffle_time: r.timers.shuffle(),
            select_time: r.timers.select(),
            partition_time: r.timers.partition(),
            merge_time: r.timers.merge(),
            total_time: r.timers.total(),
            verified: r.verified,
        })
        .collect();

    let stats = spread_of(results, |r| throughput(total_length, &r.timers));

    JsonDocument {
        command_line: command_line.to_string(),
        parameters,
        summary: JsonSummary {
            elems_per_sec_max: stats.max,
            elems_per_sec_min: stats.min,
            elems_per_sec_mean: stats.mean,
            elems_per_sec_stddev: stats.stddev,
            all_verified: results.iter().all(|r| r.verified),
        },
        results: json_results,
    }
}

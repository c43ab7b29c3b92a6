//! Example: Estimate tempo for many audio files in parallel
//!
//! Usage:
//!   cargo run --release --example analyze_batch -- [--jobs N] [--json] [--mode M] \
//!       <file1> <file2> ...
//!
//! Notes:
//! - Parallelism is across files (batch-level). Each file analysis is still single-threaded.
//! - Default workers: (available CPU threads - 1), keeping one core free for the system.

#[path = "common/decode.rs"]
mod decode;

use std::env;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tempo_dsp::{estimate_tempo, BeatMode, BeatType};

#[derive(Debug, Clone, Serialize)]
struct ItemOut {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bpm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    beat_type: Option<BeatType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_mode: Option<BeatMode>,
    processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ItemOut {
    fn failed(file: String, error: String) -> Self {
        Self {
            file,
            bpm: None,
            confidence: None,
            beat_type: None,
            selected_mode: None,
            processing_time_ms: 0.0,
            error: Some(error),
        }
    }
}

fn analyze_one(path: &str, beat_mode: BeatMode) -> ItemOut {
    let (samples, sample_rate) = match decode::decode_mono(path) {
        Ok(decoded) => decoded,
        Err(e) => return ItemOut::failed(path.to_string(), format!("decode failed: {e}")),
    };

    let t0 = Instant::now();
    let result = estimate_tempo(&samples, sample_rate, beat_mode, None);
    let processing_time_ms = t0.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(estimate) => ItemOut {
            file: path.to_string(),
            bpm: estimate.as_ref().map(|r| r.bpm),
            confidence: estimate.as_ref().map(|r| r.confidence),
            beat_type: estimate.as_ref().map(|r| r.beat_type_auto),
            selected_mode: estimate.as_ref().map(|r| r.selected_mode),
            processing_time_ms,
            error: None,
        },
        Err(e) => ItemOut::failed(path.to_string(), format!("analysis failed: {e}")),
    }
}

fn default_jobs() -> usize {
    let n = std::thread::available_parallelism().map(|v| v.get()).unwrap_or(1);
    std::cmp::max(1, n.saturating_sub(1))
}

fn percentile(mut xs: Vec<f64>, p: f64) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(|a, b| a.total_cmp(b));
    let idx = ((xs.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    xs.get(idx.min(xs.len() - 1)).copied()
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let mut json = false;
    let mut jobs: Option<usize> = None;
    let mut beat_mode = BeatMode::Auto;
    let mut paths: Vec<String> = Vec::new();

    while let Some(a) = args.next() {
        match a.as_str() {
            "--json" => json = true,
            "--jobs" => {
                let v = args.next().ok_or("--jobs requires a value")?.parse::<usize>()?;
                jobs = Some(std::cmp::max(1, v));
            }
            "--mode" => {
                let m = args.next().ok_or("--mode requires a value")?;
                beat_mode = BeatMode::from(m);
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: analyze_batch [--jobs N] [--json] [--mode M] <file1> <file2> ...\n\
                     \n\
                     --jobs N   Parallel workers (default: CPU-1)\n\
                     --json     Emit one JSON object per line (JSONL)\n\
                     --mode M   auto | straight | breakbeat (default: auto)\n"
                );
                return Ok(());
            }
            _ => paths.push(a),
        }
    }

    if paths.is_empty() {
        eprintln!("ERROR: Provide at least one audio file path. Use --help for usage.");
        std::process::exit(2);
    }

    let jobs = jobs.unwrap_or_else(default_jobs);
    eprintln!("Batch: {} files, jobs={}, mode={}", paths.len(), jobs, beat_mode);

    let t0 = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let outs: Vec<ItemOut> =
        pool.install(|| paths.par_iter().map(|path| analyze_one(path, beat_mode)).collect());

    for (idx, o) in outs.iter().enumerate() {
        if json {
            println!("{}", serde_json::to_string(o)?);
            continue;
        }
        match (&o.error, o.bpm) {
            (Some(error), _) => {
                println!("[{}/{}] {}: ERROR: {}", idx + 1, outs.len(), o.file, error)
            }
            (None, Some(bpm)) => println!(
                "[{}/{}] {}: BPM={:.2} (conf={:.0}) {:?} via {} time={:.2}ms",
                idx + 1,
                outs.len(),
                o.file,
                bpm,
                o.confidence.unwrap_or(0.0),
                o.beat_type.unwrap_or(BeatType::Unknown),
                o.selected_mode.unwrap_or(beat_mode),
                o.processing_time_ms
            ),
            (None, None) => println!("[{}/{}] {}: no tempo", idx + 1, outs.len(), o.file),
        }
    }

    let ok_times: Vec<f64> = outs
        .iter()
        .filter(|o| o.error.is_none())
        .map(|o| o.processing_time_ms)
        .collect();
    let wall_ms = t0.elapsed().as_secs_f64() * 1000.0;

    eprintln!("Done: ok={}/{} wall={:.0}ms", ok_times.len(), outs.len(), wall_ms);
    if !ok_times.is_empty() {
        let mean = ok_times.iter().sum::<f64>() / ok_times.len() as f64;
        let p50 = percentile(ok_times.clone(), 0.50).unwrap_or(mean);
        let p90 = percentile(ok_times.clone(), 0.90).unwrap_or(mean);
        let min = ok_times.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = ok_times.iter().cloned().fold(0.0, f64::max);
        eprintln!(
            "processing_time_ms: mean={:.2} p50={:.2} p90={:.2} min={:.2} max={:.2}",
            mean, p50, p90, min, max
        );
    }

    Ok(())
}

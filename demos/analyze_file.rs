//! Example: Estimate the tempo of a single audio file
//!
//! Usage:
//!   cargo run --release --example analyze_file -- <file> [auto|straight|breakbeat] [--json]
//!
//! Set `RUST_LOG=tempo_dsp=debug` to follow the pipeline stages.

#[path = "common/decode.rs"]
mod decode;

use std::env;
use std::time::Instant;

use tempo_dsp::{estimate_tempo, BeatMode, PreliminaryEstimate};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logger
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));

    let Some(path) = positional.next() else {
        eprintln!("Usage: analyze_file <file> [auto|straight|breakbeat] [--json]");
        std::process::exit(2);
    };
    // Unknown names fall back to auto
    let beat_mode = positional.next().map(|m| BeatMode::from(m.as_str())).unwrap_or_default();

    let (samples, sample_rate) = decode::decode_mono(path)?;
    log::info!(
        "Decoded {}: {:.1}s at {} Hz",
        path,
        samples.len() as f32 / sample_rate as f32,
        sample_rate
    );

    let mut on_progress = |p: PreliminaryEstimate| {
        eprintln!("  preliminary: {:.2} BPM (confidence {:.0})", p.bpm, p.confidence);
    };

    let t0 = Instant::now();
    let result = estimate_tempo(&samples, sample_rate, beat_mode, Some(&mut on_progress))?;
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let Some(result) = result else {
        if json {
            println!("{}", serde_json::json!({ "file": path, "bpm": null }));
        } else {
            println!("{}: no tempo (silent, too short or aperiodic)", path);
        }
        return Ok(());
    };

    if json {
        let mut value = serde_json::to_value(&result)?;
        value["file"] = serde_json::Value::from(path.as_str());
        value["processing_time_ms"] = serde_json::Value::from(elapsed_ms);
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Analysis Results:");
        println!("  BPM: {:.2} (confidence: {:.0})", result.bpm, result.confidence);
        println!(
            "  Beat type: {:?} (breakbeat score: {:.2})",
            result.beat_type_auto, result.breakbeat_score
        );
        println!("  Mode: {} -> {}", result.beat_mode, result.selected_mode);
        if !result.metadata.promotions.is_empty() {
            println!("  Promotions: {}", result.metadata.promotions.join(", "));
        }
        println!("  Processing time: {:.2} ms", elapsed_ms);
    }

    Ok(())
}

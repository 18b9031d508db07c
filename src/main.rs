//! Flashpoint CLI - run engagement spike detection over a JSON export.
//!
//! Usage: `flashpoint <records.json> <topic,topic,...> [mode]`
//!
//! Reads an array of `{"date": "YYYY-MM-DD", "<topic>": count, ...}` objects,
//! runs the detector for the given topics, and prints the detected events as
//! JSON on stdout.

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use flashpoint::{detect_events, records_from_json, DetectorMode};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: flashpoint <records.json> <topic,topic,...> [robust|sensitive|cumulative]");
    }

    let path = &args[0];
    let active_topics: Vec<String> = args[1]
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let mode = match args.get(2) {
        Some(raw) => DetectorMode::from_str(raw)
            .with_context(|| format!("unknown detector mode '{}'", raw))?,
        None => DetectorMode::default(),
    };

    let input =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let records = records_from_json(&input).context("failed to load records")?;
    tracing::info!(
        "Loaded {} records, detecting over {} topic(s) in {} mode",
        records.len(),
        active_topics.len(),
        mode
    );

    let events = detect_events(&records, &active_topics, mode);
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}

/// Replay a recorded detection stream through one monitoring session
///
/// Reads frames from a JSON-lines file (one `Frame` object per line), runs
/// the PPE, proximity and zone detectors, and prints the session metrics as
/// JSON on stdout.
///
/// Usage:
///   cargo run --example replay_session -- [--zones zones.json] [--config config.json] [--stream] <frames.jsonl>
///
/// Examples:
///   cargo run --example replay_session -- test_data/site_a.jsonl
///   cargo run --example replay_session -- --zones test_data/site_a_zones.json test_data/site_a.jsonl
use site_safety_monitor::{load_zones, Frame, MonitorConfig, MonitorSession};
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let mut zones_path: Option<String> = None;
    let mut config_path: Option<String> = None;
    let mut print_stream = false;
    let mut frames_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--zones" if i + 1 < args.len() => {
                zones_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--stream" => {
                print_stream = true;
                i += 1;
            }
            arg => {
                frames_path = Some(arg.to_string());
                i += 1;
            }
        }
    }

    let Some(frames_path) = frames_path else {
        eprintln!(
            "Usage: {} [--zones zones.json] [--config config.json] [--stream] <frames.jsonl>",
            args[0]
        );
        std::process::exit(1);
    };

    let config = match &config_path {
        Some(path) => MonitorConfig::from_json_file(path)?,
        None => MonitorConfig::default(),
    };

    let session_id = Path::new(&frames_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("replay")
        .to_string();
    let mut session = MonitorSession::new(&session_id, config)?;
    if let Some(path) = &zones_path {
        session.set_zones(load_zones(path)?)?;
    }

    let reader = BufReader::new(File::open(&frames_path)?);
    let mut skipped_lines = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Line {}: not a frame ({}), skipped", line_no + 1, e);
                skipped_lines += 1;
                continue;
            }
        };
        if let Some(report) = session.process_frame(&frame) {
            if report.violation_count() > 0 {
                log::debug!(
                    "Frame {} @{:.2}s: {} violations, severity {}",
                    report.frame_id,
                    report.timestamp,
                    report.violation_count(),
                    report.severity
                );
            }
        }
    }
    if skipped_lines > 0 {
        log::warn!("{} lines could not be parsed", skipped_lines);
    }

    let report = session.finish();
    if print_stream {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report.metrics)?);
    }
    Ok(())
}

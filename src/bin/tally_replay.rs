//! tally_replay - count appearances in a recorded detection file

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

use object_tally::storage::local_now;
use object_tally::{
    CountSnapshot, DetectionSource, IncrementRule, ReplaySource, SnapshotStore, TallyConfig,
    TallyPipeline, TextFileSnapshotStore,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON Lines detection file, one frame per line.
    input: PathBuf,
    /// Config file (JSON, or TOML by extension). Defaults to $TALLY_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Increment rule override (reappearance | new_instance_reappearance).
    #[arg(long)]
    rule: Option<String>,
    /// Write a JSON summary to this path.
    #[arg(long)]
    json: Option<PathBuf>,
    /// Append the final counts to the snapshot log.
    #[arg(long)]
    append_log: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
struct ReplaySummary<'a> {
    input: String,
    frames: u64,
    detections: u64,
    increment_rule: &'a str,
    snapshot: &'a CountSnapshot,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_args(&args.ui, std::io::stderr().is_terminal());

    let mut cfg = match &args.config {
        Some(path) => TallyConfig::load_from(path)?,
        None => TallyConfig::load()?,
    };
    if let Some(rule) = &args.rule {
        cfg.tally.visibility.increment_rule = IncrementRule::parse(rule)
            .ok_or_else(|| anyhow!("unknown increment rule '{}'", rule))?;
    }
    cfg.source.url = args.input.to_string_lossy().into_owned();

    let mut source = {
        let _stage = ui.stage("Open replay");
        let mut source = ReplaySource::new(cfg.source.clone())?;
        source.connect()?;
        source
    };

    let mut pipeline = TallyPipeline::from_config(&cfg);
    pipeline.prepare_for(&source);

    let frames = {
        let mut stage = ui.stage("Count appearances");
        let mut frames = 0u64;
        while let Some(frame) = source.next_frame()? {
            pipeline.process(frame);
            frames += 1;
            if frames % 500 == 0 {
                stage.set_detail(format!("{} frames", frames));
            }
        }
        stage.set_detail(format!("{} frames", frames));
        frames
    };

    let snapshot = pipeline.snapshot();
    for line in snapshot.lines() {
        println!("{}", line);
    }

    if let Some(path) = &args.json {
        let _stage = ui.stage("Write summary");
        let summary = ReplaySummary {
            input: cfg.source.url.clone(),
            frames,
            detections: source.stats().detections_read,
            increment_rule: cfg.tally.visibility.increment_rule.as_str(),
            snapshot: &snapshot,
        };
        let json = serde_json::to_vec_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }

    if args.append_log {
        let _stage = ui.stage("Append snapshot log");
        let mut store = TextFileSnapshotStore::new(cfg.snapshot.log_path.clone());
        store.append(&snapshot, local_now())?;
    }

    Ok(())
}

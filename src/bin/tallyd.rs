//! tallyd - live appearance counter
//!
//! This daemon:
//! 1. Reads detections frame by frame from the configured source
//! 2. Drops low-confidence detections
//! 3. Updates the tally engine once per frame
//! 4. Prints the count table at most once per snapshot interval
//! 5. Appends a snapshot to the log on `k` (stdin) and optionally on exit
//!
//! `q` on stdin or Ctrl-C stops the loop. An exhausted or failing source stops
//! it too; the final table is printed (and saved) either way.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use object_tally::storage::local_now;
use object_tally::{
    open_source, CountSnapshot, DetectionSource, SnapshotStore, SnapshotThrottle, TallyConfig,
    TallyPipeline, TextFileSnapshotStore,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,
    /// Source override: local JSON Lines file or stub://<name>.
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Seed for the synthetic source.
    #[arg(long)]
    seed: Option<u64>,
    /// Append a final snapshot to the log on shutdown.
    #[arg(long)]
    save_on_exit: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Save,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => TallyConfig::load_from(path)?,
        None => TallyConfig::load()?,
    };
    if let Some(url) = args.source {
        cfg.source.url = url;
    }
    if args.frames.is_some() {
        cfg.source.frame_limit = args.frames;
    }
    if args.seed.is_some() {
        cfg.source.seed = args.seed;
    }

    let mut source = open_source(cfg.source.clone())?;
    source.connect()?;

    let mut pipeline = TallyPipeline::from_config(&cfg);
    pipeline.prepare_for(source.as_ref());
    let mut store = TextFileSnapshotStore::new(cfg.snapshot.log_path.clone());
    let mut throttle = SnapshotThrottle::new(cfg.snapshot.interval);
    let commands = spawn_command_listeners()?;

    log::info!("tallyd running. source={} ({})", cfg.source.url, source.name());
    log::info!(
        "match radius={}px history={} rule={} min_conf={:.2}",
        cfg.tally.matcher.match_radius_px,
        cfg.tally.matcher.history_capacity,
        cfg.tally.visibility.increment_rule.as_str(),
        cfg.gate.min_confidence
    );
    log::info!(
        "commands: 'k' saves counts to {}, 'q' quits",
        store.path().display()
    );

    let session = SessionOptions {
        frame_interval: Duration::from_secs(1) / cfg.source.target_fps,
        save_on_exit: args.save_on_exit,
    };
    run_session(
        source.as_mut(),
        &mut pipeline,
        &mut store,
        &mut throttle,
        &commands,
        &session,
    )
}

struct SessionOptions {
    frame_interval: Duration,
    save_on_exit: bool,
}

/// Run the frame loop, then print the final table and optionally save it.
///
/// A source error ends the loop like exhaustion does. The final table is still
/// printed and saved, and the error is returned afterwards.
fn run_session(
    source: &mut dyn DetectionSource,
    pipeline: &mut TallyPipeline,
    store: &mut TextFileSnapshotStore,
    throttle: &mut SnapshotThrottle,
    commands: &Receiver<Command>,
    session: &SessionOptions,
) -> Result<()> {
    let mut last_health_log = Instant::now();
    let mut outcome = Ok(());

    'frames: loop {
        loop {
            match commands.try_recv() {
                Ok(Command::Save) => save(store, &pipeline.snapshot()),
                Ok(Command::Quit) => {
                    log::info!("shutting down");
                    break 'frames;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let started = Instant::now();
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("source exhausted, stopping");
                break;
            }
            Err(e) => {
                log::error!("source failed, stopping: {:#}", e);
                outcome = Err(e);
                break;
            }
        };
        let report = pipeline.process(frame);
        if report.has_changes() {
            log::debug!(
                "frame {}: new instances {:?}, left view {:?}",
                report.frame_index,
                report.new_instances,
                report.ended
            );
        }

        if throttle.should_emit(Instant::now()) {
            print_counts(&pipeline.snapshot());
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "source frames={} detections={} url={} visible={:?}",
                stats.frames_read,
                stats.detections_read,
                stats.url,
                pipeline.engine().visible_classes()
            );
            last_health_log = Instant::now();
        }

        if source.is_live() {
            std::thread::sleep(session.frame_interval.saturating_sub(started.elapsed()));
        }
    }

    let snapshot = pipeline.snapshot();
    print_counts(&snapshot);
    if session.save_on_exit {
        store.append(&snapshot, local_now())?;
    }
    outcome
}

fn spawn_command_listeners() -> Result<Receiver<Command>> {
    let (tx, rx) = mpsc::channel();

    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let command = match line.trim() {
                "k" => Command::Save,
                "q" => Command::Quit,
                "" => continue,
                other => {
                    log::warn!("unknown command '{}' (use k or q)", other);
                    continue;
                }
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

fn save(store: &mut TextFileSnapshotStore, snapshot: &CountSnapshot) {
    if let Err(e) = store.append(snapshot, local_now()) {
        log::error!("snapshot save failed: {}", e);
    }
}

fn print_counts(snapshot: &CountSnapshot) {
    println!();
    for line in snapshot.lines() {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_tally::{ReplaySource, SourceConfig};
    use std::io::Write;

    fn session(save_on_exit: bool) -> SessionOptions {
        SessionOptions {
            frame_interval: Duration::from_millis(1),
            save_on_exit,
        }
    }

    #[test]
    fn source_failure_still_saves_counts_gathered_so_far() {
        let dir = tempfile::tempdir().unwrap();
        let frames_path = dir.path().join("frames.jsonl");
        let mut file = std::fs::File::create(&frames_path).unwrap();
        for line in [
            r#"{"detections":[{"class":"bottle","bbox":[0,0,20,20],"confidence":0.9}]}"#,
            r#"{"detections":[{"class":"can","bbox":[500,500,520,520],"confidence":0.9}]}"#,
            "not json",
        ] {
            writeln!(file, "{}", line).unwrap();
        }
        drop(file);

        let mut source = ReplaySource::new(SourceConfig {
            url: frames_path.display().to_string(),
            ..SourceConfig::default()
        })
        .unwrap();
        source.connect().unwrap();
        let mut pipeline = TallyPipeline::from_config(&TallyConfig::default());
        let log_path = dir.path().join("detections.txt");
        let mut store = TextFileSnapshotStore::new(log_path.clone());
        let mut throttle = SnapshotThrottle::new(Duration::from_secs(1));
        let (_tx, rx) = mpsc::channel();

        let err = run_session(
            &mut source,
            &mut pipeline,
            &mut store,
            &mut throttle,
            &rx,
            &session(true),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));

        let logged = std::fs::read_to_string(&log_path).unwrap();
        assert!(logged.contains("1 bottle"));
        assert!(logged.contains("1 can"));
        assert_eq!(pipeline.engine().frames_processed(), 2);
    }

    #[test]
    fn quit_command_stops_before_reading_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = object_tally::SyntheticSource::new(SourceConfig {
            seed: Some(1),
            ..SourceConfig::default()
        });
        source.connect().unwrap();
        let mut pipeline = TallyPipeline::from_config(&TallyConfig::default());
        let log_path = dir.path().join("detections.txt");
        let mut store = TextFileSnapshotStore::new(log_path.clone());
        let mut throttle = SnapshotThrottle::new(Duration::from_secs(1));
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Quit).unwrap();

        run_session(
            &mut source,
            &mut pipeline,
            &mut store,
            &mut throttle,
            &rx,
            &session(false),
        )
        .unwrap();
        assert_eq!(pipeline.engine().frames_processed(), 0);
        assert!(!log_path.exists());
    }
}

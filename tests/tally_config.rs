use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use object_tally::config::TallyConfig;
use object_tally::IncrementRule;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TALLY_CONFIG",
        "TALLY_SOURCE",
        "TALLY_MATCH_RADIUS",
        "TALLY_HISTORY_CAPACITY",
        "TALLY_MIN_CONFIDENCE",
        "TALLY_INCREMENT_RULE",
        "TALLY_LOG_PATH",
        "TALLY_SNAPSHOT_INTERVAL_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "source": {
            "url": "recordings/shelf.jsonl",
            "width": 1920,
            "height": 1080,
            "target_fps": 15
        },
        "matcher": {
            "match_radius_px": 250.0,
            "history_capacity": 64,
            "reference_width": 1280,
            "reference_height": 720
        },
        "visibility": {
            "increment_rule": "new_instance_reappearance",
            "absence_grace_frames": 3
        },
        "detector": {
            "min_confidence": 0.8,
            "max_detections": 5
        },
        "snapshot": {
            "interval_ms": 2000,
            "log_path": "counts.txt"
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("TALLY_CONFIG", file.path());
    std::env::set_var("TALLY_MATCH_RADIUS", "300");
    std::env::set_var("TALLY_INCREMENT_RULE", "reappearance");

    let cfg = TallyConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "recordings/shelf.jsonl");
    assert_eq!(cfg.source.width, 1920);
    assert_eq!(cfg.source.height, 1080);
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.tally.matcher.match_radius_px, 300.0);
    assert_eq!(cfg.tally.matcher.history_capacity, 64);
    assert_eq!(cfg.tally.matcher.reference_resolution, Some((1280, 720)));
    assert_eq!(cfg.tally.visibility.increment_rule, IncrementRule::Reappearance);
    assert_eq!(cfg.tally.visibility.absence_grace_frames, 3);
    assert_eq!(cfg.gate.min_confidence, 0.8);
    assert_eq!(cfg.gate.max_detections, 5);
    assert_eq!(cfg.snapshot.interval, Duration::from_millis(2000));
    assert_eq!(cfg.snapshot.log_path.to_str(), Some("counts.txt"));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[source]
url = "stub://bench"
seed = 42
frame_limit = 500

[matcher]
history_capacity = 20
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = TallyConfig::load_from(file.path()).expect("load config");
    assert_eq!(cfg.source.url, "stub://bench");
    assert_eq!(cfg.source.seed, Some(42));
    assert_eq!(cfg.source.frame_limit, Some(500));
    assert_eq!(cfg.tally.matcher.history_capacity, 20);
    assert_eq!(cfg.tally.matcher.match_radius_px, 400.0);

    clear_env();
}

#[test]
fn rejects_bad_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TALLY_HISTORY_CAPACITY", "forty");
    let err = TallyConfig::load().unwrap_err();
    assert!(err.to_string().contains("TALLY_HISTORY_CAPACITY"));
    clear_env();

    std::env::set_var("TALLY_MIN_CONFIDENCE", "1.5");
    assert!(TallyConfig::load().is_err());
    clear_env();

    std::env::set_var("TALLY_INCREMENT_RULE", "both");
    let err = TallyConfig::load().unwrap_err();
    assert!(err.to_string().contains("unknown increment rule"));
    clear_env();

    std::env::set_var("TALLY_MATCH_RADIUS", "0");
    assert!(TallyConfig::load().is_err());
    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("TALLY_CONFIG", "/nonexistent/tally.json");
    let err = TallyConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}

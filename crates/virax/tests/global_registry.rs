//! The process-wide logger. One test, since the registry is shared.

use std::sync::{Arc, Mutex};

use serde_json::json;

use virax::{PipelineConfig, ViraxLogger, WatchOptions};

#[test]
fn global_logger_lifecycle() {
    // Before initialization: logging is dropped, watching is refused.
    virax::log("INFO", "EARLY", "nobody listening");
    virax::warning("EARLY", "nobody listening");
    assert!(virax::watch("*", |_| Ok(()), WatchOptions::default()).is_err());
    assert!(virax::get_logger().is_none());

    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        store_path: dir.path().join("global.db"),
        heartbeat_enabled: false,
        poll_interval_ms: 20,
        // One callback thread keeps watcher order equal to log order.
        max_workers: 1,
        ..PipelineConfig::default()
    };

    let first = virax::initialize(config.clone()).unwrap();
    let second = virax::initialize(PipelineConfig::in_memory()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    drop(second);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    virax::watch(
        "GLOBAL",
        move |record| {
            sink.lock().unwrap().push((record.level.clone(), record.source.clone()));
            Ok(())
        },
        WatchOptions::default(),
    )
    .unwrap();

    virax::log("INFO", "GLOBAL", &json!({ "via": "free function" }));
    let line = line!() + 1;
    virax::critical("GLOBAL", &json!({ "via": "shortcut" }));
    virax::trace("GLOBAL", "t");
    virax::debug("GLOBAL", "d");
    virax::info("GLOBAL", "i");
    virax::warning("GLOBAL", "w");
    virax::error("GLOBAL", "e");
    virax::fatal("GLOBAL", "f");
    assert_eq!(first.watchers().len(), 1);
    drop(first);

    virax::stop().unwrap();
    assert!(virax::get_logger().is_none());
    virax::stop().unwrap();

    let seen = seen.lock().unwrap();
    let levels: Vec<&str> = seen.iter().map(|(level, _)| level.as_str()).collect();
    assert_eq!(
        levels,
        vec!["INFO", "CRITICAL", "TRACE", "DEBUG", "INFO", "WARNING", "ERROR", "FATAL"]
    );
    assert_eq!(seen[1].1, format!("{}:{}", file!(), line));

    let reopened = ViraxLogger::open(config).unwrap();
    assert_eq!(reopened.count().unwrap(), 8);
    assert!(reopened.audit(None).is_intact());
    reopened.shutdown().unwrap();
}

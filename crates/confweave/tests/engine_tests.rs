//! End-to-end tests for the retrieval engine over real files.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use tokio::sync::mpsc;

use common::harness::{collect_stream, next_within};
use common::{directory_source, file_source, inline_source, single_shot, TestHarness};
use confweave::{EngineConfig, RetrievalError, SourceError, SourceSpec};

#[tokio::test]
async fn test_file_sources_overlay_in_declaration_order() {
    let harness = TestHarness::new();
    let base = harness.write("base.yaml", "server:\n  host: localhost\n  port: 8080\nhosts: [a, b, c]\n");
    let overlay = harness.write("overlay.json", r#"{"server": {"port": 9090}, "hosts": ["d"]}"#);

    let engine = harness.engine(single_shot(vec![
        file_source(&base, "yaml"),
        file_source(&overlay, "json"),
    ]));

    let merged = engine.fetch_once().await.unwrap();
    assert_eq!(
        (*merged).clone().into_value(),
        json!({"server": {"host": "localhost", "port": 9090}, "hosts": ["d"]})
    );
}

#[tokio::test]
async fn test_directory_source_later_file_wins() {
    let harness = TestHarness::new();
    harness.write("conf.d/b.json", r#"{"k": "B"}"#);
    harness.write("conf.d/a.json", r#"{"k": "A", "a": true}"#);
    harness.write("conf.d/notes.txt", "ignored");

    let engine = harness.engine(single_shot(vec![directory_source(
        &harness.config_dir,
        json!([{"pattern": "conf.d/*.json"}]),
    )]));

    let merged = engine.fetch_once().await.unwrap();
    assert_eq!(merged.get_str("k"), Some("B"));
    assert_eq!(merged.get_bool("a"), Some(true));
}

#[tokio::test]
async fn test_properties_options_reach_decoder() {
    let harness = TestHarness::new();
    let path = harness.write("app.properties", "db.host=localhost\ndb.port=5432\n");
    let spec = file_source(&path, "properties");
    let spec = SourceSpec {
        options: spec.options.clone().with("hierarchical", true),
        ..spec
    };

    let merged = harness.engine(single_shot(vec![spec])).fetch_once().await.unwrap();
    assert_eq!(
        (*merged).clone().into_value(),
        json!({"db": {"host": "localhost", "port": 5432}})
    );
}

#[tokio::test]
async fn test_periodic_scan_publishes_changes() {
    let harness = TestHarness::new();
    let path = harness.write("app.json", r#"{"version": 1}"#);
    let engine = harness.engine(
        EngineConfig::new()
            .with_poll_interval_millis(25)
            .with_source(file_source(&path, "json")),
    );

    let mut documents = collect_stream(&engine);
    engine.start().unwrap();

    let first = next_within(&mut documents).await.unwrap();
    assert_eq!(first.get_i64("version"), Some(1));

    harness.write("app.json", r#"{"version": 2}"#);
    let second = next_within(&mut documents).await.unwrap();
    assert_eq!(second.get_i64("version"), Some(2));
    assert_eq!(engine.get_cached().get_i64("version"), Some(2));

    engine.close();
}

#[tokio::test]
async fn test_periodic_failure_keeps_stale_snapshot() {
    let harness = TestHarness::new();
    let path = harness.write("app.json", r#"{"version": 1}"#);
    let engine = harness.engine(
        EngineConfig::new()
            .with_poll_interval_millis(25)
            .with_source(file_source(&path, "json")),
    );
    engine.fetch_once().await.unwrap();

    let (tx, mut errors) = mpsc::unbounded_channel();
    engine.subscribe().set_error_handler(move |error| {
        let _ = tx.send(error.to_string());
    });
    std::fs::remove_file(&path).unwrap();
    engine.start().unwrap();

    let message = next_within(&mut errors).await.unwrap();
    assert!(message.contains("file"), "unexpected error: {}", message);
    assert_eq!(engine.get_cached().get_i64("version"), Some(1));

    // One-shot callers get the failure directly.
    assert!(matches!(
        engine.fetch_once().await,
        Err(RetrievalError::Source(SourceError::Fetch { .. }))
    ));
    engine.close();
}

#[tokio::test]
async fn test_before_scan_handler_runs_each_period() {
    let harness = TestHarness::new();
    let engine = harness.engine(
        EngineConfig::new()
            .with_poll_interval_millis(15)
            .with_source(inline_source(json!({"a": 1}))),
    );
    let scans = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&scans);
    engine.set_before_scan_handler(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    engine.close();

    assert!(scans.load(Ordering::SeqCst) >= 2);
    assert_eq!(engine.get_cached().get_i64("a"), Some(1));
}

#[tokio::test]
async fn test_paused_stream_delivers_latest_on_resume() {
    let harness = TestHarness::new();
    let path = harness.write("app.json", r#"{"version": 1}"#);
    let engine = harness.engine(single_shot(vec![file_source(&path, "json")]));

    let mut documents = collect_stream(&engine);
    let stream = engine.subscribe();
    stream.pause();

    engine.fetch_once().await.unwrap();
    harness.write("app.json", r#"{"version": 2}"#);
    engine.fetch_once().await.unwrap();
    assert!(next_within(&mut documents).await.is_none());

    stream.resume();
    let delivered = next_within(&mut documents).await.unwrap();
    assert_eq!(delivered.get_i64("version"), Some(2));
    assert!(next_within(&mut documents).await.is_none());
}

#[tokio::test]
async fn test_late_subscriber_gets_cached_snapshot() {
    let harness = TestHarness::new();
    let engine = harness.engine(single_shot(vec![inline_source(json!({"ready": true}))]));
    engine.fetch_once().await.unwrap();

    let mut documents = collect_stream(&engine);
    let delivered = next_within(&mut documents).await.unwrap();
    assert_eq!(delivered.get_bool("ready"), Some(true));
}

#[tokio::test]
async fn test_close_stops_scanning_and_ends_stream() {
    let harness = TestHarness::new();
    let path = harness.write("app.json", r#"{"version": 1}"#);
    let engine = harness.engine(
        EngineConfig::new()
            .with_poll_interval_millis(20)
            .with_source(file_source(&path, "json")),
    );
    let (tx, mut ended) = mpsc::unbounded_channel();
    engine.subscribe().set_end_handler(move || {
        let _ = tx.send(());
    });

    engine.start().unwrap();
    engine.fetch_once().await.unwrap();
    engine.close();
    assert!(next_within(&mut ended).await.is_some());

    harness.write("app.json", r#"{"version": 2}"#);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(engine.get_cached().get_i64("version"), Some(1));
}

#[tokio::test]
async fn test_engine_from_yaml_config_file() {
    let harness = TestHarness::new();
    let app = harness.write("app.json", r#"{"name": "from-file"}"#);
    let config_path = harness.write_engine_config(
        "engine.yaml",
        &format!(
            "pollIntervalMillis: 0\nsources:\n  - type: file\n    config:\n      path: {}\n  - type: json\n    optional: true\n    options:\n      extra: 1\n",
            app.display()
        ),
    );

    let engine = confweave::RetrievalEngine::from_config_file(
        &config_path,
        Arc::new(confweave::Registry::builtin()),
    )
    .unwrap();
    let labels: Vec<&str> = engine.providers().iter().map(|p| p.label()).collect();
    assert_eq!(labels, vec!["file", "json"]);

    let merged = engine.fetch_once().await.unwrap();
    assert_eq!(merged.get_str("name"), Some("from-file"));
    assert_eq!(merged.get_i64("extra"), Some(1));
}

#[tokio::test]
#[serial]
async fn test_default_stores_read_env_then_config_file() {
    let harness = TestHarness::new();
    let path = harness.write("defaults.yml", "CONFWEAVE_IT_VALUE: from-file\nfile_only: true\n");
    std::env::set_var("CONFWEAVE_CONFIG_PATH", &path);
    std::env::set_var("CONFWEAVE_IT_VALUE", "from-env");

    let engine = harness.engine(
        EngineConfig::new()
            .with_poll_interval_millis(0)
            .with_default_stores(true)
            .with_source(inline_source(json!({"explicit": 1}))),
    );
    let labels: Vec<(&str, &str)> = engine
        .providers()
        .iter()
        .map(|p| (p.label(), p.format()))
        .collect();
    assert_eq!(labels, vec![("env", "json"), ("file", "yaml"), ("json", "json")]);

    let merged = engine.fetch_once().await.unwrap();
    assert_eq!(merged.get_str("CONFWEAVE_IT_VALUE"), Some("from-file"));
    assert_eq!(merged.get_bool("file_only"), Some(true));
    assert_eq!(merged.get_i64("explicit"), Some(1));

    std::env::remove_var("CONFWEAVE_CONFIG_PATH");
    std::env::remove_var("CONFWEAVE_IT_VALUE");
}

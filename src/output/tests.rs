//! Tests for output module

use super::*;
use crate::config::{CompressionConfig, SinkConfig};
use crate::types::Hit;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn hit(ts: i64) -> Hit {
    Hit::from_envelope(json!({
        "_index": "logs",
        "_id": format!("doc-{ts}"),
        "_source": {"@timestamp": ts, "message": format!("event {ts}")},
        "sort": [ts]
    }))
    .unwrap()
}

fn sink_config(dir: &Path, flush_every: u64, rotate_every: u64) -> SinkConfig {
    SinkConfig {
        output_dir: dir.to_path_buf(),
        flush_every,
        rotate_every,
        ..SinkConfig::default()
    }
}

fn read_lines(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// JsonlSink Tests
// ============================================================================

#[test]
fn test_rotation_boundary() {
    let dir = tempdir().unwrap();
    let mut sink = JsonlSink::new(sink_config(dir.path(), 100, 3)).unwrap();

    let mut rotated = Vec::new();
    for ts in [10, 20, 30, 40, 50, 60, 70] {
        if let Some(path) = sink.write(&hit(ts)).unwrap().rotated {
            rotated.push(path);
        }
    }
    let last = sink.finish().unwrap().unwrap();

    assert_eq!(
        rotated,
        vec![dir.path().join("10.json"), dir.path().join("40.json")]
    );
    assert_eq!(last, dir.path().join("70.json"));

    let counts: Vec<usize> = ["10.json", "40.json", "70.json"]
        .iter()
        .map(|name| read_lines(&dir.path().join(name)).len())
        .collect();
    assert_eq!(counts, vec![3, 3, 1]);

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["10.json", "40.json", "70.json"]);
}

#[test]
fn test_lines_hold_full_envelope() {
    let dir = tempdir().unwrap();
    let mut sink = JsonlSink::new(sink_config(dir.path(), 100, 100)).unwrap();

    sink.write(&hit(1_629_936_319_214)).unwrap();
    sink.write(&hit(1_629_936_319_215)).unwrap();
    let path = sink.finish().unwrap().unwrap();

    assert_eq!(path, dir.path().join("1629936319214.json"));
    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["_id"], "doc-1629936319214");
    assert_eq!(lines[0]["sort"], json!([1_629_936_319_214_i64]));
    assert_eq!(lines[1]["_source"]["message"], "event 1629936319215");
}

#[test]
fn test_flush_cadence() {
    let dir = tempdir().unwrap();
    let mut sink = JsonlSink::new(sink_config(dir.path(), 2, 4)).unwrap();

    let outcomes: Vec<WriteOutcome> = (1..=5).map(|ts| sink.write(&hit(ts)).unwrap()).collect();

    assert!(!outcomes[0].flushed);
    assert!(outcomes[1].flushed);
    assert!(!outcomes[2].flushed);
    // Fourth record both flushes and rotates
    assert!(outcomes[3].flushed);
    assert_eq!(outcomes[3].rotated, Some(dir.path().join("1.json")));
    // Counter restarts in the new file
    assert!(!outcomes[4].flushed);
    assert!(outcomes[4].rotated.is_none());

    let current = sink.current().unwrap();
    assert_eq!(current.name(), "5.json");
    assert_eq!(current.record_count(), 1);
    assert_eq!(sink.records_written(), 5);
}

#[test]
fn test_flushed_data_visible_while_open() {
    let dir = tempdir().unwrap();
    let mut sink = JsonlSink::new(sink_config(dir.path(), 2, 100)).unwrap();

    sink.write(&hit(1)).unwrap();
    sink.write(&hit(2)).unwrap();

    assert_eq!(read_lines(&dir.path().join("1.json")).len(), 2);
}

#[test]
fn test_no_file_until_first_write() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nested").join("export");
    let sink = JsonlSink::new(sink_config(&out, 10, 10)).unwrap();

    assert!(out.is_dir());
    assert!(sink.current().is_none());
    assert_eq!(sink.finish().unwrap(), None);
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_completed_files_tracked() {
    let dir = tempdir().unwrap();
    let mut sink = JsonlSink::new(sink_config(dir.path(), 10, 2)).unwrap();

    for ts in 1..=4 {
        sink.write(&hit(ts)).unwrap();
    }

    assert_eq!(
        sink.completed_files(),
        &[dir.path().join("1.json"), dir.path().join("3.json")]
    );
    assert!(sink.current().is_none());
}

#[test]
fn test_file_name_from_string_key() {
    let dir = tempdir().unwrap();
    let sink = JsonlSink::new(sink_config(dir.path(), 10, 10)).unwrap();

    let key = crate::types::SortKey::new(vec![json!("2021-08-26T00:00:00.000Z")]);
    assert_eq!(
        sink.file_name(&key).unwrap(),
        "2021-08-26T00:00:00.000Z.json"
    );

    let bad = crate::types::SortKey::new(vec![json!("../escape")]);
    assert!(sink.file_name(&bad).is_err());
}

#[test]
fn test_zero_thresholds_rejected() {
    let dir = tempdir().unwrap();
    assert!(JsonlSink::new(sink_config(dir.path(), 0, 10)).is_err());
    assert!(JsonlSink::new(sink_config(dir.path(), 10, 0)).is_err());
}

// ============================================================================
// Compressor Tests
// ============================================================================

fn compression(program: &str, args: &[&str], max_in_flight: usize) -> CompressionConfig {
    CompressionConfig {
        enabled: true,
        program: program.to_string(),
        args: args.iter().map(ToString::to_string).collect(),
        max_in_flight,
    }
}

#[tokio::test]
async fn test_compressor_success() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("1.json");
    fs::write(&file, "{}\n").unwrap();

    let mut compressor = Compressor::new(&compression("true", &[], 2));
    compressor.submit(file).await.unwrap();
    let stats = compressor.finish().await;

    assert_eq!(
        stats,
        CompressionStats {
            submitted: 1,
            succeeded: 1,
            failed: 0
        }
    );
}

#[tokio::test]
async fn test_compressor_failures_are_counted() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("1.json");

    let mut compressor = Compressor::new(&compression("false", &[], 2));
    compressor.submit(file.clone()).await.unwrap();
    let stats = compressor.finish().await;
    assert_eq!(stats.failed, 1);

    let mut compressor = Compressor::new(&compression("esdump-no-such-program", &[], 2));
    compressor.submit(file).await.unwrap();
    let stats = compressor.finish().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 0);
}

#[tokio::test]
async fn test_compressor_bounds_in_flight_jobs() {
    let dir = tempdir().unwrap();
    let mut compressor = Compressor::new(&compression("sh", &["-c", "sleep 0.1", "sh"], 1));

    for i in 0..3 {
        compressor
            .submit(dir.path().join(format!("{i}.json")))
            .await
            .unwrap();
        assert!(compressor.in_flight() <= 1);
    }

    let stats = compressor.finish().await;
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.succeeded, 3);
}

#[tokio::test]
async fn test_compressor_runs_program_on_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("7.json");
    fs::write(&file, "{}\n").unwrap();

    // Stand-in compressor: rename FILE to FILE.done
    let mut compressor = Compressor::new(&compression("sh", &["-c", "mv \"$1\" \"$1.done\"", "sh"], 2));
    compressor.submit(file.clone()).await.unwrap();
    compressor.finish().await;

    assert!(!file.exists());
    assert!(dir.path().join("7.json.done").exists());
}

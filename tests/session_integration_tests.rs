//! Integration tests: full-pipeline scenarios across the window store,
//! commit store, degradation controller, slot model, and telemetry sinks.

use std::io::BufRead;
use std::sync::Arc;

use serde_json::json;
use stream_window_helper::commit::scheduler::{FrameScheduling, ManualFrameScheduler};
use stream_window_helper::commit::store::{Commit, StreamCommitStore};
use stream_window_helper::core::config::FeedConfig;
use stream_window_helper::degrade::controller::STABLE_FRAMES_TO_EXIT;
use stream_window_helper::degrade::timer::{ManualTimerDriver, TimerDriverRef};
use stream_window_helper::session::StreamSession;
use stream_window_helper::slots;
use stream_window_helper::window::record::{RowSet, TxRecord};
use stream_window_helper::window::store::{LiveWindowStore, SnapshotOptions};

fn tx(id: &str, amount: i64) -> TxRecord {
    TxRecord::payment(id, amount)
}

struct Pipeline {
    session: StreamSession<TxRecord>,
    frames: Arc<ManualFrameScheduler>,
    timers: Arc<ManualTimerDriver>,
}

fn pipeline(config: FeedConfig) -> Pipeline {
    let frames = Arc::new(ManualFrameScheduler::new());
    let timers = Arc::new(ManualTimerDriver::new());
    let session = StreamSession::new(
        config,
        FrameScheduling::Driver(Arc::clone(&frames) as Arc<_>),
        Some(Arc::clone(&timers) as TimerDriverRef),
    );
    Pipeline {
        session,
        frames,
        timers,
    }
}

#[test]
fn merge_commit_and_project_flow_end_to_end() {
    let mut p = pipeline(FeedConfig::default());

    let out = p
        .session
        .ingest_batch_at(&[tx("a", 1), tx("b", 2), tx("c", 3)], &[], 1_000);
    assert!(out.rendered);
    // Nothing is visible until the frame fires.
    assert!(p.session.primary_rows().is_empty());
    p.frames.fire_all();
    assert_eq!(p.session.primary_rows().len(), 3);
    assert_eq!(p.session.commits().selected_id().as_deref(), Some("a"));

    let slots = p.session.project_slots();
    assert_eq!(slots[0].id.as_deref(), Some("a"));
    assert_eq!(slots[2].id.as_deref(), Some("c"));
    assert!(slots[3].row.is_none());
}

#[test]
fn freshness_priority_example_from_the_merge_contract() {
    // cap=3: [03,02,01] then [04,02'] must yield [04, 02', 03].
    let mut store = LiveWindowStore::new();
    let opts = SnapshotOptions::capped(3);
    store.snapshot(&[tx("03", 3), tx("02", 2), tx("01", 1)], &opts);
    let out = store.snapshot(&[tx("04", 4), tx("02", 20)], &opts);
    let ids: Vec<&str> = out.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["04", "02", "03"]);
    assert_eq!(out.rows[1].amount_minor, 20);
}

#[test]
fn degradation_cycle_enter_throttle_flush_exit() {
    let mut p = pipeline(FeedConfig::default());

    // A lag spike enters sampling mode.
    p.session.on_frame(45.0, 1_000);
    assert!(p.session.degradation().sampling_mode);

    // Stream ten changed batches; only stride hits render immediately.
    let mut rendered = 0u32;
    for i in 0..10u64 {
        let out = p
            .session
            .ingest_batch_at(&[tx(&format!("tx-{i}"), 1)], &[], 1_000 + i);
        if out.rendered {
            rendered += 1;
        }
    }
    assert_eq!(rendered, 2); // batches 0 and 5
    p.frames.fire_all();

    // The trailing flush catches up to the full window.
    assert!(p.session.degradation().trailing_flush_scheduled);
    p.timers.fire_all();
    assert_eq!(p.session.primary_rows().len(), 10);

    // Stable frames exit sampling and disarm any pending flush.
    for i in 0..STABLE_FRAMES_TO_EXIT {
        p.session.on_frame(12.0, 2_000 + u64::from(i));
    }
    assert!(!p.session.degradation().sampling_mode);
    assert!(!p.session.degradation().trailing_flush_scheduled);
    assert_eq!(p.timers.fire_all(), 0);
}

#[test]
fn selection_and_details_survive_partial_window_turnover() {
    let mut config = FeedConfig::default();
    config.window.max_items = 3;
    let mut p = pipeline(config);
    p.session
        .ingest_batch_at(&[tx("a", 1), tx("b", 2), tx("c", 3)], &[], 1_000);
    p.frames.fire_all();

    let commits = p.session.commits();
    commits.set_selection(Some("b"));
    commits.set_detail("a", json!({"fee": 1}));
    commits.set_detail("b", json!({"fee": 2}));
    let version = commits.version();

    // The incoming batch fills the cap; "c" falls out but carried no detail.
    p.session
        .ingest_batch_at(&[tx("b", 2), tx("d", 4), tx("a", 1)], &[], 2_000);
    p.frames.fire_all();

    assert_eq!(commits.selected_id().as_deref(), Some("b"));
    assert_eq!(commits.detail("a"), Some(json!({"fee": 1})));
    assert_eq!(commits.detail("b"), Some(json!({"fee": 2})));
    // No details were pruned, so the version is untouched.
    assert_eq!(commits.version(), version);

    // Now drop "a" entirely: its detail is pruned and the version bumps.
    let out = p
        .session
        .ingest_batch_at(&[tx("b", 2), tx("d", 4), tx("e", 5)], &[], 3_000);
    assert!(out.rendered);
    p.frames.fire_all();
    assert!(commits.detail("a").is_none());
    assert_eq!(commits.version(), version + 1);
    assert_eq!(p.session.selection_index(7), Some(7)); // "b" leads the window
}

#[test]
fn age_window_expires_carried_over_records() {
    let mut config = FeedConfig::default();
    config.window.max_age_ms = Some(800);
    let mut p = pipeline(config);

    p.session
        .ingest_batch_at(&[tx("old", 1).observed_at(1_500)], &[], 1_600);
    p.frames.fire_all();
    assert_eq!(p.session.primary_rows().len(), 1);

    // At now=2600 the cutoff is 1800; the stored record fails the window.
    p.session
        .ingest_batch_at(&[tx("new", 2).observed_at(2_550)], &[], 2_600);
    p.frames.fire_all();
    let ids: Vec<String> = p
        .session
        .primary_rows()
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, vec!["new"]);
}

#[test]
fn burst_of_commits_applies_once_per_frame() {
    let frames = Arc::new(ManualFrameScheduler::new());
    let store: StreamCommitStore<TxRecord> = StreamCommitStore::new(
        FrameScheduling::Driver(Arc::clone(&frames) as Arc<_>),
        96,
    );

    let a: RowSet<TxRecord> = vec![Arc::new(tx("a", 1))].into();
    let b: RowSet<TxRecord> = vec![Arc::new(tx("b", 2))].into();
    let c: RowSet<TxRecord> = vec![Arc::new(tx("c", 3))].into();
    store.enqueue_commit(Commit::primary_only(a));
    store.enqueue_commit(Commit::primary_only(b));
    store.enqueue_commit(Commit::primary_only(c));

    assert_eq!(frames.pending(), 1);
    assert_eq!(frames.fire_all(), 1);
    assert_eq!(store.primary_rows()[0].id, "c");
}

#[test]
fn slot_model_stays_stable_across_unchanged_renders() {
    let mut p = pipeline(FeedConfig::default());
    p.session
        .ingest_batch_at(&[tx("a", 1), tx("b", 2)], &[], 1_000);
    p.frames.fire_all();

    let first = p.session.project_slots();
    // A replayed identical batch changes nothing downstream.
    p.session.ingest_batch_at(&[tx("a", 1), tx("b", 2)], &[], 1_100);
    p.frames.fire_all();
    let second = p.session.project_slots();
    assert!(std::ptr::eq(first.as_ptr(), second.as_ptr()));

    let extracted = slots::extract_rows(&second);
    assert_eq!(extracted.len(), 2);
    assert!(Arc::ptr_eq(&extracted[0], &p.session.primary_rows()[0]));
}

#[test]
fn jsonl_sink_records_degradation_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("session.jsonl");
    let mut config = FeedConfig::default();
    config.telemetry.jsonl_path = Some(log_path.clone());
    let mut p = pipeline(config);

    p.session.on_frame(45.0, 1_000); // sampling_enter
    for i in 1..=4u64 {
        p.session
            .ingest_batch_at(&[tx(&format!("tx-{i}"), 1)], &[], 1_000 + i);
    }
    let threshold = 400 * 1024 * 1024;
    p.session.record_heap_bytes(threshold + 1); // emergency_purge
    for i in 0..STABLE_FRAMES_TO_EXIT {
        p.session.on_frame(10.0, 2_000 + u64::from(i)); // sampling_exit
    }

    let file = std::fs::File::open(&log_path).expect("log exists");
    let events: Vec<String> = std::io::BufReader::new(file)
        .lines()
        .map(|line| {
            let value: serde_json::Value =
                serde_json::from_str(&line.expect("line")).expect("valid json");
            value["event"].as_str().expect("event").to_string()
        })
        .collect();
    assert_eq!(events.first().map(String::as_str), Some("session_start"));
    assert!(events.iter().any(|e| e == "sampling_enter"));
    assert!(events.iter().any(|e| e == "batch_gated"));
    assert!(events.iter().any(|e| e == "emergency_purge"));
    assert_eq!(events.last().map(String::as_str), Some("sampling_exit"));
}

#[test]
fn zero_window_cap_yields_an_empty_pipeline() {
    let mut config = FeedConfig::default();
    config.window.max_items = 0;
    let mut p = pipeline(config);
    let out = p.session.ingest_batch_at(&[tx("a", 1)], &[], 1_000);
    assert!(!out.window_changed);
    p.frames.fire_all();
    assert!(p.session.primary_rows().is_empty());
}

#[test]
fn telemetry_report_serializes_for_consumers() {
    let mut p = pipeline(FeedConfig::default());
    p.session.ingest_batch_at(&[tx("a", 1)], &[], 1_000);
    p.session.on_frame(20.0, 1_000);
    p.session.record_heap_bytes(64 * 1024 * 1024);
    let report = p.session.telemetry_report(1_500);
    let value = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(value["batches_ingested"], 1);
    assert_eq!(value["degradation"]["sampling_mode"], false);
    assert_eq!(value["heap"]["sample_count"], 1);
    assert_eq!(value["dropped_frames"]["total_frames"], 1);
}

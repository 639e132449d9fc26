use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use periodic_query::PeriodicError;
use periodic_query::config::ExportSettings;
use periodic_query::export::{ExportRecord, ExporterExecutor, ExporterState, MemoryPublisher, Publisher};
use periodic_query::results::ResultRow;
use serde_json::json;

fn row(bin: i64, obs: &str) -> ResultRow {
    let mut row = ResultRow::new();
    row.insert("periodicBinId".into(), json!(bin));
    row.insert("obs".into(), json!(obs));
    row
}

fn settings(workers: usize, queue_capacity: usize) -> ExportSettings {
    ExportSettings {
        workers,
        queue_capacity,
        max_attempts: 3,
        poll_interval_ms: 5,
    }
}

#[test]
fn rows_reach_their_topics() {
    let publisher = Arc::new(MemoryPublisher::new());
    let mut exporter = ExporterExecutor::new(publisher.clone(), settings(2, 8));
    exporter.start().expect("start");
    assert_eq!(exporter.state(), ExporterState::Running);
    exporter.submit(ExportRecord::new(row(1, "a"), "hourly")).expect("submit");
    exporter.submit(ExportRecord::new(row(1, "b"), "daily")).expect("submit");
    exporter.submit(ExportRecord::new(row(2, "c"), "hourly")).expect("submit");
    exporter.stop().expect("stop");
    assert_eq!(exporter.state(), ExporterState::Stopped);

    let mut hourly: Vec<ResultRow> = publisher
        .published("hourly")
        .iter()
        .map(|p| serde_json::from_str(p).expect("json row"))
        .collect();
    hourly.sort_by_key(|r| r["obs"].as_str().map(str::to_string));
    assert_eq!(hourly, vec![row(1, "a"), row(2, "c")]);
    assert_eq!(publisher.published("daily").len(), 1);
    assert!(publisher.published("weekly").is_empty());
}

/// Holds every publish until the gate is released.
#[derive(Default)]
struct Gated {
    gate: Mutex<()>,
    inner: MemoryPublisher,
}

impl Publisher for Gated {
    fn publish(&self, topic: &str, payload: &str) -> periodic_query::Result<()> {
        let _open = self.gate.lock()?;
        self.inner.publish(topic, payload)
    }
}

#[test]
fn a_full_queue_hands_the_record_back() {
    let gated = Arc::new(Gated::default());
    let mut exporter = ExporterExecutor::new(gated.clone(), settings(1, 1));
    exporter.start().expect("start");
    let closed = gated.gate.lock().expect("gate");
    // one record in flight and one queued at most
    let mut accepted = 0;
    let mut handed_back = None;
    for i in 0..10 {
        match exporter.try_submit(ExportRecord::new(row(i, "a"), "t")).expect("running") {
            None => accepted += 1,
            Some(record) => {
                handed_back = Some(record);
                break;
            }
        }
    }
    assert!((1..=2).contains(&accepted), "accepted {accepted}");
    assert_eq!(handed_back.expect("queue full").row, row(accepted, "a"));
    drop(closed);
    exporter.stop().expect("stop");
    assert_eq!(gated.inner.published("t").len(), accepted as usize, "queued records are drained on stop");
}

#[test]
fn records_are_refused_before_start() {
    let publisher = Arc::new(MemoryPublisher::new());
    let mut exporter = ExporterExecutor::new(publisher.clone(), settings(1, 1));
    let res = exporter.submit(ExportRecord::new(row(1, "a"), "t"));
    assert!(matches!(res, Err(PeriodicError::Export(_))));
    let res = exporter.try_submit(ExportRecord::new(row(1, "a"), "t"));
    assert!(matches!(res, Err(PeriodicError::Export(_))));
    exporter.stop().expect("nothing was accepted");
    assert!(exporter.undelivered().expect("undelivered").is_empty());
    assert!(publisher.published("t").is_empty());
}

#[test]
fn dropping_a_running_exporter_delivers_what_it_accepted() {
    let publisher = Arc::new(MemoryPublisher::new());
    {
        let mut exporter = ExporterExecutor::new(publisher.clone(), settings(2, 8));
        exporter.start().expect("start");
        for i in 0..5 {
            exporter.submit(ExportRecord::new(row(i, "a"), "t")).expect("submit");
        }
    }
    assert_eq!(publisher.published("t").len(), 5);
}

#[test]
fn stopped_exporters_refuse_work() {
    let publisher = Arc::new(MemoryPublisher::new());
    let mut exporter = ExporterExecutor::new(publisher, settings(1, 4));
    exporter.start().expect("start");
    assert!(matches!(exporter.start(), Err(PeriodicError::Export(_))));
    exporter.abort().expect("abort");
    let res = exporter.submit(ExportRecord::new(row(1, "a"), "t"));
    assert!(matches!(res, Err(PeriodicError::Export(_))));
    assert!(matches!(exporter.start(), Err(PeriodicError::Export(_))));
}

/// Fails a fixed number of times before accepting.
struct Flaky {
    failures: usize,
    calls: AtomicUsize,
    inner: MemoryPublisher,
}

impl Publisher for Flaky {
    fn publish(&self, topic: &str, payload: &str) -> periodic_query::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(PeriodicError::Export("broker unavailable".into()));
        }
        self.inner.publish(topic, payload)
    }
}

#[test]
fn failed_publishes_are_retried() {
    let flaky = Arc::new(Flaky { failures: 2, calls: AtomicUsize::new(0), inner: MemoryPublisher::new() });
    let mut exporter = ExporterExecutor::new(flaky.clone(), settings(1, 4));
    exporter.start().expect("start");
    exporter.submit(ExportRecord::new(row(1, "a"), "t")).expect("submit");
    exporter.stop().expect("stop");
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert_eq!(flaky.inner.published("t").len(), 1);
}

#[test]
fn records_that_never_publish_are_handed_back() {
    let flaky = Arc::new(Flaky { failures: usize::MAX, calls: AtomicUsize::new(0), inner: MemoryPublisher::new() });
    let mut exporter = ExporterExecutor::new(flaky.clone(), settings(1, 4));
    exporter.start().expect("start");
    exporter.submit(ExportRecord::new(row(1, "a"), "t")).expect("submit");
    exporter.submit(ExportRecord::new(row(2, "b"), "t")).expect("submit");
    let res = exporter.stop();
    assert!(matches!(res, Err(PeriodicError::Export(_))), "stop reports the loss");
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 6);
    assert!(flaky.inner.published("t").is_empty());
    let undelivered = exporter.undelivered().expect("undelivered");
    assert_eq!(
        undelivered,
        vec![ExportRecord::new(row(1, "a"), "t"), ExportRecord::new(row(2, "b"), "t")]
    );
    assert!(exporter.undelivered().expect("undelivered").is_empty(), "records are handed back once");
}

/// Takes a while per publish.
struct Slow {
    inner: MemoryPublisher,
}

impl Publisher for Slow {
    fn publish(&self, topic: &str, payload: &str) -> periodic_query::Result<()> {
        std::thread::sleep(Duration::from_millis(20));
        self.inner.publish(topic, payload)
    }
}

#[test]
fn abort_hands_back_what_is_still_queued() {
    let slow = Arc::new(Slow { inner: MemoryPublisher::new() });
    let mut exporter = ExporterExecutor::new(slow.clone(), settings(1, 8));
    exporter.start().expect("start");
    for i in 0..5 {
        exporter.submit(ExportRecord::new(row(i, "a"), "t")).expect("submit");
    }
    let res = exporter.abort();
    let undelivered = exporter.undelivered().expect("undelivered");
    assert_eq!(res.is_err(), !undelivered.is_empty());
    assert_eq!(
        slow.inner.published("t").len() + undelivered.len(),
        5,
        "every accepted record is either published or handed back"
    );
}

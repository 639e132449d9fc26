//! Threaded exporter publishing computed rows to named topics.
//!
//! Rows are accepted through a bounded queue, once the exporter is started,
//! and handed to a [`Publisher`] by a small pool of worker threads. `stop`
//! closes the queue and waits for the workers, which first publish
//! everything already accepted. `abort` stops them at the next poll instead.
//!
//! An accepted record is never dropped silently. A failed publish is retried
//! up to the configured number of attempts; a record that still fails, or
//! that is left queued by `abort`, is kept aside. `stop` and `abort` then
//! return an error with the count, and [`ExporterExecutor::undelivered`]
//! hands the records back.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ExportSettings;
use crate::error::{PeriodicError, Result};
use crate::results::ResultRow;

/// A row and the topic it is published to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    pub row: ResultRow,
    pub topic: String,
}

impl ExportRecord {
    pub fn new(row: ResultRow, topic: impl Into<String>) -> Self {
        Self { row, topic: topic.into() }
    }
}

pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// Keeps published payloads per topic.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    published: Mutex<HashMap<String, Vec<String>>>,
}
impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn published(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .map(|p| p.get(topic).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}
impl Publisher for MemoryPublisher {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.published
            .lock()?
            .entry(topic.to_string())
            .or_default()
            .push(payload.to_string());
        Ok(())
    }
}

/// Cancellation token shared with the worker threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterState {
    Created,
    Running,
    Stopped,
}

pub struct ExporterExecutor {
    publisher: Arc<dyn Publisher>,
    settings: ExportSettings,
    sender: Option<SyncSender<ExportRecord>>,
    receiver: Arc<Mutex<Receiver<ExportRecord>>>,
    undelivered: Arc<Mutex<Vec<ExportRecord>>>,
    cancel: CancelToken,
    workers: Vec<JoinHandle<()>>,
    state: ExporterState,
}

impl ExporterExecutor {
    pub fn new(publisher: Arc<dyn Publisher>, settings: ExportSettings) -> Self {
        let (sender, receiver) = mpsc::sync_channel(settings.queue_capacity);
        Self {
            publisher,
            settings,
            sender: Some(sender),
            receiver: Arc::new(Mutex::new(receiver)),
            undelivered: Arc::new(Mutex::new(Vec::new())),
            cancel: CancelToken::new(),
            workers: Vec::new(),
            state: ExporterState::Created,
        }
    }
    pub fn state(&self) -> ExporterState {
        self.state
    }
    pub fn start(&mut self) -> Result<()> {
        if self.state != ExporterState::Created {
            return Err(PeriodicError::Export(format!("cannot start an exporter that is {:?}", self.state)));
        }
        let workers = self.settings.workers.max(1);
        for worker in 0..workers {
            let receiver = Arc::clone(&self.receiver);
            let publisher = Arc::clone(&self.publisher);
            let undelivered = Arc::clone(&self.undelivered);
            let cancel = self.cancel.clone();
            let poll = Duration::from_millis(self.settings.poll_interval_ms.max(1));
            let max_attempts = self.settings.max_attempts.max(1);
            let join = std::thread::Builder::new()
                .name(format!("exporter-{}", worker))
                .spawn(move || run_worker(worker, receiver, publisher, undelivered, cancel, poll, max_attempts))
                .map_err(|e| PeriodicError::Export(e.to_string()))?;
            self.workers.push(join);
        }
        self.state = ExporterState::Running;
        info!(workers, capacity = self.settings.queue_capacity, "exporter started");
        Ok(())
    }
    // Records are only taken while workers are there to consume them.
    fn sender(&self) -> Result<&SyncSender<ExportRecord>> {
        match (&self.sender, self.state) {
            (Some(sender), ExporterState::Running) => Ok(sender),
            (_, ExporterState::Created) => Err(PeriodicError::Export("exporter is not started".into())),
            _ => Err(PeriodicError::Export("exporter is stopped".into())),
        }
    }
    /// Queues a record, waiting while the queue is full.
    pub fn submit(&self, record: ExportRecord) -> Result<()> {
        self.sender()?
            .send(record)
            .map_err(|_| PeriodicError::Export("exporter queue is closed".into()))
    }
    /// Queues a record unless the queue is full, in which case it is handed back.
    pub fn try_submit(&self, record: ExportRecord) -> Result<Option<ExportRecord>> {
        match self.sender()?.try_send(record) {
            Ok(()) => Ok(None),
            Err(TrySendError::Full(record)) => Ok(Some(record)),
            Err(TrySendError::Disconnected(_)) => Err(PeriodicError::Export("exporter queue is closed".into())),
        }
    }
    /// Closes the queue and waits until every accepted record is published.
    /// Fails when some records could not be published.
    pub fn stop(&mut self) -> Result<()> {
        self.sender.take();
        self.join()
    }
    /// Stops the workers without draining the queue. Records still queued
    /// count as undelivered.
    pub fn abort(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.sender.take();
        self.join()
    }
    /// Takes the records that were accepted but never published.
    pub fn undelivered(&self) -> Result<Vec<ExportRecord>> {
        Ok(std::mem::take(&mut *self.undelivered.lock()?))
    }
    fn join(&mut self) -> Result<()> {
        let mut panicked = 0;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                panicked += 1;
            }
        }
        self.state = ExporterState::Stopped;
        let left = {
            let mut undelivered = self.undelivered.lock()?;
            undelivered.extend(self.receiver.lock()?.try_iter());
            undelivered.len()
        };
        info!(undelivered = left, "exporter stopped");
        if panicked > 0 {
            return Err(PeriodicError::Export(format!("{} exporter workers panicked", panicked)));
        }
        if left > 0 {
            return Err(PeriodicError::Export(format!("{} accepted records were not delivered", left)));
        }
        Ok(())
    }
}

impl Drop for ExporterExecutor {
    fn drop(&mut self) {
        if self.state == ExporterState::Running {
            if let Err(e) = self.stop() {
                error!(error = %e, "exporter dropped with records it could not deliver");
            }
        }
    }
}

fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<Receiver<ExportRecord>>>,
    publisher: Arc<dyn Publisher>,
    undelivered: Arc<Mutex<Vec<ExportRecord>>>,
    cancel: CancelToken,
    poll: Duration,
    max_attempts: u32,
) {
    while !cancel.is_cancelled() {
        let next = {
            let Ok(guard) = receiver.lock() else {
                error!(worker, "exporter queue lock poisoned");
                return;
            };
            guard.recv_timeout(poll)
        };
        match next {
            Ok(record) => {
                if !deliver(worker, publisher.as_ref(), &record, max_attempts) {
                    match undelivered.lock() {
                        Ok(mut kept) => kept.push(record),
                        Err(_) => error!(worker, topic = %record.topic, "undelivered list poisoned, record lost"),
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(worker, "exporter worker finished");
}

/// Publishes one record, returning whether any attempt succeeded.
fn deliver(worker: usize, publisher: &dyn Publisher, record: &ExportRecord, max_attempts: u32) -> bool {
    let payload = match serde_json::to_string(&record.row) {
        Ok(payload) => payload,
        Err(e) => {
            error!(worker, topic = %record.topic, error = %e, "row cannot be serialized");
            return false;
        }
    };
    for attempt in 1..=max_attempts {
        match publisher.publish(&record.topic, &payload) {
            Ok(()) => return true,
            Err(e) => warn!(worker, topic = %record.topic, attempt, error = %e, "publish failed"),
        }
    }
    error!(worker, topic = %record.topic, attempts = max_attempts, "keeping undelivered record");
    false
}

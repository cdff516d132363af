//! Stub collaborators for exercising the monitoring core without PostgreSQL,
//! Redis or the remote compute service.

#![allow(dead_code)]

use aoi_watch::db::{AoiStore, ChangeRecordStore, StoreError};
use aoi_watch::models::aoi::{Aoi, AoiId};
use aoi_watch::models::change::{AnalysisWindow, ChangeRecord, ChangeResult, NewChangeRecord};
use aoi_watch::monitor::{ChangePipeline, Dispatcher, PipelineSettings, WorkerPool};
use aoi_watch::services::detector::{imagery_descriptor, ChangeDetector, DetectorError};
use aoi_watch::services::notifier::{ChangeAlert, Delivery, Notifier, NotifyError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// In-memory AOI store that records every `update_last_checked` call.
#[derive(Default)]
pub struct MemoryAoiStore {
    aois: Mutex<HashMap<AoiId, Aoi>>,
    pub last_checked_calls: Mutex<Vec<(AoiId, DateTime<Utc>)>>,
    pub fail_listing: AtomicBool,
    pub listing_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
}

impl MemoryAoiStore {
    pub fn with_aois(aois: Vec<Aoi>) -> Self {
        let store = Self::default();
        for aoi in aois {
            store.put(aoi);
        }
        store
    }

    pub fn put(&self, aoi: Aoi) {
        self.aois.lock().unwrap().insert(aoi.id, aoi);
    }

    pub fn remove(&self, id: AoiId) {
        self.aois.lock().unwrap().remove(&id);
    }

    pub fn last_checked_count(&self, id: AoiId) -> usize {
        self.last_checked_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(aoi_id, _)| *aoi_id == id)
            .count()
    }
}

#[async_trait]
impl AoiStore for MemoryAoiStore {
    async fn list_active(&self) -> Result<Vec<Aoi>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.listing_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .aois
            .lock()
            .unwrap()
            .values()
            .filter(|aoi| aoi.is_active())
            .cloned()
            .collect())
    }

    async fn get(&self, id: AoiId) -> Result<Option<Aoi>, StoreError> {
        Ok(self.aois.lock().unwrap().get(&id).cloned())
    }

    async fn update_last_checked(&self, id: AoiId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.last_checked_calls.lock().unwrap().push((id, at));
        if let Some(aoi) = self.aois.lock().unwrap().get_mut(&id) {
            aoi.last_checked_at = Some(at);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    pub records: Mutex<Vec<ChangeRecord>>,
}

impl MemoryRecordStore {
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ChangeRecordStore for MemoryRecordStore {
    async fn insert(&self, record: NewChangeRecord) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.records.lock().unwrap().push(ChangeRecord {
            id,
            aoi_id: record.aoi_id,
            user_id: record.user_id,
            detected_at: record.detected_at,
            area_sq_meters: record.area_sq_meters,
            before: record.before,
            after: record.after,
            is_read: false,
        });
        Ok(id)
    }

    async fn list_by_aoi(&self, aoi_id: AoiId) -> Result<Vec<ChangeRecord>, StoreError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.aoi_id == aoi_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(records)
    }
}

/// How the stub detector answers.
#[derive(Debug, Clone, Copy)]
pub enum DetectorBehavior {
    NoChange,
    Change { area_sq_meters: f64 },
    Fail,
    Panic,
}

/// Scripted detector that tracks call counts and concurrency.
pub struct StubDetector {
    behavior: Mutex<DetectorBehavior>,
    delay: Duration,
    pub calls: AtomicUsize,
    pub calls_by_aoi: Mutex<HashMap<String, usize>>,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl StubDetector {
    pub fn new(behavior: DetectorBehavior) -> Self {
        Self::with_delay(behavior, Duration::ZERO)
    }

    pub fn with_delay(behavior: DetectorBehavior, delay: Duration) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            delay,
            calls: AtomicUsize::new(0),
            calls_by_aoi: Mutex::new(HashMap::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: DetectorBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeDetector for StubDetector {
    async fn detect(
        &self,
        geometry: &serde_json::Value,
        baseline: AnalysisWindow,
        recent: AnalysisWindow,
    ) -> Result<ChangeResult, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_aoi
            .lock()
            .unwrap()
            .entry(geometry.to_string())
            .or_default() += 1;

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let behavior = *self.behavior.lock().unwrap();
        let (significant, area) = match behavior {
            DetectorBehavior::NoChange => (false, 120.0),
            DetectorBehavior::Change { area_sq_meters } => (true, area_sq_meters),
            DetectorBehavior::Fail => {
                return Err(DetectorError::Remote {
                    status: 503,
                    message: "quota exceeded".to_string(),
                })
            }
            DetectorBehavior::Panic => panic!("detector crashed"),
        };

        Ok(ChangeResult {
            significant_change_detected: significant,
            area_sq_meters: area,
            before: imagery_descriptor(geometry, baseline),
            after: imagery_descriptor(geometry, recent),
        })
    }
}

/// Notifier that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Option<String>, ChangeAlert)>>,
    pub fail: AtomicBool,
    /// Never answer, like a provider that accepted the connection and went quiet.
    pub hang: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn hanging() -> Self {
        let notifier = Self::default();
        notifier.hang.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: Option<&str>, alert: &ChangeAlert) -> Result<Delivery, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.map(str::to_string), alert.clone()));
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 500,
                message: "provider down".to_string(),
            });
        }
        Ok(Delivery::Sent)
    }
}

pub fn settings() -> PipelineSettings {
    let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
    PipelineSettings {
        baseline: AnalysisWindow::new(d(2019, 1, 8), d(2023, 3, 14)),
        recent: AnalysisWindow::new(d(2024, 11, 1), d(2025, 4, 30)),
        detector_timeout: Duration::from_secs(5),
        notify_timeout: Duration::from_secs(5),
    }
}

/// Everything a test needs to drive and observe the core.
pub struct Harness {
    pub aois: Arc<MemoryAoiStore>,
    pub detector: Arc<StubDetector>,
    pub records: Arc<MemoryRecordStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub pipeline: Arc<ChangePipeline>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Harness {
    pub fn new(aois: MemoryAoiStore, detector: StubDetector, notifier: RecordingNotifier) -> Self {
        Self::build(aois, detector, notifier, settings(), 4)
    }

    pub fn build(
        aois: MemoryAoiStore,
        detector: StubDetector,
        notifier: RecordingNotifier,
        settings: PipelineSettings,
        max_concurrent: usize,
    ) -> Self {
        let aois = Arc::new(aois);
        let detector = Arc::new(detector);
        let records = Arc::new(MemoryRecordStore::default());
        let notifier = Arc::new(notifier);

        let pipeline = Arc::new(ChangePipeline::new(
            aois.clone(),
            detector.clone(),
            records.clone(),
            notifier.clone(),
            settings,
        ));
        let dispatcher = Arc::new(Dispatcher::new(WorkerPool::new(pipeline.clone(), max_concurrent)));

        Self {
            aois,
            detector,
            records,
            notifier,
            pipeline,
            dispatcher,
        }
    }

    /// Wait for all in-flight checks, failing the test if they hang.
    pub async fn drain(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.dispatcher.wait_idle())
            .await
            .expect("checks did not finish in time");
    }
}

//! Persistent state coordinator.
//!
//! Single owner of the in-memory mirror of flows, reports, running-test
//! markers, schedules and settings. Every mutation goes through a method
//! here, mutates the mirror first, then persists the whole collection to
//! durable storage. A mutation observed to originate outside this process
//! triggers a full reload of every tracked collection, discarding local
//! unpersisted state (last-writer-wins).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::flows::FlowStore;
use super::reports::ReportStore;
use super::storage::{StorageBackend, StorageKey};
use crate::error::StepflowError;
use crate::model::{FlowPatch, TestFlow, TestReport};
use crate::runner::registry::{RunRegistry, RunningTestEntry};

#[derive(Default)]
struct InMemory {
    flows: FlowStore,
    reports: ReportStore,
    registry: RunRegistry,
    schedules: Value,
    settings: HashMap<String, Value>,
}

pub struct StateCoordinator {
    storage: Arc<dyn StorageBackend>,
    state: Mutex<InMemory>,
    is_loading: AtomicBool,
    load_error: Mutex<Option<String>>,
    last_updated: Mutex<Option<DateTime<Utc>>>,
}

impl StateCoordinator {
    /// Create the coordinator and perform the initial load.
    pub fn load(storage: Arc<dyn StorageBackend>) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            storage,
            state: Mutex::new(InMemory::default()),
            is_loading: AtomicBool::new(true),
            load_error: Mutex::new(None),
            last_updated: Mutex::new(None),
        });
        coordinator.reload();
        coordinator
    }

    /// Replace the in-memory mirror with whatever durable storage holds.
    pub fn reload(&self) {
        match self.read_all() {
            Ok(fresh) => {
                *self.state.lock().unwrap() = fresh;
                *self.load_error.lock().unwrap() = None;
                *self.last_updated.lock().unwrap() = Some(Utc::now());
                self.is_loading.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                log::warn!("state load failed: {}", e);
                *self.load_error.lock().unwrap() = Some(e.to_string());
                self.is_loading.store(false, Ordering::SeqCst);
            }
        }
    }

    fn read_all(&self) -> Result<InMemory, StepflowError> {
        let flows: Vec<TestFlow> = self.read_collection(StorageKey::SavedTestFlows)?;
        let reports: Vec<TestReport> = self.read_collection(StorageKey::TestReports)?;
        let running: Vec<RunningTestEntry> =
            self.read_collection(StorageKey::ActiveRunningTests)?;
        let schedules = self
            .storage
            .read(StorageKey::ScheduledTests)?
            .unwrap_or(Value::Array(Vec::new()));
        let settings: HashMap<String, Value> = self.read_collection(StorageKey::UserSettings)?;

        Ok(InMemory {
            flows: FlowStore::from_flows(flows),
            reports: ReportStore::from_reports(reports),
            registry: RunRegistry::from_entries(running),
            schedules,
            settings,
        })
    }

    fn read_collection<T>(&self, key: StorageKey) -> Result<T, StepflowError>
    where
        T: Default + serde::de::DeserializeOwned,
    {
        match self.storage.read(key)? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                StepflowError::persistence(format!("corrupt {} document: {}", key, e))
            }),
            None => Ok(T::default()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    pub fn load_error(&self) -> Option<String> {
        self.load_error.lock().unwrap().clone()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.lock().unwrap()
    }

    // Flows

    pub fn flows(&self) -> Vec<TestFlow> {
        self.state.lock().unwrap().flows.list().to_vec()
    }

    pub fn flow_by_id(&self, id: &str) -> Option<TestFlow> {
        self.state.lock().unwrap().flows.get_by_id(id).cloned()
    }

    pub fn flow_by_name(&self, name: &str) -> Option<TestFlow> {
        self.state.lock().unwrap().flows.get_by_name(name).cloned()
    }

    pub fn add_flow(&self, flow: TestFlow) -> TestFlow {
        let (flow, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let flow = state.flows.add(flow);
            (flow, snapshot(StorageKey::SavedTestFlows, state.flows.list()))
        };
        self.persist(StorageKey::SavedTestFlows, snapshot);
        flow
    }

    pub fn update_flow(&self, id: &str, patch: FlowPatch) -> Option<TestFlow> {
        let (updated, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let updated = state.flows.update(id, patch);
            if updated.is_none() {
                return None;
            }
            (updated, snapshot(StorageKey::SavedTestFlows, state.flows.list()))
        };
        self.persist(StorageKey::SavedTestFlows, snapshot);
        updated
    }

    pub fn remove_flow(&self, id: &str) -> bool {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            if !state.flows.remove(id) {
                return false;
            }
            snapshot(StorageKey::SavedTestFlows, state.flows.list())
        };
        self.persist(StorageKey::SavedTestFlows, snapshot);
        true
    }

    // Reports

    pub fn reports(&self) -> Vec<TestReport> {
        self.state.lock().unwrap().reports.list().to_vec()
    }

    pub fn report_by_id(&self, id: &str) -> Option<TestReport> {
        self.state.lock().unwrap().reports.get_by_id(id).cloned()
    }

    /// Append a report. The in-memory append always succeeds and the
    /// returned report is usable for the current session even when the
    /// durable write fails.
    pub fn append_report(&self, report: TestReport) -> TestReport {
        let (report, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let report = state.reports.append(report);
            (report, snapshot(StorageKey::TestReports, state.reports.list()))
        };
        self.persist(StorageKey::TestReports, snapshot);
        report
    }

    // Running-test markers

    pub fn register_run(&self, id: &str, name: &str, now: DateTime<Utc>) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.registry.register(id, name, now);
            snapshot(StorageKey::ActiveRunningTests, state.registry.entries())
        };
        self.persist(StorageKey::ActiveRunningTests, snapshot);
    }

    pub fn unregister_run(&self, id: &str) -> bool {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            if !state.registry.unregister(id) {
                return false;
            }
            snapshot(StorageKey::ActiveRunningTests, state.registry.entries())
        };
        self.persist(StorageKey::ActiveRunningTests, snapshot);
        true
    }

    pub fn running(&self, now: DateTime<Utc>) -> Vec<RunningTestEntry> {
        self.state.lock().unwrap().registry.list_live(now)
    }

    /// Drop expired markers. The retained set is computed in full under
    /// the lock before anything is persisted, so a registration racing the
    /// sweep is never lost.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let (removed, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let removed = state.registry.sweep_expired(now);
            if removed == 0 {
                return 0;
            }
            (removed, snapshot(StorageKey::ActiveRunningTests, state.registry.entries()))
        };
        self.persist(StorageKey::ActiveRunningTests, snapshot);
        removed
    }

    // Settings and schedules

    pub fn settings(&self) -> HashMap<String, Value> {
        self.state.lock().unwrap().settings.clone()
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.state.lock().unwrap().settings.get(key).cloned()
    }

    pub fn set_setting(&self, key: impl Into<String>, value: Value) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.settings.insert(key.into(), value);
            snapshot(StorageKey::UserSettings, &state.settings)
        };
        self.persist(StorageKey::UserSettings, snapshot);
    }

    pub fn schedules(&self) -> Value {
        self.state.lock().unwrap().schedules.clone()
    }

    fn persist(&self, key: StorageKey, snapshot: Option<Value>) {
        let value = match snapshot {
            Some(value) => value,
            None => return,
        };
        if let Err(e) = self.storage.write(key, &value) {
            log::warn!(
                "{} not persisted: {} (in-memory state remains authoritative)",
                key,
                e
            );
        }
    }

    /// React to mutations made by other processes: any tracked key
    /// changing reloads every collection.
    pub fn spawn_watch(self: Arc<Self>) -> JoinHandle<()> {
        let coordinator = self;
        let mut changes = coordinator.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(key) => {
                        log::debug!("{} changed externally, reloading state", key);
                        coordinator.reload();
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => coordinator.reload(),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Periodic TTL sweep, independent of any individual run's lifecycle.
    pub fn spawn_sweeper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        let coordinator = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = coordinator.sweep_expired(Utc::now());
                if removed > 0 {
                    log::info!("swept {} expired running-test markers", removed);
                }
            }
        })
    }
}

fn snapshot<T: Serialize + ?Sized>(key: StorageKey, value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("cannot serialize {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlowStatus, RunStatus, Step, StepKind};
    use crate::store::storage::MemoryStorage;
    use serde_json::json;

    fn flow(name: &str) -> TestFlow {
        let steps = vec![Step::new(StepKind::Refresh, "reload")];
        TestFlow::new(name, steps, "chromium")
    }

    fn report(name: &str) -> TestReport {
        TestReport {
            id: String::new(),
            test_name: name.to_string(),
            status: RunStatus::Success,
            duration: "1s".to_string(),
            total_steps: 1,
            passed_steps: 1,
            completed_steps: 1,
            trigger: "manual".to_string(),
            results: Vec::new(),
            timestamp: None,
        }
    }

    #[test]
    fn test_load_reads_existing_collections() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write(
                StorageKey::SavedTestFlows,
                &serde_json::to_value(vec![flow("Seeded")]).unwrap(),
            )
            .unwrap();

        let coordinator = StateCoordinator::load(storage);
        assert!(!coordinator.is_loading());
        assert!(coordinator.load_error().is_none());
        assert!(coordinator.last_updated().is_some());
        assert_eq!(coordinator.flows().len(), 1);
        assert_eq!(coordinator.flows()[0].name, "Seeded");
    }

    #[test]
    fn test_load_failure_sets_sticky_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write(StorageKey::SavedTestFlows, &json!({"not": "a list"}))
            .unwrap();

        let coordinator = StateCoordinator::load(storage);
        assert!(!coordinator.is_loading());
        assert!(coordinator.load_error().is_some());
        assert!(coordinator.flows().is_empty());
    }

    #[test]
    fn test_mutations_persist_whole_collections() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = StateCoordinator::load(storage.clone());

        let added = coordinator.add_flow(flow("Login"));
        coordinator.update_flow(&added.id, FlowPatch::status(FlowStatus::Success));

        let doc = storage.document(StorageKey::SavedTestFlows).unwrap();
        let persisted: Vec<TestFlow> = serde_json::from_value(doc).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].status, FlowStatus::Success);

        coordinator.remove_flow(&added.id);
        let doc = storage.document(StorageKey::SavedTestFlows).unwrap();
        let persisted: Vec<TestFlow> = serde_json::from_value(doc).unwrap();
        assert!(persisted.is_empty());
    }

    #[test]
    fn test_external_change_reload_discards_local_state() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = StateCoordinator::load(storage.clone());

        coordinator.add_flow(flow("Local"));
        assert_eq!(coordinator.flows().len(), 1);

        // Another process rewrites the collection wholesale.
        storage.inject_external(
            StorageKey::SavedTestFlows,
            serde_json::to_value(vec![flow("Theirs-1"), flow("Theirs-2")]).unwrap(),
        );
        coordinator.reload();

        let names: Vec<String> = coordinator.flows().iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["Theirs-1", "Theirs-2"]);
    }

    #[tokio::test]
    async fn test_watch_reloads_on_external_signal() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = StateCoordinator::load(storage.clone());
        let handle = coordinator.clone().spawn_watch();

        storage.inject_external(
            StorageKey::TestReports,
            serde_json::to_value(vec![report("From another viewer")]).unwrap(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(coordinator.reports().len(), 1);
        assert_eq!(coordinator.reports()[0].test_name, "From another viewer");
        handle.abort();
    }

    #[test]
    fn test_sweep_persists_retained_set() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = StateCoordinator::load(storage.clone());
        let now = Utc::now();

        coordinator.register_run("old", "Stale Flow", now - chrono::Duration::seconds(600));
        coordinator.register_run("new", "Fresh Flow", now);

        assert_eq!(coordinator.sweep_expired(now), 1);
        assert_eq!(coordinator.sweep_expired(now), 0);

        let doc = storage.document(StorageKey::ActiveRunningTests).unwrap();
        let persisted: Vec<RunningTestEntry> = serde_json::from_value(doc).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, "new");
    }

    #[test]
    fn test_settings_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let coordinator = StateCoordinator::load(storage.clone());

        coordinator.set_setting("notifications", json!(true));
        assert_eq!(coordinator.setting("notifications"), Some(json!(true)));

        let doc = storage.document(StorageKey::UserSettings).unwrap();
        assert_eq!(doc.get("notifications"), Some(&json!(true)));
    }

    /// Storage whose writes always fail.
    struct BrokenStorage {
        inner: MemoryStorage,
    }

    impl StorageBackend for BrokenStorage {
        fn read(&self, key: StorageKey) -> Result<Option<Value>, StepflowError> {
            self.inner.read(key)
        }

        fn write(&self, _key: StorageKey, _value: &Value) -> Result<(), StepflowError> {
            Err(StepflowError::persistence("disk full"))
        }

        fn subscribe(&self) -> broadcast::Receiver<StorageKey> {
            self.inner.subscribe()
        }
    }

    #[test]
    fn test_append_survives_persistence_failure() {
        let storage = Arc::new(BrokenStorage {
            inner: MemoryStorage::new(),
        });
        let coordinator = StateCoordinator::load(storage);

        let appended = coordinator.append_report(report("Durability optional"));
        assert!(!appended.id.is_empty());
        assert_eq!(coordinator.reports().len(), 1);
        assert_eq!(coordinator.reports()[0].test_name, "Durability optional");
    }
}

//! Reactive metadata store
//!
//! A collection of [`MetadataRecord`]s keyed by name, persisted through a
//! [`StoreBackend`] under a namespace derived from the schema fingerprint.
//! Live queries receive the full sorted result set once on subscription and
//! again after every mutation.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::domain::recording::{InvalidRecord, MetadataRecord, SortKey};
use crate::domain::schema::{ConflictPolicy, SchemaFingerprint};

use super::ports::{BackendError, StoreBackend};

/// Metadata store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Schema conflict in {namespace}: {message}")]
    SchemaConflict { namespace: String, message: String },

    #[error("A record named \"{0}\" already exists")]
    DuplicateKey(String),

    #[error("No record named \"{0}\"")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    Invalid(#[from] InvalidRecord),

    #[error("Failed to persist metadata: {0}")]
    Persistence(String),
}

/// One immutable emission of a live query
pub type Snapshot = Arc<Vec<MetadataRecord>>;

/// Namespace key for a base name and schema fingerprint
pub fn namespace_for(base_name: &str, fingerprint: SchemaFingerprint) -> String {
    format!("{}_version_{}", base_name, fingerprint)
}

struct Subscriber {
    sort_key: SortKey,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct StoreInner {
    records: BTreeMap<String, MetadataRecord>,
    subscribers: Vec<Subscriber>,
}

impl StoreInner {
    fn sorted(&self, sort_key: SortKey) -> Vec<MetadataRecord> {
        let mut records: Vec<MetadataRecord> = self.records.values().cloned().collect();
        sort_key.sort(&mut records);
        records
    }

    fn records_vec(&self) -> Vec<MetadataRecord> {
        self.records.values().cloned().collect()
    }

    /// Push the current result set to every subscriber, dropping cancelled ones
    fn emit(&mut self) {
        let mut by_key: Vec<(SortKey, Snapshot)> = Vec::new();
        let records = &self.records;

        self.subscribers.retain(|sub| {
            if sub.tx.is_closed() {
                return false;
            }
            let snapshot = match by_key.iter().find(|(key, _)| *key == sub.sort_key) {
                Some((_, snapshot)) => Arc::clone(snapshot),
                None => {
                    let mut sorted: Vec<MetadataRecord> = records.values().cloned().collect();
                    sub.sort_key.sort(&mut sorted);
                    let snapshot: Snapshot = Arc::new(sorted);
                    by_key.push((sub.sort_key, Arc::clone(&snapshot)));
                    snapshot
                }
            };
            sub.tx.send(snapshot).is_ok()
        });
    }
}

/// Subscription to the sorted contents of the store.
///
/// Dropping the query or calling [`LiveQuery::cancel`] ends it.
pub struct LiveQuery {
    sort_key: SortKey,
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl LiveQuery {
    /// Sort key of this query
    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    /// Wait for the next emission.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Take an emission that is already pending, without waiting
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    /// Skip to the most recent pending emission
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut last = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            last = Some(snapshot);
        }
        last
    }

    /// Stop receiving emissions
    pub fn cancel(mut self) {
        self.rx.close();
    }
}

/// Key persisted records by name, keeping the first of any duplicates
fn index_records(records: Vec<MetadataRecord>) -> BTreeMap<String, MetadataRecord> {
    let mut map = BTreeMap::new();
    for record in records {
        if map.contains_key(&record.name) {
            warn!(name = %record.name, "Skipping duplicate record in persisted store");
            continue;
        }
        map.insert(record.name.clone(), record);
    }
    map
}

/// Reactive, schema-namespaced metadata collection
pub struct MetadataStore {
    backend: Arc<dyn StoreBackend>,
    namespace: String,
    fingerprint: SchemaFingerprint,
    inner: Mutex<StoreInner>,
}

impl MetadataStore {
    /// Open (or create) the namespace for `base_name` under `fingerprint`.
    ///
    /// If the persisted namespace conflicts with the schema, the policy
    /// decides: `Rebuild` destroys it and starts empty, `Fail` returns
    /// `SchemaConflict`.
    pub async fn open(
        backend: Arc<dyn StoreBackend>,
        base_name: &str,
        fingerprint: SchemaFingerprint,
        policy: ConflictPolicy,
    ) -> Result<Self, StoreError> {
        let namespace = namespace_for(base_name, fingerprint);

        let records = match backend.load(&namespace, fingerprint).await {
            Ok(Some(records)) => records,
            Ok(None) => {
                info!(namespace = %namespace, "Creating metadata store");
                Vec::new()
            }
            Err(BackendError::Conflict(message)) => {
                if policy == ConflictPolicy::Fail {
                    return Err(StoreError::SchemaConflict { namespace, message });
                }
                warn!(
                    namespace = %namespace,
                    reason = %message,
                    "Schema conflict: destroying metadata store and starting empty"
                );
                backend
                    .destroy(&namespace)
                    .await
                    .map_err(|e| StoreError::Persistence(e.to_string()))?;
                Vec::new()
            }
            Err(BackendError::Io(message)) => return Err(StoreError::Persistence(message)),
        };

        let map = index_records(records);
        info!(namespace = %namespace, records = map.len(), "Opened metadata store");

        Ok(Self {
            backend,
            namespace,
            fingerprint,
            inner: Mutex::new(StoreInner {
                records: map,
                subscribers: Vec::new(),
            }),
        })
    }

    /// Namespace key this store lives under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Schema fingerprint this store was opened with
    pub fn fingerprint(&self) -> SchemaFingerprint {
        self.fingerprint
    }

    async fn persist(&self, inner: &StoreInner) -> Result<(), StoreError> {
        self.backend
            .save(&self.namespace, self.fingerprint, &inner.records_vec())
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))
    }

    /// Insert a new record.
    ///
    /// Fails with `DuplicateKey` if a record with the same name exists.
    pub async fn insert(&self, record: MetadataRecord) -> Result<(), StoreError> {
        record.validate()?;

        let mut inner = self.inner.lock().await;
        if inner.records.contains_key(&record.name) {
            return Err(StoreError::DuplicateKey(record.name));
        }

        let name = record.name.clone();
        inner.records.insert(name.clone(), record);
        if let Err(e) = self.persist(&inner).await {
            inner.records.remove(&name);
            return Err(e);
        }

        debug!(name = %name, "Inserted metadata record");
        inner.emit();
        Ok(())
    }

    /// Replace an existing record with the same name
    pub async fn update(&self, record: MetadataRecord) -> Result<(), StoreError> {
        record.validate()?;

        let mut inner = self.inner.lock().await;
        let Some(previous) = inner.records.insert(record.name.clone(), record.clone()) else {
            inner.records.remove(&record.name);
            return Err(StoreError::NotFound(record.name));
        };

        if let Err(e) = self.persist(&inner).await {
            inner.records.insert(previous.name.clone(), previous);
            return Err(e);
        }

        debug!(name = %record.name, "Updated metadata record");
        inner.emit();
        Ok(())
    }

    /// Remove a record by name.
    ///
    /// # Returns
    /// The removed record, or `NotFound` if it was already absent
    pub async fn remove(&self, name: &str) -> Result<MetadataRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(removed) = inner.records.remove(name) else {
            return Err(StoreError::NotFound(name.to_string()));
        };

        if let Err(e) = self.persist(&inner).await {
            inner.records.insert(removed.name.clone(), removed);
            return Err(e);
        }

        debug!(name = %name, "Removed metadata record");
        inner.emit();
        Ok(removed)
    }

    /// Look up a record by name
    pub async fn get(&self, name: &str) -> Option<MetadataRecord> {
        self.inner.lock().await.records.get(name).cloned()
    }

    /// One-shot read of all records
    pub async fn snapshot(&self, sort_key: SortKey) -> Vec<MetadataRecord> {
        self.inner.lock().await.sorted(sort_key)
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Whether the store has no records
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe to all records sorted ascending by `sort_key`.
    ///
    /// The current result set is delivered immediately.
    pub async fn query_all(&self, sort_key: SortKey) -> LiveQuery {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;

        // Receiver is alive, the initial send cannot fail
        let _ = tx.send(Arc::new(inner.sorted(sort_key)));
        inner.subscribers.push(Subscriber { sort_key, tx });

        LiveQuery { sort_key, rx }
    }

    /// Re-deliver the current result set to every live query
    pub async fn refresh(&self) {
        self.inner.lock().await.emit();
    }

    /// Re-read the namespace from the backend to pick up writes made by
    /// another process.
    ///
    /// # Returns
    /// Whether the contents changed; live queries are notified only then
    pub async fn reload(&self) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let records = match self.backend.load(&self.namespace, self.fingerprint).await {
            Ok(records) => records.unwrap_or_default(),
            Err(BackendError::Conflict(message)) => {
                return Err(StoreError::SchemaConflict {
                    namespace: self.namespace.clone(),
                    message,
                })
            }
            Err(BackendError::Io(message)) => return Err(StoreError::Persistence(message)),
        };

        let records = index_records(records);
        if records == inner.records {
            return Ok(false);
        }

        debug!(namespace = %self.namespace, records = records.len(), "Reloaded metadata store");
        inner.records = records;
        inner.emit();
        Ok(true)
    }

    /// Number of live queries that have not been cancelled
    pub async fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.subscribers.retain(|sub| !sub.tx.is_closed());
        inner.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::SchemaDescriptor;
    use crate::infrastructure::metadata::MemoryStoreBackend;

    fn fingerprint() -> SchemaFingerprint {
        SchemaFingerprint::of(&SchemaDescriptor::audio())
    }

    fn record(name: &str) -> MetadataRecord {
        MetadataRecord::recording(name, "test", "2024-01-01T00:00:00Z")
    }

    fn names(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.iter().map(|r| r.name.as_str()).collect()
    }

    async fn open(backend: Arc<MemoryStoreBackend>) -> MetadataStore {
        MetadataStore::open(backend, "audioDB", fingerprint(), ConflictPolicy::Rebuild)
            .await
            .unwrap()
    }

    #[test]
    fn namespace_includes_fingerprint() {
        let fp = fingerprint();
        assert_eq!(namespace_for("audioDB", fp), format!("audioDB_version_{}", fp));
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        assert_eq!(store.get("a").await, Some(record("a")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_insert_fails() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        let err = store.insert(record("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(name) if name == "a"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn invalid_record_is_rejected() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        let err = store.insert(record("")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remove_missing_fails_with_not_found() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        store.remove("a").await.unwrap();
        let err = store.remove("a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(name) if name == "a"));
    }

    #[tokio::test]
    async fn update_missing_fails_with_not_found() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        let err = store.update(record("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn update_replaces_record() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        store.update(record("a").completed()).await.unwrap();
        assert!(!store.get("a").await.unwrap().is_recording());
    }

    #[tokio::test]
    async fn live_query_emits_initial_snapshot() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("x")).await.unwrap();

        let mut query = store.query_all(SortKey::Name).await;
        let initial = query.try_next().unwrap();
        assert_eq!(names(&initial), vec!["x"]);
        assert!(query.try_next().is_none());
    }

    #[tokio::test]
    async fn live_query_emits_once_per_mutation_in_name_order() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        let mut query = store.query_all(SortKey::Name).await;

        store.insert(record("a")).await.unwrap();
        store.insert(record("c")).await.unwrap();
        store.insert(record("b")).await.unwrap();

        let emissions: Vec<Snapshot> = std::iter::from_fn(|| query.try_next()).collect();
        assert_eq!(emissions.len(), 4);
        assert!(emissions[0].is_empty());
        assert_eq!(names(&emissions[1]), vec!["a"]);
        assert_eq!(names(&emissions[2]), vec!["a", "c"]);
        assert_eq!(names(&emissions[3]), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn removal_re_emits() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        store.insert(record("b")).await.unwrap();

        let mut query = store.query_all(SortKey::Name).await;
        store.remove("a").await.unwrap();

        let latest = query.latest().unwrap();
        assert_eq!(names(&latest), vec!["b"]);
    }

    #[tokio::test]
    async fn failed_mutation_does_not_emit() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        let mut query = store.query_all(SortKey::Name).await;
        query.try_next().unwrap();

        assert!(store.insert(record("a")).await.is_err());
        assert!(store.remove("zzz").await.is_err());
        assert!(query.try_next().is_none());
    }

    #[tokio::test]
    async fn refresh_re_emits_unchanged_set() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        store.insert(record("a")).await.unwrap();
        let mut query = store.query_all(SortKey::Name).await;
        query.try_next().unwrap();

        store.refresh().await;
        assert_eq!(names(&query.try_next().unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn subscribers_with_different_keys_get_their_order() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        let mut by_name = store.query_all(SortKey::Name).await;
        let mut by_created = store.query_all(SortKey::CreatedAt).await;

        store
            .insert(MetadataRecord::recording("a", "", "2024-03-01"))
            .await
            .unwrap();
        store
            .insert(MetadataRecord::recording("b", "", "2024-01-01"))
            .await
            .unwrap();

        assert_eq!(names(&by_name.latest().unwrap()), vec!["a", "b"]);
        assert_eq!(names(&by_created.latest().unwrap()), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn cancelled_queries_are_pruned() {
        let store = open(Arc::new(MemoryStoreBackend::new())).await;
        let first = store.query_all(SortKey::Name).await;
        let _second = store.query_all(SortKey::Name).await;
        assert_eq!(store.subscriber_count().await, 2);

        first.cancel();
        store.insert(record("a")).await.unwrap();
        assert_eq!(store.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let backend = Arc::new(MemoryStoreBackend::new());
        {
            let store = open(Arc::clone(&backend)).await;
            store.insert(record("kept")).await.unwrap();
        }
        let store = open(backend).await;
        assert_eq!(store.get("kept").await, Some(record("kept")));
    }

    #[tokio::test]
    async fn different_fingerprints_are_isolated() {
        let backend = Arc::new(MemoryStoreBackend::new());
        let first = MetadataStore::open(
            backend.clone(),
            "audioDB",
            "00000001".parse().unwrap(),
            ConflictPolicy::Rebuild,
        )
        .await
        .unwrap();
        first.insert(record("old")).await.unwrap();

        let second = MetadataStore::open(
            backend,
            "audioDB",
            "00000002".parse().unwrap(),
            ConflictPolicy::Rebuild,
        )
        .await
        .unwrap();
        assert!(second.is_empty().await);
        assert_ne!(first.namespace(), second.namespace());
    }

    #[tokio::test]
    async fn conflict_with_rebuild_policy_starts_empty() {
        let backend = Arc::new(MemoryStoreBackend::new());
        let namespace = namespace_for("audioDB", fingerprint());
        backend.corrupt(&namespace);

        let store = open(Arc::clone(&backend)).await;
        assert!(store.is_empty().await);
        assert!(!backend.is_corrupt(&namespace));
    }

    #[tokio::test]
    async fn conflict_with_fail_policy_surfaces_error() {
        let backend = Arc::new(MemoryStoreBackend::new());
        let namespace = namespace_for("audioDB", fingerprint());
        backend.corrupt(&namespace);

        let result =
            MetadataStore::open(backend.clone(), "audioDB", fingerprint(), ConflictPolicy::Fail)
                .await;
        assert!(matches!(result, Err(StoreError::SchemaConflict { .. })));
        assert!(backend.is_corrupt(&namespace));
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back_insert() {
        let backend = Arc::new(MemoryStoreBackend::new());
        let store = open(Arc::clone(&backend)).await;
        let mut query = store.query_all(SortKey::Name).await;
        query.try_next().unwrap();

        backend.fail_writes(true);
        let err = store.insert(record("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.get("a").await.is_none());
        assert!(query.try_next().is_none());
    }

    #[tokio::test]
    async fn reload_picks_up_writes_from_another_handle() {
        let backend = Arc::new(MemoryStoreBackend::new());
        let reader = open(Arc::clone(&backend)).await;
        let writer = open(Arc::clone(&backend)).await;
        let mut query = reader.query_all(SortKey::Name).await;
        query.try_next().unwrap();

        assert!(!reader.reload().await.unwrap());
        assert!(query.try_next().is_none());

        writer.insert(record("elsewhere")).await.unwrap();
        assert!(reader.reload().await.unwrap());

        let snapshot = query.try_next().unwrap();
        assert_eq!(names(&snapshot), vec!["elsewhere"]);
    }
}

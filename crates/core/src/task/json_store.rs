//! JSON-file-backed task store implementation.
//!
//! The entire task map lives in one JSON file, rewritten on every mutation
//! via write-to-temp-then-rename. A bounded LRU cache accelerates reads; the
//! file is the source of truth and evicted records are reloaded lazily on a
//! cache miss. After a failed flush the cache is ahead of the file, so reads
//! prefer the cache - read-after-write holds within the process even when
//! durability does not.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::retry::{retry, with_deadline, RetryPolicy};

use super::{
    is_valid_transition, StatusUpdate, Task, TaskStatus, TaskStore, TaskStoreError,
};

const DEFAULT_CACHE_CAPACITY: usize = 256;
const PERSIST_MAX_ATTEMPTS: u32 = 3;
const PERSIST_BACKOFF: Duration = Duration::from_millis(100);
const PERSIST_DEADLINE: Duration = Duration::from_secs(2);

/// Tuning knobs for [`JsonTaskStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Maximum number of task records held in the in-memory cache.
    pub cache_capacity: usize,
    /// Retry policy for the durable write.
    pub persist_policy: RetryPolicy,
    /// Deadline applied to each persistence attempt.
    pub persist_deadline: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            persist_policy: RetryPolicy::fixed(PERSIST_MAX_ATTEMPTS, PERSIST_BACKOFF),
            persist_deadline: PERSIST_DEADLINE,
        }
    }
}

/// Bounded cache slot with a last-access stamp for LRU eviction.
#[derive(Debug, Clone)]
struct CacheSlot {
    task: Task,
    last_access: u64,
}

/// Hand-rolled LRU over a HashMap: a monotonic tick stamps every access,
/// eviction removes the oldest slots once capacity is exceeded.
#[derive(Debug)]
struct Cache {
    capacity: usize,
    tick: u64,
    slots: HashMap<String, CacheSlot>,
}

impl Cache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            slots: HashMap::new(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, id: &str) -> Option<Task> {
        let tick = self.next_tick();
        let slot = self.slots.get_mut(id)?;
        slot.last_access = tick;
        Some(slot.task.clone())
    }

    fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    fn insert(&mut self, task: Task) {
        let tick = self.next_tick();
        self.slots.insert(
            task.id.clone(),
            CacheSlot {
                task,
                last_access: tick,
            },
        );
        self.evict_lru();
    }

    /// Evict least recently used slots while over capacity.
    fn evict_lru(&mut self) {
        if self.slots.len() <= self.capacity {
            return;
        }

        let mut candidates: Vec<(String, u64)> = self
            .slots
            .iter()
            .map(|(id, slot)| (id.clone(), slot.last_access))
            .collect();
        candidates.sort_by_key(|(_, last_access)| *last_access);

        let num_to_evict = self.slots.len() - self.capacity;
        for (id, _) in candidates.into_iter().take(num_to_evict) {
            self.slots.remove(&id);
            debug!(task_id = %id, "evicted task from cache");
        }
    }

    /// Current cache contents, id -> task.
    fn snapshot(&self) -> HashMap<String, Task> {
        self.slots
            .iter()
            .map(|(id, slot)| (id.clone(), slot.task.clone()))
            .collect()
    }
}

/// JSON-file-backed task store with a bounded in-memory cache.
pub struct JsonTaskStore {
    path: PathBuf,
    options: StoreOptions,
    // One lock serializes every read-modify-write-persist sequence, which
    // also satisfies the per-key ordering requirement.
    cache: Mutex<Cache>,
}

impl JsonTaskStore {
    /// Open (or create) the task file at `path` and populate the cache.
    ///
    /// Parent directories and an empty file are created when absent.
    pub async fn open(
        path: impl Into<PathBuf>,
        options: StoreOptions,
    ) -> Result<Self, TaskStoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        if tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "opening existing task file");
        } else {
            debug!(path = %path.display(), "creating empty task file");
            write_atomic(&path, b"{}").await?;
        }

        let map = read_task_map(&path).await?;

        let mut cache = Cache::new(options.cache_capacity);
        for task in map.into_values() {
            cache.insert(task);
        }

        Ok(Self {
            path,
            options,
            cache: Mutex::new(cache),
        })
    }

    /// Open with default options.
    pub async fn open_default(path: impl Into<PathBuf>) -> Result<Self, TaskStoreError> {
        Self::open(path, StoreOptions::default()).await
    }

    /// Path of the persisted task file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a task in the cache, falling back to the persisted file.
    ///
    /// A disk hit is promoted into the cache.
    async fn load_task(&self, cache: &mut Cache, id: &str) -> Result<Option<Task>, TaskStoreError> {
        if let Some(task) = cache.get(id) {
            return Ok(Some(task));
        }

        let map = read_task_map(&self.path).await?;
        match map.get(id) {
            Some(task) => {
                debug!(task_id = %id, "cache miss, reloaded task from file");
                cache.insert(task.clone());
                Ok(Some(task.clone()))
            }
            None => Ok(None),
        }
    }

    /// Rewrite the task file: the on-disk map overlaid with every cached
    /// record, so a flush that failed earlier is healed by the next one.
    ///
    /// Each attempt is bounded by the persistence deadline; the whole write
    /// is retried per the store's policy. An exhausted budget surfaces as
    /// [`TaskStoreError::PersistenceFailed`] while the cache keeps the
    /// update.
    async fn persist(&self, cache: &Cache) -> Result<(), TaskStoreError> {
        let overlay = cache.snapshot();
        let path = self.path.clone();
        let deadline = self.options.persist_deadline;

        let outcome = retry(&self.options.persist_policy, || {
            let overlay = overlay.clone();
            let path = path.clone();
            async move {
                with_deadline(deadline, write_task_map(&path, overlay))
                    .await
                    .map_err(|_| {
                        TaskStoreError::PersistenceFailed(format!(
                            "write timed out after {}ms",
                            deadline.as_millis()
                        ))
                    })?
            }
        })
        .await;

        outcome.map_err(|err| {
            warn!(path = %self.path.display(), error = %err, "task file persistence failed");
            match err {
                TaskStoreError::PersistenceFailed(reason) => {
                    TaskStoreError::PersistenceFailed(reason)
                }
                other => TaskStoreError::PersistenceFailed(other.to_string()),
            }
        })
    }

    /// Full view of the store: the on-disk map with cache entries taking
    /// precedence (the cache may be ahead of the file after a failed flush,
    /// never behind).
    async fn full_map(&self, cache: &Cache) -> Result<HashMap<String, Task>, TaskStoreError> {
        let mut map = read_task_map(&self.path).await?;
        for (id, task) in cache.snapshot() {
            map.insert(id, task);
        }
        Ok(map)
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn create(&self, task: Task) -> Result<Task, TaskStoreError> {
        let mut cache = self.cache.lock().await;

        // Duplicate detection must consult the file as well: the colliding
        // record may have been evicted from the cache.
        if cache.contains(&task.id) || self.load_task(&mut cache, &task.id).await?.is_some() {
            return Err(TaskStoreError::DuplicateId(task.id));
        }

        cache.insert(task.clone());
        self.persist(&cache).await?;
        Ok(task)
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, TaskStoreError> {
        let mut cache = self.cache.lock().await;
        self.load_task(&mut cache, id).await
    }

    async fn list(&self) -> Result<Vec<Task>, TaskStoreError> {
        let cache = self.cache.lock().await;
        let map = self.full_map(&cache).await?;
        let mut tasks: Vec<Task> = map.into_values().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, TaskStoreError> {
        let mut tasks = self.list().await?;
        tasks.retain(|task| task.status == status);
        Ok(tasks)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        update: StatusUpdate,
    ) -> Result<Task, TaskStoreError> {
        let mut cache = self.cache.lock().await;

        let mut task = self
            .load_task(&mut cache, id)
            .await?
            .ok_or_else(|| TaskStoreError::NotFound(id.to_string()))?;

        if !is_valid_transition(task.status, status) {
            warn!(
                task_id = %id,
                from = %task.status,
                to = %status,
                "rejected illegal status transition"
            );
            return Err(TaskStoreError::TransitionRejected {
                id: id.to_string(),
                from: task.status,
                to: status,
            });
        }

        // process_id must be gone by the time the task is observable outside
        // of Running.
        if task.status == TaskStatus::Running && status != TaskStatus::Running {
            task.process_id = None;
        }

        task.status = status;
        if let Some(result) = update.result {
            task.result = result;
        }
        task.error = update.error;
        task.updated_at = Utc::now();

        cache.insert(task.clone());
        self.persist(&cache).await?;
        Ok(task)
    }

    async fn set_process_id(
        &self,
        id: &str,
        process_id: Option<u32>,
    ) -> Result<Task, TaskStoreError> {
        let mut cache = self.cache.lock().await;

        let mut task = self
            .load_task(&mut cache, id)
            .await?
            .ok_or_else(|| TaskStoreError::NotFound(id.to_string()))?;

        if process_id.is_some() && task.status != TaskStatus::Running {
            warn!(
                task_id = %id,
                status = %task.status,
                "attaching process id to a task that is not running"
            );
        }

        task.process_id = process_id;
        task.updated_at = Utc::now();

        cache.insert(task.clone());
        self.persist(&cache).await?;
        Ok(task)
    }
}

/// Read and decode the persisted task map.
async fn read_task_map(path: &Path) -> Result<HashMap<String, Task>, TaskStoreError> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Ok(HashMap::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| TaskStoreError::Serialization(e.to_string()))
}

/// Encode and atomically write the task map.
async fn write_task_map(path: &Path, map: HashMap<String, Task>) -> Result<(), TaskStoreError> {
    let mut on_disk = match tokio::fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => serde_json::from_slice::<HashMap<String, Task>>(&bytes)
            .map_err(|e| TaskStoreError::Serialization(e.to_string()))?,
        _ => HashMap::new(),
    };
    on_disk.extend(map);

    let json = serde_json::to_vec_pretty(&on_disk)
        .map_err(|e| TaskStoreError::Serialization(e.to_string()))?;
    write_atomic(path, &json).await
}

/// Write bytes to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TaskStoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::task::{DownloadEntry, DownloadResult, TaskKind};

    use super::*;

    async fn create_test_store(dir: &Path) -> JsonTaskStore {
        JsonTaskStore::open_default(dir.join("tasks.json"))
            .await
            .unwrap()
    }

    fn test_task(id: &str) -> Task {
        Task::new(id, TaskKind::Video, json!({"url": "https://example.com/v"}))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;

        let task = store.create(test_task("t-1")).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let fetched = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;

        store.create(test_task("t-1")).await.unwrap();
        let result = store.create(test_task("t-1")).await;
        assert!(matches!(result, Err(TaskStoreError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_creates_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("tasks.json");
        let _store = JsonTaskStore::open_default(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_update_status_valid_transition() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        store.create(test_task("t-1")).await.unwrap();

        let updated = store
            .update_status("t-1", TaskStatus::Running, StatusUpdate::none())
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Running);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        store.create(test_task("t-1")).await.unwrap();

        // Pending -> Success skips Running
        let result = store
            .update_status("t-1", TaskStatus::Success, StatusUpdate::none())
            .await;
        assert!(matches!(
            result,
            Err(TaskStoreError::TransitionRejected {
                from: TaskStatus::Pending,
                to: TaskStatus::Success,
                ..
            })
        ));

        // the stored record is untouched
        let task = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_unknown_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;

        let result = store
            .update_status("ghost", TaskStatus::Running, StatusUpdate::none())
            .await;
        assert!(matches!(result, Err(TaskStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_process_id_cleared_when_leaving_running() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        store.create(test_task("t-1")).await.unwrap();

        store
            .update_status("t-1", TaskStatus::Running, StatusUpdate::none())
            .await
            .unwrap();
        let task = store.set_process_id("t-1", Some(4242)).await.unwrap();
        assert_eq!(task.process_id, Some(4242));

        let task = store
            .update_status("t-1", TaskStatus::Failed, StatusUpdate::with_error("died"))
            .await
            .unwrap();
        assert!(task.process_id.is_none());
        assert_eq!(task.error.as_deref(), Some("died"));
    }

    #[tokio::test]
    async fn test_error_cleared_on_retry_transition() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        store.create(test_task("t-1")).await.unwrap();

        store
            .update_status("t-1", TaskStatus::Running, StatusUpdate::none())
            .await
            .unwrap();
        store
            .update_status("t-1", TaskStatus::Failed, StatusUpdate::with_error("boom"))
            .await
            .unwrap();

        // retry: back to Pending with no error, result left for inspection
        let task = store
            .update_status("t-1", TaskStatus::Pending, StatusUpdate::none())
            .await
            .unwrap();
        assert!(task.error.is_none());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_result_replaced_only_when_provided() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        store.create(test_task("t-1")).await.unwrap();

        store
            .update_status("t-1", TaskStatus::Running, StatusUpdate::none())
            .await
            .unwrap();

        let result =
            DownloadResult::success(vec![DownloadEntry::new("e1", "Title", "/tmp/title.mp4")]);
        let task = store
            .update_status(
                "t-1",
                TaskStatus::Success,
                StatusUpdate::with_result(result.clone()),
            )
            .await
            .unwrap();
        assert_eq!(task.result, result);
    }

    #[tokio::test]
    async fn test_list_and_list_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;

        for i in 0..3 {
            store.create(test_task(&format!("t-{i}"))).await.unwrap();
        }
        store
            .update_status("t-0", TaskStatus::Running, StatusUpdate::none())
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap().len(), 3);
        assert_eq!(
            store.list_by_status(TaskStatus::Pending).await.unwrap().len(),
            2
        );
        assert_eq!(
            store.list_by_status(TaskStatus::Running).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_evicted_task_reloaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            cache_capacity: 2,
            ..Default::default()
        };
        let store = JsonTaskStore::open(dir.path().join("tasks.json"), options)
            .await
            .unwrap();

        store.create(test_task("t-0")).await.unwrap();
        store.create(test_task("t-1")).await.unwrap();
        store.create(test_task("t-2")).await.unwrap();

        // t-0 was the least recently used and fell out of the cache, but the
        // file still has it.
        let task = store.get("t-0").await.unwrap();
        assert!(task.is_some(), "evicted task must be readable from disk");

        // list sees everything regardless of cache capacity
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_eviction_does_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            cache_capacity: 1,
            ..Default::default()
        };
        let store = JsonTaskStore::open(dir.path().join("tasks.json"), options)
            .await
            .unwrap();

        store.create(test_task("t-0")).await.unwrap();
        store
            .update_status("t-0", TaskStatus::Running, StatusUpdate::none())
            .await
            .unwrap();

        // pushes t-0 out of the one-slot cache
        store.create(test_task("t-1")).await.unwrap();

        let task = store.get("t-0").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_restart_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");

        let before = {
            let store = JsonTaskStore::open_default(&path).await.unwrap();
            store.create(test_task("t-0")).await.unwrap();
            store.create(test_task("t-1")).await.unwrap();
            store
                .update_status("t-1", TaskStatus::Running, StatusUpdate::none())
                .await
                .unwrap();
            store
                .update_status(
                    "t-1",
                    TaskStatus::Success,
                    StatusUpdate::with_result(DownloadResult::success(vec![DownloadEntry::new(
                        "e", "T", "/p",
                    )])),
                )
                .await
                .unwrap();
            store.list().await.unwrap()
        };

        // simulated restart: a fresh store over the same file
        let store = JsonTaskStore::open_default(&path).await.unwrap();
        let after = store.list().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(dir.path()).await;
        store.create(test_task("t-0")).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

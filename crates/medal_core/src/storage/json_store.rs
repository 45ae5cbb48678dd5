use crate::clock::{Clock, SystemClock, format_timestamp};
use crate::error::AppError;
use crate::model::{Reward, RewardHistoryEntry, Task, TaskHistoryEntry};
use crate::storage::{DueFilter, LedgerState, LedgerStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredLedger {
    schema_version: u32,
    #[serde(flatten)]
    state: LedgerState,
}

/// Reference backend: the whole ledger lives in one JSON document,
/// rewritten on every mutation. The mutex makes each operation a
/// critical section within the owning process, which is what
/// `adjust_balance` relies on for its check-and-apply guarantee.
pub struct JsonStore {
    path: PathBuf,
    clock: Box<dyn Clock>,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_clock(path, Box::new(SystemClock))
    }

    pub fn with_clock<P: Into<PathBuf>>(path: P, clock: Box<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<LedgerState, AppError> {
        load_state(&self.path)
    }

    fn save(&self, state: &LedgerState) -> Result<(), AppError> {
        save_state(&self.path, state)
    }

    fn read<T>(&self, op: impl FnOnce(&LedgerState) -> Result<T, AppError>) -> Result<T, AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::io("ledger lock poisoned"))?;
        let state = self.load()?;
        op(&state)
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut LedgerState) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::io("ledger lock poisoned"))?;
        let mut state = self.load()?;
        let value = op(&mut state)?;
        self.save(&state)?;
        Ok(value)
    }
}

pub fn load_state(path: &Path) -> Result<LedgerState, AppError> {
    if !path.exists() {
        return Ok(LedgerState::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredLedger =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    Ok(stored.state)
}

pub fn save_state(path: &Path, state: &LedgerState) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredLedger {
        schema_version: SCHEMA_VERSION,
        state: state.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}

impl LedgerStore for JsonStore {
    fn create_task(&self, description: &str, due_date: Option<&str>) -> Result<Task, AppError> {
        let created_at = format_timestamp(self.clock.as_ref())?;
        self.mutate(|state| state.create_task(description, due_date, &created_at))
    }

    fn get_task(&self, task_id: &str) -> Result<Task, AppError> {
        self.read(|state| state.get_task(task_id))
    }

    fn delete_task(&self, task_id: &str) -> Result<(), AppError> {
        self.mutate(|state| state.delete_task(task_id))
    }

    fn list_tasks(&self, filter: Option<&DueFilter>) -> Result<Vec<Task>, AppError> {
        self.read(|state| state.list_tasks(filter))
    }

    fn create_reward(&self, description: &str, medal_cost: u32) -> Result<Reward, AppError> {
        let created_at = format_timestamp(self.clock.as_ref())?;
        self.mutate(|state| state.create_reward(description, medal_cost, &created_at))
    }

    fn get_reward(&self, reward_id: &str) -> Result<Reward, AppError> {
        self.read(|state| state.get_reward(reward_id))
    }

    fn delete_reward(&self, reward_id: &str) -> Result<(), AppError> {
        self.mutate(|state| state.delete_reward(reward_id))
    }

    fn list_rewards(&self) -> Result<Vec<Reward>, AppError> {
        self.read(|state| Ok(state.rewards.clone()))
    }

    fn get_balance(&self) -> Result<u64, AppError> {
        self.read(|state| Ok(state.balance))
    }

    fn adjust_balance(&self, delta: i64) -> Result<u64, AppError> {
        self.mutate(|state| state.adjust_balance(delta))
    }

    fn append_task_history(&self, description: &str, timestamp: &str) -> Result<(), AppError> {
        self.mutate(|state| {
            state.append_task_history(description, timestamp);
            Ok(())
        })
    }

    fn append_reward_history(
        &self,
        description: &str,
        medal_cost: u32,
        timestamp: &str,
    ) -> Result<(), AppError> {
        self.mutate(|state| {
            state.append_reward_history(description, medal_cost, timestamp);
            Ok(())
        })
    }

    fn list_task_history(&self) -> Result<Vec<TaskHistoryEntry>, AppError> {
        self.read(|state| Ok(state.list_task_history()))
    }

    fn list_reward_history(&self) -> Result<Vec<RewardHistoryEntry>, AppError> {
        self.read(|state| Ok(state.list_reward_history()))
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonStore, SCHEMA_VERSION, load_state, save_state};
    use crate::storage::{LedgerState, LedgerStore};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("medalapp-{nanos}-{file_name}"))
    }

    #[test]
    fn load_state_missing_file_yields_empty_ledger() {
        let path = temp_path("missing-ledger.json");
        let state = load_state(&path).unwrap();

        assert!(state.tasks.is_empty());
        assert!(state.rewards.is_empty());
        assert_eq!(state.balance, 0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path("ledger.json");
        let mut state = LedgerState::default();
        state
            .create_task("demo", Some("2026-02-01"), "2026-01-01T00:00:00Z")
            .unwrap();
        state
            .create_reward("treat", 3, "2026-01-01T00:00:00Z")
            .unwrap();
        state.adjust_balance(5).unwrap();
        state.append_task_history("done", "2026-01-02T00:00:00Z");

        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, state);
    }

    #[test]
    fn schema_version_must_match() {
        let path = temp_path("bad-schema.json");
        let bad = format!(
            "{{\n  \"schema_version\": {},\n  \"tasks\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, bad).unwrap();

        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn rejects_negative_medal_cost_in_stored_file() {
        let path = temp_path("negative-cost.json");
        let content = "{\n  \"schema_version\": 1,\n  \"rewards\": [\n    {\n      \"id\": \"reward-1\",\n      \"description\": \"treat\",\n      \"medal_cost\": -2,\n      \"created_at\": \"2026-01-01T00:00:00Z\"\n    }\n  ]\n}";
        fs::write(&path, content).unwrap();

        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn create_task_persists_to_disk() {
        let path = temp_path("create-task.json");
        let store = JsonStore::new(path.clone());

        let task = store.create_task("demo", None).unwrap();
        let loaded = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].id, task.id);
        assert_eq!(loaded.tasks[0].description, "demo");
    }

    #[test]
    fn get_balance_on_fresh_store_is_zero() {
        let path = temp_path("fresh-balance.json");
        let store = JsonStore::new(path.clone());

        assert_eq!(store.get_balance().unwrap(), 0);
        assert_eq!(store.get_balance().unwrap(), 0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn adjust_balance_persists_and_guards_overdraw() {
        let path = temp_path("adjust-balance.json");
        let store = JsonStore::new(path.clone());

        assert_eq!(store.adjust_balance(2).unwrap(), 2);
        let err = store.adjust_balance(-3).unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");

        let loaded = load_state(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded.balance, 2);
    }

    #[test]
    fn delete_task_missing_reports_not_found() {
        let path = temp_path("delete-missing.json");
        let store = JsonStore::new(path.clone());

        let err = store.delete_task("task-1").unwrap_err();
        fs::remove_file(&path).ok();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn corrupt_ledger_surfaces_invalid_data() {
        let path = temp_path("corrupt-ledger.json");
        fs::write(&path, "{ not json ").unwrap();
        let store = JsonStore::new(path.clone());

        let err = store.list_tasks(None).unwrap_err();
        fs::remove_file(&path).ok();
        assert_eq!(err.code(), "invalid_data");
    }
}

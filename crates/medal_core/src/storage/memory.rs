use crate::clock::{Clock, SystemClock, format_timestamp};
use crate::error::AppError;
use crate::model::{Reward, RewardHistoryEntry, Task, TaskHistoryEntry};
use crate::storage::{DueFilter, LedgerState, LedgerStore};
use std::sync::Mutex;

/// Non-durable backend holding the ledger behind a mutex. Used by the
/// service tests and by callers that want a scratch ledger.
pub struct MemoryStore {
    clock: Box<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn with_state<T>(
        &self,
        op: impl FnOnce(&mut LedgerState) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::io("ledger lock poisoned"))?;
        op(&mut state)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryStore {
    fn create_task(&self, description: &str, due_date: Option<&str>) -> Result<Task, AppError> {
        let created_at = format_timestamp(self.clock.as_ref())?;
        self.with_state(|state| state.create_task(description, due_date, &created_at))
    }

    fn get_task(&self, task_id: &str) -> Result<Task, AppError> {
        self.with_state(|state| state.get_task(task_id))
    }

    fn delete_task(&self, task_id: &str) -> Result<(), AppError> {
        self.with_state(|state| state.delete_task(task_id))
    }

    fn list_tasks(&self, filter: Option<&DueFilter>) -> Result<Vec<Task>, AppError> {
        self.with_state(|state| state.list_tasks(filter))
    }

    fn create_reward(&self, description: &str, medal_cost: u32) -> Result<Reward, AppError> {
        let created_at = format_timestamp(self.clock.as_ref())?;
        self.with_state(|state| state.create_reward(description, medal_cost, &created_at))
    }

    fn get_reward(&self, reward_id: &str) -> Result<Reward, AppError> {
        self.with_state(|state| state.get_reward(reward_id))
    }

    fn delete_reward(&self, reward_id: &str) -> Result<(), AppError> {
        self.with_state(|state| state.delete_reward(reward_id))
    }

    fn list_rewards(&self) -> Result<Vec<Reward>, AppError> {
        self.with_state(|state| Ok(state.rewards.clone()))
    }

    fn get_balance(&self) -> Result<u64, AppError> {
        self.with_state(|state| Ok(state.balance))
    }

    fn adjust_balance(&self, delta: i64) -> Result<u64, AppError> {
        self.with_state(|state| state.adjust_balance(delta))
    }

    fn append_task_history(&self, description: &str, timestamp: &str) -> Result<(), AppError> {
        self.with_state(|state| {
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
        self.with_state(|state| {
            state.append_reward_history(description, medal_cost, timestamp);
            Ok(())
        })
    }

    fn list_task_history(&self) -> Result<Vec<TaskHistoryEntry>, AppError> {
        self.with_state(|state| Ok(state.list_task_history()))
    }

    fn list_reward_history(&self) -> Result<Vec<RewardHistoryEntry>, AppError> {
        self.with_state(|state| Ok(state.list_reward_history()))
    }
}

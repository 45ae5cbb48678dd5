use crate::error::AppError;
use crate::model::{Reward, RewardHistoryEntry, Task, TaskHistoryEntry};
use serde::{Deserialize, Serialize};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub mod json_store;
pub mod memory;

pub use json_store::JsonStore;
pub use memory::MemoryStore;

const DUE_DATE_FORMAT: &'static [BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// One user's durable ledger: tasks, rewards, histories and the medal
/// balance, behind whichever physical medium a backend chooses.
pub trait LedgerStore {
    fn create_task(&self, description: &str, due_date: Option<&str>) -> Result<Task, AppError>;
    fn get_task(&self, task_id: &str) -> Result<Task, AppError>;
    fn delete_task(&self, task_id: &str) -> Result<(), AppError>;
    fn list_tasks(&self, filter: Option<&DueFilter>) -> Result<Vec<Task>, AppError>;

    fn create_reward(&self, description: &str, medal_cost: u32) -> Result<Reward, AppError>;
    fn get_reward(&self, reward_id: &str) -> Result<Reward, AppError>;
    fn delete_reward(&self, reward_id: &str) -> Result<(), AppError>;
    fn list_rewards(&self) -> Result<Vec<Reward>, AppError>;

    fn get_balance(&self) -> Result<u64, AppError>;

    /// Applies `delta` to the balance and returns the new value. The
    /// check-and-apply is atomic per store; a delta that would push the
    /// balance below zero fails with `insufficient_funds` and leaves the
    /// balance untouched.
    fn adjust_balance(&self, delta: i64) -> Result<u64, AppError>;

    fn append_task_history(&self, description: &str, timestamp: &str) -> Result<(), AppError>;
    fn append_reward_history(
        &self,
        description: &str,
        medal_cost: u32,
        timestamp: &str,
    ) -> Result<(), AppError>;
    fn list_task_history(&self) -> Result<Vec<TaskHistoryEntry>, AppError>;
    fn list_reward_history(&self) -> Result<Vec<RewardHistoryEntry>, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueFilter {
    On(Date),
    Between(Date, Date),
}

impl DueFilter {
    fn matches(&self, due: Date) -> bool {
        match self {
            Self::On(date) => due == *date,
            Self::Between(from, to) => *from <= due && due <= *to,
        }
    }
}

pub fn parse_due_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), DUE_DATE_FORMAT)
        .map_err(|_| AppError::invalid_input("due date must be YYYY-MM-DD"))
}

/// In-memory shape of one ledger. Both backends route every mutation
/// through these methods so the semantics cannot drift between media.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub task_history: Vec<TaskHistoryEntry>,
    #[serde(default)]
    pub reward_history: Vec<RewardHistoryEntry>,
    #[serde(default)]
    next_id: u64,
}

impl LedgerState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    pub fn create_task(
        &mut self,
        description: &str,
        due_date: Option<&str>,
        created_at: &str,
    ) -> Result<Task, AppError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::invalid_input("description is required"));
        }

        let due_date = match due_date {
            Some(raw) => Some(parse_due_date(raw)?.format(DUE_DATE_FORMAT).map_err(
                |err| AppError::invalid_data(err.to_string()),
            )?),
            None => None,
        };

        let task = Task {
            id: self.next_id("task"),
            description: description.to_string(),
            created_at: created_at.to_string(),
            due_date,
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task, AppError> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id.trim())
            .cloned()
            .ok_or_else(|| AppError::not_found("task not found"))
    }

    pub fn delete_task(&mut self, task_id: &str) -> Result<(), AppError> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == task_id.trim())
            .ok_or_else(|| AppError::not_found("task not found"))?;
        self.tasks.remove(index);
        Ok(())
    }

    /// Tasks in ascending creation order. A filter excludes tasks without
    /// a due date.
    pub fn list_tasks(&self, filter: Option<&DueFilter>) -> Result<Vec<Task>, AppError> {
        let Some(filter) = filter else {
            return Ok(self.tasks.clone());
        };

        let mut matched = Vec::new();
        for task in &self.tasks {
            let Some(raw) = task.due_date.as_deref() else {
                continue;
            };
            let due = Date::parse(raw, DUE_DATE_FORMAT)
                .map_err(|_| AppError::invalid_data("due_date must be YYYY-MM-DD"))?;
            if filter.matches(due) {
                matched.push(task.clone());
            }
        }
        Ok(matched)
    }

    pub fn create_reward(
        &mut self,
        description: &str,
        medal_cost: u32,
        created_at: &str,
    ) -> Result<Reward, AppError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::invalid_input("description is required"));
        }

        let reward = Reward {
            id: self.next_id("reward"),
            description: description.to_string(),
            medal_cost,
            created_at: created_at.to_string(),
        };
        self.rewards.push(reward.clone());
        Ok(reward)
    }

    pub fn get_reward(&self, reward_id: &str) -> Result<Reward, AppError> {
        self.rewards
            .iter()
            .find(|reward| reward.id == reward_id.trim())
            .cloned()
            .ok_or_else(|| AppError::not_found("reward not found"))
    }

    pub fn delete_reward(&mut self, reward_id: &str) -> Result<(), AppError> {
        let index = self
            .rewards
            .iter()
            .position(|reward| reward.id == reward_id.trim())
            .ok_or_else(|| AppError::not_found("reward not found"))?;
        self.rewards.remove(index);
        Ok(())
    }

    pub fn adjust_balance(&mut self, delta: i64) -> Result<u64, AppError> {
        let next = if delta >= 0 {
            self.balance
                .checked_add(delta as u64)
                .ok_or_else(|| AppError::invalid_data("medal balance overflow"))?
        } else {
            self.balance
                .checked_sub(delta.unsigned_abs())
                .ok_or_else(|| AppError::insufficient_funds("not enough medals"))?
        };
        self.balance = next;
        Ok(next)
    }

    pub fn append_task_history(&mut self, description: &str, timestamp: &str) {
        self.task_history.push(TaskHistoryEntry {
            description: description.to_string(),
            timestamp: timestamp.to_string(),
        });
    }

    pub fn append_reward_history(&mut self, description: &str, medal_cost: u32, timestamp: &str) {
        self.reward_history.push(RewardHistoryEntry {
            description: description.to_string(),
            medal_cost,
            timestamp: timestamp.to_string(),
        });
    }

    /// Newest first; ties keep the later-appended entry first.
    pub fn list_task_history(&self) -> Vec<TaskHistoryEntry> {
        let mut entries: Vec<TaskHistoryEntry> = self.task_history.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn list_reward_history(&self) -> Vec<RewardHistoryEntry> {
        let mut entries: Vec<RewardHistoryEntry> =
            self.reward_history.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }
}

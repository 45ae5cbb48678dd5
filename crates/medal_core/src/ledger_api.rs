use crate::clock::{Clock, format_timestamp};
use crate::error::AppError;
use crate::model::{Reward, RewardHistoryEntry, Task, TaskHistoryEntry};
use crate::storage::{DueFilter, LedgerStore};

pub const MEDALS_PER_TASK: u32 = 1;

/// Result of a compound operation that moves an entity into history and
/// then adjusts the balance. `BalancePending` means the transition
/// committed (row gone, history written) but the balance adjustment
/// failed; the caller should show the transition as done and offer a
/// balance refresh rather than treating the whole operation as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Settled { balance: u64 },
    BalancePending { error: AppError },
}

pub fn add_task(
    store: &dyn LedgerStore,
    description: &str,
    due_date: Option<&str>,
) -> Result<Task, AppError> {
    store.create_task(description, due_date)
}

pub fn add_reward(
    store: &dyn LedgerStore,
    description: &str,
    medal_cost: u32,
) -> Result<Reward, AppError> {
    store.create_reward(description, medal_cost)
}

pub fn list_tasks(
    store: &dyn LedgerStore,
    filter: Option<&DueFilter>,
) -> Result<Vec<Task>, AppError> {
    store.list_tasks(filter)
}

pub fn list_rewards(store: &dyn LedgerStore) -> Result<Vec<Reward>, AppError> {
    store.list_rewards()
}

pub fn get_balance(store: &dyn LedgerStore) -> Result<u64, AppError> {
    store.get_balance()
}

pub fn get_task_history(store: &dyn LedgerStore) -> Result<Vec<TaskHistoryEntry>, AppError> {
    store.list_task_history()
}

pub fn get_reward_history(store: &dyn LedgerStore) -> Result<Vec<RewardHistoryEntry>, AppError> {
    store.list_reward_history()
}

/// Completes a pending task: history first, then delete, then award.
/// History is written before the delete so a failure in between leaves a
/// duplicate history row instead of a silent loss. A second call on the
/// same id fails with `not_found` at the lookup or at the delete,
/// whichever the race reaches first, so the medals are awarded once.
pub fn complete_task(
    store: &dyn LedgerStore,
    clock: &dyn Clock,
    task_id: &str,
) -> Result<OperationOutcome, AppError> {
    let trimmed_id = task_id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    let task = store.get_task(trimmed_id)?;
    let timestamp = format_timestamp(clock)?;
    store.append_task_history(&task.description, &timestamp)?;
    store.delete_task(&task.id)?;

    match store.adjust_balance(i64::from(MEDALS_PER_TASK)) {
        Ok(balance) => Ok(OperationOutcome::Settled { balance }),
        Err(error) => Ok(OperationOutcome::BalancePending { error }),
    }
}

/// Claims a reward. The balance pre-check is a fast path for the common
/// case; the store's `adjust_balance` stays the authoritative guard, and
/// a race that fails it after the delete surfaces as `BalancePending`,
/// never as a reverted claim.
pub fn claim_reward(
    store: &dyn LedgerStore,
    clock: &dyn Clock,
    reward_id: &str,
) -> Result<OperationOutcome, AppError> {
    let trimmed_id = reward_id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    let reward = store.get_reward(trimmed_id)?;
    let balance = store.get_balance()?;
    if balance < u64::from(reward.medal_cost) {
        return Err(AppError::insufficient_funds("not enough medals"));
    }

    let timestamp = format_timestamp(clock)?;
    store.append_reward_history(&reward.description, reward.medal_cost, &timestamp)?;
    store.delete_reward(&reward.id)?;

    match store.adjust_balance(-i64::from(reward.medal_cost)) {
        Ok(balance) => Ok(OperationOutcome::Settled { balance }),
        Err(error) => Ok(OperationOutcome::BalancePending { error }),
    }
}

mod ledger;

pub use ledger::{Reward, RewardHistoryEntry, Task, TaskHistoryEntry};

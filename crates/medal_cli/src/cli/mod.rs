use clap::{Parser, Subcommand};
use medal_core::error::AppError;
use medal_core::storage::{DueFilter, parse_due_date};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: medals add "Clean kitchen"
    /// Example: medals add "File taxes" --due 2026-04-15
    Add {
        description: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        due: Option<String>,
    },
    /// Complete a task and earn medals
    ///
    /// Example: medals done task-1
    Done {
        id: String,
    },
    /// List pending tasks
    ///
    /// Example: medals list
    /// Example: medals list --due 2026-04-15
    /// Example: medals list --from 2026-04-01 --to 2026-04-30
    List {
        #[arg(long, value_name = "YYYY-MM-DD")]
        due: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        from: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        to: Option<String>,
    },
    /// Manage rewards
    ///
    /// Example: medals reward add "Movie night" 3
    /// Example: medals reward claim reward-1
    Reward {
        #[command(subcommand)]
        reward: RewardCommand,
    },
    /// Show the current medal balance
    ///
    /// Example: medals balance
    Balance,
    /// Show completion and claim history
    ///
    /// Example: medals history tasks
    /// Example: medals history rewards
    History {
        #[command(subcommand)]
        history: HistoryCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum RewardCommand {
    /// Add a new reward
    ///
    /// Example: medals reward add "Movie night" 3
    Add {
        description: String,
        cost: u32,
    },
    /// Claim a reward, spending medals
    ///
    /// Example: medals reward claim reward-1
    Claim {
        id: String,
    },
    /// List available rewards
    ///
    /// Example: medals reward list
    List,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List completed tasks, newest first
    ///
    /// Example: medals history tasks
    Tasks,
    /// List claimed rewards, newest first
    ///
    /// Example: medals history rewards
    Rewards,
}

/// Builds the optional due filter for `list`. `--due` selects one day;
/// `--from`/`--to` select an inclusive range and must come together.
pub fn due_filter_from_args(
    due: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<DueFilter>, AppError> {
    if due.is_some() && (from.is_some() || to.is_some()) {
        return Err(AppError::invalid_input(
            "--due cannot be combined with --from/--to",
        ));
    }

    if let Some(date) = due {
        return Ok(Some(DueFilter::On(parse_due_date(date)?)));
    }

    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => {
            let from = parse_due_date(from)?;
            let to = parse_due_date(to)?;
            if from > to {
                return Err(AppError::invalid_input("--from must not be after --to"));
            }
            Ok(Some(DueFilter::Between(from, to)))
        }
        _ => Err(AppError::invalid_input("--from and --to must be used together")),
    }
}

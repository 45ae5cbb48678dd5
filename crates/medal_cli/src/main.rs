use clap::{CommandFactory, Parser};
use medal_core::clock::SystemClock;
use medal_core::config;
use medal_core::error::AppError;
use medal_core::ledger_api::{self, OperationOutcome};
use medal_core::model::{Reward, RewardHistoryEntry, Task, TaskHistoryEntry};
use medal_core::storage::{JsonStore, LedgerStore};
use std::io::{self, BufRead};
use tabled::{Table, Tabled};

mod cli;

use cli::{Cli, Command, HistoryCommand, RewardCommand};

fn print_tasks_plain(tasks: &[Task]) {
    for task in tasks {
        let due = task.due_date.as_deref().unwrap_or("-");
        println!(
            "{} | {} | due: {} | {}",
            task.id, task.description, due, task.created_at
        );
    }
}

fn print_tasks_json(tasks: &[Task]) {
    let mut payload = Vec::with_capacity(tasks.len());
    for task in tasks {
        payload.push(serde_json::json!({
            "id": task.id,
            "description": task.description,
            "due_date": task.due_date,
            "created_at": task.created_at,
        }));
    }
    println!("{}", serde_json::Value::Array(payload));
}

fn print_task_json(task: &Task) {
    let json = serde_json::json!({
        "id": task.id,
        "description": task.description,
        "due_date": task.due_date,
        "created_at": task.created_at,
    });
    println!("{}", json);
}

fn print_rewards_plain(rewards: &[Reward]) {
    for reward in rewards {
        println!(
            "{} | {} | {} medals",
            reward.id, reward.description, reward.medal_cost
        );
    }
}

fn print_rewards_json(rewards: &[Reward]) {
    let mut payload = Vec::with_capacity(rewards.len());
    for reward in rewards {
        payload.push(serde_json::json!({
            "id": reward.id,
            "description": reward.description,
            "medal_cost": reward.medal_cost,
            "created_at": reward.created_at,
        }));
    }
    println!("{}", serde_json::Value::Array(payload));
}

fn print_reward_json(reward: &Reward) {
    let json = serde_json::json!({
        "id": reward.id,
        "description": reward.description,
        "medal_cost": reward.medal_cost,
        "created_at": reward.created_at,
    });
    println!("{}", json);
}

#[derive(Tabled)]
struct TaskHistoryRow {
    #[tabled(rename = "Task")]
    description: String,
    #[tabled(rename = "Completed at")]
    timestamp: String,
}

#[derive(Tabled)]
struct RewardHistoryRow {
    #[tabled(rename = "Reward")]
    description: String,
    #[tabled(rename = "Cost")]
    medal_cost: u32,
    #[tabled(rename = "Claimed at")]
    timestamp: String,
}

fn print_task_history(entries: &[TaskHistoryEntry], json: bool) {
    if json {
        let mut payload = Vec::with_capacity(entries.len());
        for entry in entries {
            payload.push(serde_json::json!({
                "description": entry.description,
                "timestamp": entry.timestamp,
            }));
        }
        println!("{}", serde_json::Value::Array(payload));
        return;
    }

    let rows: Vec<TaskHistoryRow> = entries
        .iter()
        .map(|entry| TaskHistoryRow {
            description: entry.description.clone(),
            timestamp: entry.timestamp.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn print_reward_history(entries: &[RewardHistoryEntry], json: bool) {
    if json {
        let mut payload = Vec::with_capacity(entries.len());
        for entry in entries {
            payload.push(serde_json::json!({
                "description": entry.description,
                "medal_cost": entry.medal_cost,
                "timestamp": entry.timestamp,
            }));
        }
        println!("{}", serde_json::Value::Array(payload));
        return;
    }

    let rows: Vec<RewardHistoryRow> = entries
        .iter()
        .map(|entry| RewardHistoryRow {
            description: entry.description.clone(),
            medal_cost: entry.medal_cost,
            timestamp: entry.timestamp.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

fn report_outcome(kind: &str, id: &str, outcome: OperationOutcome, json: bool) {
    match outcome {
        OperationOutcome::Settled { balance } => {
            if json {
                let payload = serde_json::json!({
                    "id": id,
                    "balance": balance,
                    "balance_updated": true,
                });
                println!("{payload}");
            } else {
                println!("{kind} {id} | Medals: {balance}");
            }
        }
        OperationOutcome::BalancePending { error } => {
            if json {
                let payload = serde_json::json!({
                    "id": id,
                    "balance_updated": false,
                    "balance_error": error.to_string(),
                });
                println!("{payload}");
            } else {
                println!("{kind} {id}");
                println!(
                    "WARNING: balance update failed ({error}); run 'medals balance' to refresh"
                );
            }
        }
    }
}

fn run_command(cli: Cli, store: &dyn LedgerStore) -> Result<(), AppError> {
    let clock = SystemClock;

    match cli.command {
        Command::Add { description, due } => {
            let description = match description {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("description is required")),
            };

            let task = ledger_api::add_task(store, &description, due.as_deref())?;
            if cli.json {
                print_task_json(&task);
            } else {
                println!("Added task: {} ({})", task.description, task.id);
            }
        }
        Command::Done { id } => {
            let outcome = ledger_api::complete_task(store, &clock, &id)?;
            report_outcome("Completed task:", id.trim(), outcome, cli.json);
        }
        Command::List { due, from, to } => {
            let filter = cli::due_filter_from_args(due.as_deref(), from.as_deref(), to.as_deref())?;
            let tasks = ledger_api::list_tasks(store, filter.as_ref())?;
            if cli.json {
                print_tasks_json(&tasks);
            } else {
                print_tasks_plain(&tasks);
            }
        }
        Command::Reward { reward } => match reward {
            RewardCommand::Add { description, cost } => {
                let description = description.trim();
                if description.is_empty() {
                    return Err(AppError::invalid_input("description is required"));
                }

                let reward = ledger_api::add_reward(store, description, cost)?;
                if cli.json {
                    print_reward_json(&reward);
                } else {
                    println!(
                        "Added reward: {} ({}) for {} medals",
                        reward.description, reward.id, reward.medal_cost
                    );
                }
            }
            RewardCommand::Claim { id } => {
                let outcome = ledger_api::claim_reward(store, &clock, &id)?;
                report_outcome("Claimed reward:", id.trim(), outcome, cli.json);
            }
            RewardCommand::List => {
                let rewards = ledger_api::list_rewards(store)?;
                if cli.json {
                    print_rewards_json(&rewards);
                } else {
                    print_rewards_plain(&rewards);
                }
            }
        },
        Command::Balance => {
            let balance = ledger_api::get_balance(store)?;
            if cli.json {
                println!("{}", serde_json::json!({ "balance": balance }));
            } else {
                println!("Medals: {balance}");
            }
        }
        Command::History { history } => match history {
            HistoryCommand::Tasks => {
                let entries = ledger_api::get_task_history(store)?;
                print_task_history(&entries, cli.json);
            }
            HistoryCommand::Rewards => {
                let entries = ledger_api::get_reward_history(store)?;
                print_reward_history(&entries, cli.json);
            }
        },
    }

    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some('"') if ch == '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => current.push(escaped),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if quote.is_some() {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn run_interactive(store: &dyn LedgerStore) -> Result<(), AppError> {
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("medals".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(cli, store) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn open_store() -> Result<JsonStore, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error {
        eprintln!("WARNING: {}", err);
    }
    let path = config::resolve_store_path(&loaded.config)?;
    Ok(JsonStore::new(path))
}

fn main() {
    let store = match open_store() {
        Ok(store) => store,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    };

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive(&store) {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli, &store) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::split_command_line;

    #[test]
    fn split_command_line_splits_on_whitespace() {
        let args = split_command_line("reward add treat 3").unwrap();
        assert_eq!(args, vec!["reward", "add", "treat", "3"]);
    }

    #[test]
    fn split_command_line_handles_double_quotes() {
        let args = split_command_line("add \"Clean the kitchen\" --due 2026-04-15").unwrap();
        assert_eq!(args, vec!["add", "Clean the kitchen", "--due", "2026-04-15"]);
    }

    #[test]
    fn split_command_line_handles_single_quotes() {
        let args = split_command_line("add 'Movie night'").unwrap();
        assert_eq!(args, vec!["add", "Movie night"]);
    }

    #[test]
    fn split_command_line_unescapes_inside_double_quotes() {
        let args = split_command_line("add \"say \\\"hi\\\"\"").unwrap();
        assert_eq!(args, vec!["add", "say \"hi\""]);
    }

    #[test]
    fn split_command_line_rejects_unterminated_quote() {
        let err = split_command_line("add \"half quoted").unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}

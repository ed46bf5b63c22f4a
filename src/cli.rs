//! Command-line interface and REPL
//!
//! Interactive console over the state store: inspect mirrored values and
//! issue user writes (remote commands, manual refresh triggers).

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::bridge::Namespace;
use crate::state::{StateActorHandle, StateEntry};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Get(String),
    Set(String, Value),
    List,
    Help,
    Exit,
}

/// Parse one REPL line
///
/// `set` values are read as JSON (`true`, `42`, `"text"`) and fall back to a
/// plain string.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match verb {
        "get" if !rest.is_empty() => ReplCommand::Get(rest.to_string()),
        "get" => return Err("usage: get <name>".to_string()),
        "set" => {
            let Some((name, raw)) = rest.split_once(char::is_whitespace) else {
                return Err("usage: set <name> <value>".to_string());
            };
            let raw = raw.trim();
            let val = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            ReplCommand::Set(name.to_string(), val)
        }
        "list" | "ls" => ReplCommand::List,
        "help" | "?" => ReplCommand::Help,
        "exit" | "quit" => ReplCommand::Exit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };

    Ok(Some(command))
}

/// Run the REPL until `exit`, EOF or Ctrl-C
///
/// Line editing runs on its own thread since rustyline blocks.
pub async fn run_repl(store: StateActorHandle, namespace: Namespace) -> Result<()> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let (ready_tx, ready_rx) = oneshot::channel();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => {
                let _ = ready_tx.send(Ok(()));
                rl
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        read_lines(&mut rl, line_tx);
    });

    ready_rx.await??;

    print_help();

    while let Some(line) = line_rx.recv().await {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg.yellow());
                continue;
            }
        };

        match command {
            ReplCommand::Get(name) => {
                let id = namespace.id(&name);
                match store.get_state(&id).await {
                    Some(entry) => println!("{} = {}", id.cyan(), format_entry(&entry)),
                    None => println!("{} {}", id.cyan(), "(not set)".dimmed()),
                }
            }
            ReplCommand::Set(name, val) => {
                let id = namespace.id(&name);
                debug!(id = %id, val = %val, "REPL write");
                store.set_state_confirmed(id.clone(), val, false).await?;
                println!("{} {}", "sent".green(), id);
            }
            ReplCommand::List => {
                let mut states: Vec<_> = store
                    .list_states()
                    .await
                    .into_iter()
                    .filter(|(id, _)| namespace.owns(id))
                    .collect();
                states.sort_by(|a, b| a.0.cmp(&b.0));

                if states.is_empty() {
                    println!("{}", "(no states)".dimmed());
                }
                for (id, entry) in states {
                    println!("  {} = {}", id.cyan(), format_entry(&entry));
                }
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Exit => break,
        }
    }

    Ok(())
}

fn read_lines(rl: &mut DefaultEditor, line_tx: mpsc::UnboundedSender<String>) {
    loop {
        match rl.readline("bravia> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                if line_tx.send(line).is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{} {}", "readline error:".red(), e);
                break;
            }
        }
    }
}

fn format_entry(entry: &StateEntry) -> String {
    let ack = if entry.ack {
        "ack".green()
    } else {
        "pending".yellow()
    };
    format!("{} ({})", entry.val.to_string().bold(), ack)
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}            read a state", "get <name>".yellow());
    println!("  {}    write a state (user command)", "set <name> <value>".yellow());
    println!("  {}                  list all states", "list".yellow());
    println!("  {}                  leave", "exit".yellow());
    println!(
        "  e.g. {} or {}",
        "set VolumeUp true".dimmed(),
        "set info.triggerUpdateStatus true".dimmed()
    );
}

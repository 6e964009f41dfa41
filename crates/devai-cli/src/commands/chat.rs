//! Interactive chat REPL.

use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use devai_application::{ConversationController, Source};
use devai_core::session::{ChatSession, MessageRole};

use crate::commands::sessions::print_sessions;
use crate::commands::sync::print_report;
use crate::context::{AppContext, Credentials};
use crate::render::render_answer;

const COMMANDS: [&str; 7] = ["/new", "/history", "/load", "/delete", "/sync", "/help", "quit"];

/// A parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand<'a> {
    Ask(&'a str),
    New,
    History,
    /// 1-based position in the last `/history` listing.
    Load(usize),
    Delete(usize),
    Sync,
    Help,
    Quit,
    Usage(&'static str),
    Unknown(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line == "quit" || line == "exit" {
            return Self::Quit;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Ask(line);
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match name {
            "new" => Self::New,
            "history" => Self::History,
            "load" => arg
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map_or(Self::Usage("/load <n>"), Self::Load),
            "delete" => arg
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map_or(Self::Usage("/delete <n>"), Self::Delete),
            "sync" => Self::Sync,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line),
        }
    }
}

/// Rustyline helper completing and hinting REPL commands.
#[derive(Clone)]
struct CliHelper;

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            COMMANDS
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

pub async fn run(ctx: &AppContext, credentials: &Credentials) -> Result<()> {
    let answers = ctx.answers()?;
    let identity = ctx.login(credentials).await?;
    let sync = ctx.synchronizer();
    let signed_in = identity.is_some();

    let mut controller = ConversationController::new(answers, sync.clone(), identity)
        .with_greeting(ctx.config.chat.greeting.as_str());

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper));

    println!("{}", "=== Dev AI ===".bright_magenta().bold());
    if !signed_in {
        println!(
            "{}",
            "Not signed in: conversations are kept in the local cache only.".yellow()
        );
    }
    println!("{}", "Type '/help' for commands or 'quit' to exit.".bright_black());
    println!();
    print_transcript(&controller);

    let mut listed: Vec<ChatSession> = Vec::new();

    loop {
        let line = match rl.readline(">> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        match ReplCommand::parse(trimmed) {
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Ask(question) => ask(&mut controller, question).await,
            ReplCommand::New => {
                controller.new_conversation().await;
                print_transcript(&controller);
            }
            ReplCommand::History => match controller.list_conversations().await {
                Ok((sessions, source)) => {
                    if source == Source::Cache {
                        println!("{}", "(from local cache)".bright_black());
                    }
                    if sessions.is_empty() {
                        println!("{}", "No conversations yet.".bright_black());
                    }
                    print_sessions(&sessions);
                    listed = sessions;
                }
                Err(e) => eprintln!("{}", format!("Failed to list conversations: {}", e).red()),
            },
            ReplCommand::Load(n) => match listed.get(n - 1) {
                Some(session) => match controller.load_conversation(&session.id).await {
                    Ok(source) => {
                        if source == Source::Cache {
                            println!("{}", "(from local cache)".bright_black());
                        }
                        print_transcript(&controller);
                    }
                    Err(e) => eprintln!("{}", format!("Failed to load conversation: {}", e).red()),
                },
                None => println!("{}", "Run /history first, then pick a number from it.".yellow()),
            },
            ReplCommand::Delete(n) => match listed.get(n - 1).cloned() {
                Some(session) => {
                    let was_active = session.id == controller.active_id();
                    if controller.delete_conversation(&session.id).await {
                        println!("{}", format!("Deleted '{}'", session.title).bright_green());
                    } else {
                        println!("{}", "Nothing was deleted.".yellow());
                    }
                    listed.retain(|s| s.id != session.id);
                    if was_active {
                        print_transcript(&controller);
                    }
                }
                None => println!("{}", "Run /history first, then pick a number from it.".yellow()),
            },
            ReplCommand::Sync => {
                controller.flush().await;
                match sync.reconcile(controller.identity()).await {
                    Ok(report) => print_report(&report),
                    Err(e) => eprintln!("{}", format!("Sync failed: {}", e).red()),
                }
            }
            ReplCommand::Usage(usage) => println!("{}", format!("Usage: {}", usage).yellow()),
            ReplCommand::Unknown(command) => {
                println!("{}", format!("Unknown command: {}", command).bright_black())
            }
        }
    }

    println!("{}", "Goodbye!".bright_green());
    sync.shutdown().await;
    Ok(())
}

async fn ask(controller: &mut ConversationController, question: &str) {
    println!("{}", "...".bright_black());
    match controller.submit(question).await {
        Ok(answer) => {
            println!("{}", render_answer(&answer.text));
            println!();
        }
        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
    }
}

fn print_transcript(controller: &ConversationController) {
    for message in controller.transcript().messages() {
        match message.role {
            MessageRole::User => println!("{}", format!("> {}", message.text).green()),
            MessageRole::Assistant => println!("{}", render_answer(&message.text)),
        }
        println!();
    }
}

fn print_help() {
    let lines = [
        ("/new", "start a new conversation"),
        ("/history", "list conversations"),
        ("/load <n>", "open conversation <n> from the last listing"),
        ("/delete <n>", "delete conversation <n> from the last listing"),
        ("/sync", "push locally cached conversations to the store"),
        ("quit", "exit"),
    ];
    for (command, description) in lines {
        println!("  {:<12} {}", command.bright_cyan(), description.bright_black());
    }
}

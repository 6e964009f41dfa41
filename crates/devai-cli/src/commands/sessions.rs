use crate::context::{AppContext, Credentials};
use anyhow::Result;
use colored::Colorize;
use devai_core::session::ChatSession;

pub async fn run(ctx: &AppContext, credentials: &Credentials) -> Result<()> {
    let identity = ctx.require_login(credentials).await?;
    let sessions = ctx.synchronizer().load_sessions(Some(&identity)).await?;
    if sessions.is_empty() {
        println!("{}", "No stored conversations.".bright_black());
        return Ok(());
    }
    print_sessions(&sessions);
    Ok(())
}

/// Prints a numbered session list; the numbers are what `/load` and
/// `/delete` take.
pub fn print_sessions(sessions: &[ChatSession]) {
    for (i, session) in sessions.iter().enumerate() {
        println!(
            "{} {}  {}",
            format!("{:>2}.", i + 1).bright_black(),
            session.title.bold(),
            session.updated_at.bright_black()
        );
    }
}

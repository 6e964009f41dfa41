use crate::context::AppContext;
use anyhow::Result;
use colored::Colorize;
use devai_application::RegistrationService;

pub async fn run(ctx: &AppContext, username: &str, email: &str, password: &str) -> Result<()> {
    if !ctx.config.store.is_remote() {
        println!(
            "{}",
            "No store URL configured; the account only lives for this process.".yellow()
        );
    }
    let user = RegistrationService::new(ctx.store())
        .register(username, email, password)
        .await?;
    println!(
        "{}",
        format!("Registered {} <{}> (id {})", user.name, user.email, user.id).bright_green()
    );
    Ok(())
}

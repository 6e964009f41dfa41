use crate::context::{AppContext, Credentials};
use anyhow::Result;
use colored::Colorize;
use devai_application::ReconcileReport;

pub async fn run(ctx: &AppContext, credentials: &Credentials) -> Result<()> {
    let identity = ctx.require_login(credentials).await?;
    let report = ctx.synchronizer().reconcile(Some(&identity)).await?;
    print_report(&report);
    Ok(())
}

pub fn print_report(report: &ReconcileReport) {
    let summary = format!(
        "Replayed {} cached conversation(s), {} new session(s), {} skipped",
        report.replayed, report.created, report.skipped
    );
    if report.failed > 0 {
        println!("{}", format!("{}, {} failed", summary, report.failed).yellow());
    } else {
        println!("{}", summary.bright_green());
    }
}

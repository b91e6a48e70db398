//! One-shot directory sync

use anyhow::Context;

use crate::config::Config;
use crate::models::directory::SyncOutcome;
use crate::state::SharedState;

pub async fn cmd_sync(config: Config) -> anyhow::Result<()> {
    let shared = SharedState::new(config).await?;

    let Some(reconciler) = shared.reconciler.as_ref() else {
        println!("Directory is not configured; set [directory] url and base_dn first.");
        return Ok(());
    };

    let report = reconciler.sync_all().await;

    print_outcome("Users", report.users);
    print_outcome("Computers", report.computers);

    if !report.is_complete() {
        anyhow::bail!("Directory sync finished with errors, see log output");
    }

    let stored = shared
        .store
        .list_active_users()
        .await
        .context("Failed to count active users")?;
    println!("{} active users in the registry.", stored.len());

    Ok(())
}

fn print_outcome(label: &str, outcome: Option<SyncOutcome>) {
    match outcome {
        Some(outcome) => println!(
            "{label}: {} synced, {} deactivated",
            outcome.synced, outcome.deactivated
        ),
        None => println!("{label}: failed"),
    }
}

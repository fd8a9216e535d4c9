use clap::{ArgAction, Args};

use crate::cli::Outcome;
use crate::client::Store;
use crate::core::Workflow;
use crate::Result;

#[derive(Args, Debug)]
pub struct BackupCommand {
    /// Keep values that are not printable ascii
    #[arg(long, action = ArgAction::SetTrue)]
    no_filter: bool,
}

impl BackupCommand {
    pub async fn run<S: Store>(self, workflow: &mut Workflow<S>) -> Result<Outcome> {
        let summary = workflow.backup(!self.no_filter).await?;

        println!(
            "{} keys written to {}, {} skipped",
            summary.written,
            workflow.settings().backup_path.display(),
            summary.skipped.len()
        );
        for (key, reason) in summary.skipped {
            println!("  skipped {}: {}", key, reason);
        }

        Ok(Outcome::Done)
    }
}

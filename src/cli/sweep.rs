use clap::Args;

use crate::cli::Outcome;
use crate::client::Store;
use crate::core::Workflow;
use crate::Result;

#[derive(Args, Debug)]
pub struct SweepKeysCommand {}

impl SweepKeysCommand {
    pub async fn run<S: Store>(self, workflow: &mut Workflow<S>) -> Result<Outcome> {
        let throttle = workflow.settings().policy.throttle;
        println!(
            "deleting keys matching {} without ttl, pausing {}s every {} deletions",
            workflow.settings().pattern,
            throttle.pause.as_secs(),
            throttle.every
        );

        let summary = workflow.sweep().await?;
        println!("{}", summary);

        Ok(Outcome::Done)
    }
}

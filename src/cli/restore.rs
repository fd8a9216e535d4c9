use clap::Args;

use crate::cli::Outcome;
use crate::client::Store;
use crate::core::Workflow;
use crate::Result;

#[derive(Args, Debug)]
pub struct RestoreCommand {}

impl RestoreCommand {
    pub async fn run<S: Store>(self, workflow: &mut Workflow<S>) -> Result<Outcome> {
        let summary = workflow.restore().await?;
        println!("{}", summary);

        Ok(Outcome::Done)
    }
}

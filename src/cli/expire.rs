use clap::Args;

use crate::cli::Outcome;
use crate::client::Store;
use crate::core::Workflow;
use crate::Result;

#[derive(Args, Debug)]
pub struct ExpireCommand {}

impl ExpireCommand {
    pub async fn run<S: Store>(self, workflow: &mut Workflow<S>) -> Result<Outcome> {
        let summary = workflow.expire().await?;
        println!("{}", summary);

        Ok(Outcome::Done)
    }
}

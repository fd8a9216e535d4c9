use clap::Args;

use crate::cli::Outcome;
use crate::client::Store;
use crate::core::Workflow;
use crate::Result;

#[derive(Args, Debug)]
pub struct PingCommand {
    /// Ping counts
    #[arg(long, short = 'c', default_value_t = 1)]
    count: u32,
}

impl PingCommand {
    pub async fn run<S: Store>(self, workflow: &mut Workflow<S>) -> Result<Outcome> {
        for current in 1..=self.count {
            let latency = workflow.ping().await?;
            println!(
                "ping (latency {}ms) {}/{}",
                latency.num_milliseconds(),
                current,
                self.count
            );
        }

        Ok(Outcome::Done)
    }
}

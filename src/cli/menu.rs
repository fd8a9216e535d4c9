use clap::Args;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::cli::Outcome;
use crate::client::Store;
use crate::common::{error, warn, SweepError};
use crate::core::Workflow;
use crate::Result;

const MENU: &str = "\
1) ping
2) backup keys without ttl (printable values only)
3) set expiration on backed up keys
4) delete backed up keys
5) restore backed up keys
6) backup keys without ttl (all values)
7) delete keys without ttl while scanning
0) exit
> ";

/// One menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Ping,
    Backup,
    Expire,
    Delete,
    Restore,
    BackupUnfiltered,
    Sweep,
    Exit,
}

impl Choice {
    /// Parse one input line. Anything else is not a selection.
    pub fn parse(line: &str) -> Option<Choice> {
        let choice = match line.trim() {
            "1" => Choice::Ping,
            "2" => Choice::Backup,
            "3" => Choice::Expire,
            "4" => Choice::Delete,
            "5" => Choice::Restore,
            "6" => Choice::BackupUnfiltered,
            "7" => Choice::Sweep,
            "0" => Choice::Exit,
            _ => return None,
        };
        Some(choice)
    }
}

#[derive(Args, Debug)]
pub struct MenuCommand {}

impl MenuCommand {
    pub async fn run<S: Store>(self, workflow: &mut Workflow<S>) -> Result<Outcome> {
        run_menu(workflow, BufReader::new(io::stdin()), io::stdout()).await
    }
}

/// Read selections until exit or end of input.
///
/// Errors are reported and the menu is shown again, except fatal ones which
/// end the loop.
pub async fn run_menu<S, R, W>(
    workflow: &mut Workflow<S>,
    mut input: R,
    mut output: W,
) -> Result<Outcome>
where
    S: Store,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        output.write_all(MENU.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(Outcome::Done);
        }

        let choice = match Choice::parse(&line) {
            Some(choice) => choice,
            None => continue,
        };
        if choice == Choice::Exit {
            return Ok(Outcome::ExitRequested);
        }

        match select(workflow, choice).await {
            Ok(report) => {
                output.write_all(report.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                error!("{}", err);
                report_error(&mut output, &err).await?;
            }
        }
    }
}

async fn select<S: Store>(workflow: &mut Workflow<S>, choice: Choice) -> Result<String> {
    let report = match choice {
        Choice::Ping => {
            let latency = workflow.ping().await?;
            format!("PONG (latency {}ms)", latency.num_milliseconds())
        }
        Choice::Backup | Choice::BackupUnfiltered => {
            let summary = workflow.backup(choice == Choice::Backup).await?;
            for (key, reason) in summary.skipped.iter() {
                warn!(%key, %reason, "left out of backup");
            }
            format!("{} keys written, {} skipped", summary.written, summary.skipped.len())
        }
        Choice::Expire => workflow.expire().await?.to_string(),
        Choice::Delete => workflow.delete().await?.to_string(),
        Choice::Restore => workflow.restore().await?.to_string(),
        Choice::Sweep => workflow.sweep().await?.to_string(),
        Choice::Exit => String::new(),
    };
    Ok(report)
}

async fn report_error<W>(output: &mut W, err: &SweepError) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(format!("error: {}\n", err).as_bytes()).await?;
    Ok(())
}

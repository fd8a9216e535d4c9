use ttlsweep::cli::{self, Outcome, SweepCommand};
use ttlsweep::{config, SweepError};

fn init_tracing() {
    use tracing_subscriber::{
        filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt as _, Registry,
    };

    Registry::default()
        .with(
            fmt::Layer::new()
                .with_ansi(true)
                .with_file(false)
                .with_line_number(false)
                .with_target(true)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .with(
            EnvFilter::try_from_env(config::env::LOG_DIRECTIVE)
                .or_else(|_| EnvFilter::try_new("info"))
                .unwrap(),
        )
        .init();
}

fn main() {
    init_tracing();

    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap()
        .block_on(async {
            run().await;
        })
}

async fn run() {
    match run_inner().await {
        Ok(Outcome::Done) => (),
        Ok(Outcome::ExitRequested) => std::process::exit(1),
        Err(err) => {
            let code = match err {
                SweepError::Unauthenticated => {
                    eprintln!("unauthenticated");
                    2
                }
                _ => {
                    tracing::error!("{}", err);
                    eprintln!("{}", err);
                    1
                }
            };
            std::process::exit(code);
        }
    }
}

async fn run_inner() -> ttlsweep::Result<Outcome> {
    let SweepCommand { options, command } = cli::parse();

    command.run(options).await
}

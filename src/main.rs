use anyhow::Result;
use clap::Parser;
use job_portal::cli::{handle_command, Cli};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("job_portal=info,rocket::server=off"));

    if json {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        Registry::default().with(filter).with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    tracing::info!(
        "Environment: {}",
        std::env::var("JOBBOARD_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    );

    handle_command(cli).await
}

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use caseprep::app;
use caseprep::config::{LogFormat, Settings};

const DEFAULT_FILTER: &str =
    "info,sqlx=warn,sea_orm=warn,sea_orm_migration=warn,object_store=warn,hyper=warn,reqwest=warn";

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let log_layer = match format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(log_layer.with_filter(filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    // validate() has already accepted the format.
    init_logging(settings.log_format().unwrap_or(LogFormat::Text));

    info!("Starting prepdata");
    match app::execute(&settings).await {
        Ok(summary) => {
            info!(
                documents = summary.batch.documents.len(),
                failed_cases = summary.batch.failures.len(),
                "prepdata finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

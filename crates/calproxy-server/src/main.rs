//! calproxy entry point.

use std::process::ExitCode;

use calproxy_core::{TracingConfig, init_tracing};
use clap::Parser;
use tracing::{error, info};

use calproxy_server::cli::Cli;
use calproxy_server::serve;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::debug()
    } else {
        TracingConfig::service()
    }
    .with_format(cli.log_format);

    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        listen = %config.listen,
        backend = ?config.secret_backend,
        "starting calproxy"
    );

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

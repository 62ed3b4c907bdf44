// Copyright (c) 2026 Bilinear Labs
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use claimwatch::{
    ClaimsApp, cli::ClaimsArgs, configuration::ClaimsConfiguration, error_codes,
    telemetry::setup_tracing,
};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match ClaimsConfiguration::from_args(ClaimsArgs::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\x1b[31merror:\x1b[0m {e}");
            std::process::exit(e.exit_code());
        }
    };

    setup_tracing(config.verbosity)?;

    let app = match ClaimsApp::build_app(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to build the app: {e:#}");
            std::process::exit(error_codes::ERROR_CODE_WRONG_INPUT_ARGUMENTS);
        }
    };

    app.run().await
}

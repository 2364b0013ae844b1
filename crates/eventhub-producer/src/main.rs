// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod logger;

use std::env;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use eventhub_dispatch::config::ProducerConfig;
use eventhub_dispatch::eventhub::ProducerClient;
use eventhub_dispatch::{hostname, source, Dispatcher, DispatcherConfig};

#[tokio::main]
pub async fn main() -> ExitCode {
    let dotenv_result = dotenvy::dotenv();

    let log_level = env::var("EVENTHUB_LOG_LEVEL")
        .ok()
        .filter(|val| !val.trim().is_empty())
        .map(|val| val.trim().to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .event_format(logger::Formatter)
        .finish();
    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match dotenv_result {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {e}"),
    }

    let config = match ProducerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting event hub producer version={} host={} hub={} env={}",
        env!("CARGO_PKG_VERSION"),
        hostname::get_hostname(),
        config.event_hub,
        config.build_env
    );

    let events = match source::load_events(&config.payload_file) {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to load events: {e}");
            return ExitCode::FAILURE;
        }
    };

    let client = match ProducerClient::new(
        config.connection.clone(),
        &config.event_hub,
        config.client_options(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build event hub client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping after the current batch");
            signal_token.cancel();
        }
    });

    let dispatcher = Dispatcher::new(DispatcherConfig {
        submit_timeout: config.send_timeout,
        cancel_token,
    });

    let total = events.len();
    let span = info_span!("dispatch", hub = %config.event_hub);
    let result = dispatcher
        .dispatch_all(events, &client, &client)
        .instrument(span)
        .await;
    client.close();

    match result {
        Ok(summary) => {
            info!(
                "Sent {} events in {} batches to {}",
                summary.events, summary.batches, config.event_hub
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                "Dispatch of {total} events failed ({:?}, retriable={}): {e}",
                e.kind(),
                e.is_retriable()
            );
            ExitCode::FAILURE
        }
    }
}

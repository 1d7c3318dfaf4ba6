// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, sync::Arc};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use sumologic_sink::{Level, LogEvent, SinkConfig, SumoLogicLayer, SumoLogicSink};

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("SUMO_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    // The sink has to exist before the subscriber that feeds it
    let config = match SinkConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid Sumo Logic configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let period = config.period;
    let sink = match SumoLogicSink::start(config) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            eprintln!("Unable to start Sumo Logic sink: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let console_filter = EnvFilter::try_new(&env_filter).unwrap_or_else(|e| {
        eprintln!("Could not parse SUMO_LOG_LEVEL '{log_level}', using info: {e}");
        EnvFilter::new("info")
    });

    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .without_time()
                .with_filter(console_filter),
        )
        .with(SumoLogicLayer::new(Arc::clone(&sink)).with_min_level(Level::Info))
        .try_init();
    if let Err(e) = installed {
        eprintln!("Setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    info!(order_id = 1042, customer = "acme", "order {{order_id}} placed by {{customer}}");
    warn!(latency_ms = 870u64, "checkout latency {{latency_ms}}ms above target");

    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "payment gateway timed out");
    error!(error = &err as &(dyn std::error::Error + 'static), "payment failed");

    // Events can also be handed over without going through tracing
    sink.emit(
        LogEvent::new(Level::Info, "inventory for {sku} is {count}")
            .with_property("sku", "SKU-1138")
            .with_property("count", 3),
    );

    // Let the periodic flush deliver what was logged so far
    sleep(period + Duration::from_millis(250)).await;

    info!("shutting down sample");
    match sink.flush().await {
        Ok(batches) => debug!("Flushed {batches} batches before shutdown"),
        Err(e) => error!("Flush before shutdown failed: {e}"),
    }

    sink.dispose();
    ExitCode::SUCCESS
}

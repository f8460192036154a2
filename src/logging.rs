// ABOUTME: Logging configuration and structured logging setup for observability
// ABOUTME: Configures log levels and output format via tracing-subscriber
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

use crate::config::environment::Environment;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging
///
/// Production emits JSON lines; development gets the human-readable format.
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(level: &str, environment: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trellis_auth={level},tower_http=warn")));

    if environment.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging initialization.
//!
//! The crate logs through the `log` facade with a `[CONNECTOR]` or
//! `[LOOPBACK]` prefix. These helpers install `env_logger` for applications
//! that do not bring their own logger. Each returns an error, rather than
//! panicking, when a logger is already installed.

use log::{LevelFilter, SetLoggerError};

/// Console logging at `level`.
pub fn init_logging(level: LevelFilter) -> Result<(), SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
}

/// Console logging configured by `RUST_LOG`, `default_level` when unset.
pub fn init_logging_from_env(default_level: LevelFilter) -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.to_string()),
    )
    .format_timestamp_millis()
    .try_init()
}

/// Console logging with an explicit filter (e.g. `"dds_connector=debug,warn"`).
pub fn init_logging_with_filter(filter: &str) -> Result<(), SetLoggerError> {
    env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp_millis()
        .try_init()
}

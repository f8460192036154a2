// ABOUTME: Configuration module for environment-driven server settings
// ABOUTME: All runtime options come from the process environment, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

pub mod environment;

pub use environment::{Environment, ServerConfig, UpstreamConfig};

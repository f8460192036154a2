// ABOUTME: Permission records and their durable ledger
// ABOUTME: One row per (account, client) pair, revocation is monotonic

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

pub mod ledger;
pub mod models;

pub use ledger::PermissionLedger;
pub use models::Permission;

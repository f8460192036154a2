// ABOUTME: Asynchronous revocation notification pipeline
// ABOUTME: Message shape, redis stream queue, directory delivery resolution, worker loop

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Trellis Data Trust

pub mod delivery;
pub mod message;
pub mod queue;
pub mod worker;

pub use delivery::DeliveryResolver;
pub use message::RevocationMessage;
pub use queue::RevocationQueue;

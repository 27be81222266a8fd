// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides the thread-scoped state and the concrete aspects built on it.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements mod

pub mod ambient;
pub mod guards;
pub mod aspects;
pub mod logging_ext;

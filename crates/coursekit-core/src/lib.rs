// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Coursekit Core - Authoritative Enrollment & Progress Store
//!
//! This crate is the server-side half of the coursekit reconciliation engine.
//! It owns the durable tables the client SDK reconciles against: enrollment
//! records (current and legacy representations), pending payment requests,
//! single-use access codes, the lesson catalog, per-lesson watch progress, the
//! points ledger and course achievements.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Client devices                        │
//! │            (coursekit-sdk: resolver, sessions)            │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Persistence trait                        │
//! │   enrollments · payment requests · access codes ·         │
//! │   lessons · lesson progress · points · achievements       │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │   SQLite (sqlx)     │
//!                  └─────────────────────┘
//! ```
//!
//! # Write contracts
//!
//! The two writes with real semantics live here, next to the data they guard:
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `redeem_access_code` | Exactly-once: a conditional UPDATE claims the code inside a transaction; concurrent attempts resolve to one success and `CodeAlreadyUsed` for the rest |
//! | `upsert_lesson_progress` | Greatest-wins merge: out-of-order commits never move `watched_seconds`/`progress_percent` backwards and never clear `is_completed` |
//!
//! Everything else is conventional keyed reads the client-side resolver treats
//! as equally authoritative sources.
//!
//! # Modules
//!
//! - [`error`]: Error types with stable error-code mapping
//! - [`persistence`]: The `Persistence` trait, record types and the SQLite backend

#![deny(missing_docs)]

/// Error types for core operations with stable error-code mapping.
pub mod error;

/// Persistence trait, record types and SQLite backend.
pub mod persistence;

pub use error::{CoreError, Result};

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Coursekit SDK - Client-side enrollment and progress reconciliation.
//!
//! This crate is the client half of the coursekit reconciliation engine. It
//! decides, on the device, whether a student may watch a lesson, accounts
//! watch time, commits progress at milestone boundaries and runs completion
//! side effects, all while tolerating a flaky network.
//!
//! # Features
//!
//! - **Fail-open enrollment resolution**: a student once confirmed enrolled
//!   keeps access through backend outages; verdicts are cached locally with
//!   a trust window
//! - **Access-code redemption**: exactly-once server-side, typed errors
//!   client-side, cache primed on success
//! - **Watch-time accounting**: seconds count only while playing and
//!   visible; lessons complete at 80% of the configured duration
//! - **Milestone commits**: progress is committed at 25/50/75/100%, spawned
//!   off the tick path, merged greatest-wins by the server
//! - **Completion side effects**: idempotent points award, achievement
//!   check and delayed auto-advance, exactly once per session
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use coursekit_core::persistence::SqlitePersistence;
//! use coursekit_sdk::{CoursekitClient, SdkConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> coursekit_sdk::Result<()> {
//!     let persistence = Arc::new(SqlitePersistence::from_path("coursekit.db").await?);
//!     let client = CoursekitClient::embedded(persistence, SdkConfig::new("student-a"));
//!
//!     if !client.is_enrolled("rust-101").await {
//!         client.redeem_code("RUST-2024", "rust-101").await?;
//!     }
//!
//!     let mut session = client.open_lesson("rust-101-intro").await?;
//!     session.play();
//!
//!     let cancel = CancellationToken::new();
//!     if let Some(outcome) = session.run(&cancel).await {
//!         println!("completed, +{} points", outcome.points_awarded);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Via environment variables ([`SdkConfig::from_env`]) or programmatically:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `COURSEKIT_USER_ID` | Yes | - | Student identifier |
//! | `COURSEKIT_STUDENT_PHONE` | No | - | Phone for payment lookups |
//! | `COURSEKIT_RECENT_WINDOW_MS` | No | `300000` | Cache trust window |
//! | `COURSEKIT_CONFIRM_BACKOFF_MS` | No | `2000` | Confirmation retry backoff |
//! | `COURSEKIT_CONFIRM_RETRIES` | No | `1` | Confirmation retries |
//! | `COURSEKIT_ENROLLMENT_POLL_INTERVAL_MS` | No | `15000` | Background re-check |
//! | `COURSEKIT_COMPLETION_POINTS` | No | `50` | Points per completion |
//! | `COURSEKIT_AUTO_ADVANCE_DELAY_MS` | No | `3000` | Auto-advance delay |

pub mod backend;
mod cache;
mod client;
mod completion;
mod config;
mod enrollment;
mod error;
mod milestones;
mod redeem;
mod session;
mod types;
mod watch;

// Main types
pub use client::CoursekitClient;
pub use config::SdkConfig;
pub use error::{RedeemError, Result, SdkError};

// Components, for callers composing their own wiring
pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use completion::{ACTION_LESSON_COMPLETION, CompletionEngine};
pub use enrollment::EnrollmentResolver;
pub use milestones::{MILESTONES, MilestoneCommitter, MilestoneGuard, percent_of};
pub use redeem::AccessCodeRedeemer;
pub use session::LessonSession;
pub use watch::{PlaybackState, WatchTimer};

// Data types
pub use types::{
    CompletionOutcome, Enrollment, EnrollmentCacheEntry, LessonProgress, LessonSummary, NextStep,
    PaymentRequest, PaymentRequestStatus, REQUIRED_WATCH_RATIO, RedeemIdentity,
};

// Re-export the persistence trait for embedded deployments
pub use coursekit_core::persistence::Persistence;

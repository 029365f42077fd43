// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend abstraction for the SDK.
//!
//! A backend is where authoritative answers come from. The embedded backend
//! runs directly on top of a `coursekit-core` store; the HTTP backend (behind
//! the `http` feature) talks to the platform REST API. The resolver, the
//! redeemer and lesson sessions only see these traits.

pub mod embedded;

#[cfg(feature = "http")]
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{RedeemError, Result};
use crate::types::{Enrollment, LessonProgress, LessonSummary, PaymentRequest, RedeemIdentity};

/// One authoritative place enrollment can be recorded.
///
/// The platform has accumulated more than one representation of "this student
/// is enrolled". Each is wrapped as a source; the resolver treats a positive
/// answer from any of them as sufficient.
#[async_trait]
pub trait EnrollmentSource: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Whether an active enrollment exists for (user, course).
    async fn is_active(&self, user_id: &str, course_id: &str) -> Result<bool>;
}

/// Operations the SDK needs from an authoritative backend.
#[async_trait]
pub trait SdkBackend: Send + Sync {
    /// The enrollment representations this backend knows about, in the order
    /// they should be queried.
    fn enrollment_sources(&self) -> Vec<Arc<dyn EnrollmentSource>>;

    /// All payment requests submitted under a phone number.
    async fn payment_requests(&self, student_phone: &str) -> Result<Vec<PaymentRequest>>;

    /// Redeem a single-use access code for a course.
    ///
    /// Exactly-once semantics are enforced server-side; this call maps the
    /// outcome to typed [`RedeemError`]s.
    async fn redeem_code(
        &self,
        code: &str,
        course_id: &str,
        identity: &RedeemIdentity,
    ) -> std::result::Result<Enrollment, RedeemError>;

    /// Look up a lesson.
    async fn fetch_lesson(&self, lesson_id: &str) -> Result<Option<LessonSummary>>;

    /// The lesson following `lesson_id` within its course, or None when it is
    /// the last one.
    async fn next_lesson(&self, course_id: &str, lesson_id: &str)
    -> Result<Option<LessonSummary>>;

    /// Fetch a student's stored progress for a lesson within a course.
    async fn fetch_progress(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonProgress>>;

    /// Commit a progress snapshot. The server merges greatest-wins, so
    /// commits may be retried or arrive out of order safely.
    async fn commit_progress(&self, user_id: &str, progress: &LessonProgress) -> Result<()>;

    /// Award points, idempotent on (user, action, reference). Returns true
    /// when the award was newly written.
    async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        action: &str,
        reference_id: &str,
    ) -> Result<bool>;

    /// Evaluate achievement rules for a course and return the names newly
    /// granted by this call.
    async fn check_achievements(&self, user_id: &str, course_id: &str) -> Result<Vec<String>>;
}

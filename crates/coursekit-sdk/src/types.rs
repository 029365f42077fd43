// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client-side data types shared across the SDK.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fraction of the configured video duration that must be watched before a
/// lesson counts as complete.
pub const REQUIRED_WATCH_RATIO: f64 = 0.8;

/// A cached enrollment verdict with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentCacheEntry {
    /// Course the verdict is for.
    pub course_id: String,
    /// The cached verdict. Only `true` is ever written by the resolver.
    pub enrolled: bool,
    /// When the verdict was last written or re-confirmed.
    pub written_at: DateTime<Utc>,
}

impl EnrollmentCacheEntry {
    /// Whether the entry is recent enough to trust without a network round trip.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => now - self.written_at < window,
            Err(_) => false,
        }
    }
}

/// An enrollment as reported by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    /// Student the enrollment belongs to.
    pub user_id: String,
    /// Course the student is enrolled in.
    pub course_id: String,
    /// Whether the enrollment currently grants access.
    pub is_active: bool,
    /// When the enrollment was created.
    pub created_at: DateTime<Utc>,
}

/// Status of a pending payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRequestStatus {
    /// Submitted, awaiting approval.
    Pending,
    /// Approved; an enrollment record should exist shortly.
    Approved,
    /// Rejected.
    Rejected,
}

/// A payment request as reported by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Course the payment is for.
    pub course_id: String,
    /// Approval status.
    pub status: PaymentRequestStatus,
    /// Whether the request is still live.
    pub is_active: bool,
}

impl PaymentRequest {
    /// An active approved request is treated as proof that payment is in
    /// flight and grants optimistic access.
    pub fn grants_optimistic_access(&self) -> bool {
        self.is_active && self.status == PaymentRequestStatus::Approved
    }
}

/// Who is redeeming an access code. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedeemIdentity {
    /// Platform user id, preferred when present.
    pub user_id: Option<String>,
    /// Phone number fallback for students without an account.
    pub phone: Option<String>,
}

impl RedeemIdentity {
    /// Identity keyed by user id.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            phone: None,
        }
    }

    /// Identity keyed by phone number.
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            user_id: None,
            phone: Some(phone.into()),
        }
    }

    /// The id the enrollment will be recorded under. User id wins when both
    /// are present.
    pub fn canonical_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.phone.as_deref().filter(|p| !p.trim().is_empty()))
    }
}

/// A lesson as the client sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSummary {
    /// Lesson identifier.
    pub lesson_id: String,
    /// Course this lesson belongs to.
    pub course_id: String,
    /// Section index within the course.
    pub section: i64,
    /// Position within the section.
    pub position: i64,
    /// Configured video duration. Zero means "unknown".
    pub duration_minutes: i64,
    /// Preview lessons are playable without enrollment.
    pub is_preview: bool,
    /// Display title.
    pub title: String,
}

impl LessonSummary {
    /// Seconds of watch time required before this lesson completes.
    ///
    /// Zero-duration lessons return zero, which disables timer-driven
    /// completion entirely rather than completing instantly.
    pub fn required_watch_seconds(&self) -> u32 {
        if self.duration_minutes <= 0 {
            return 0;
        }
        ((self.duration_minutes * 60) as f64 * REQUIRED_WATCH_RATIO).round() as u32
    }
}

/// A progress snapshot the client commits to (or fetches from) a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    /// Lesson.
    pub lesson_id: String,
    /// Course (denormalized).
    pub course_id: String,
    /// Accumulated watched seconds.
    pub watched_seconds: u32,
    /// Percentage of the required watch threshold, 0..=100.
    pub progress_percent: u8,
    /// Whether the lesson is complete.
    pub is_completed: bool,
}

/// What the session should do after a lesson completes.
#[derive(Debug, Clone)]
pub enum NextStep {
    /// Advance to the next lesson in (section, position) order.
    Lesson(LessonSummary),
    /// That was the last lesson of the course.
    CourseCompleted,
    /// The next lesson could not be determined; remain on the current one.
    Stay,
}

/// Everything that happened when a lesson completed.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    /// The lesson that completed.
    pub lesson_id: String,
    /// Points newly awarded for this completion (zero on re-completion or
    /// when the award failed).
    pub points_awarded: i64,
    /// Achievement names newly granted by this completion.
    pub granted_achievements: Vec<String>,
    /// Where the session goes next.
    pub next: NextStep,
}

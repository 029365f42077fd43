//! Persistence interfaces and backends for coursekit-core.
//!
//! This module defines the authoritative-store abstraction the enrollment and
//! progress reconciliation depends on, and its backend implementations.

pub mod sqlite;

pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Current-representation enrollment record.
///
/// At most one active record exists per (user, course); presence of an active
/// record in either this table or the legacy one is sufficient proof of
/// enrollment.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct EnrollmentRecord {
    /// Student this enrollment belongs to.
    pub user_id: String,
    /// Course the student is enrolled in.
    pub course_id: String,
    /// Whether the enrollment currently grants access.
    pub is_active: bool,
    /// When the enrollment was created.
    pub created_at: DateTime<Utc>,
}

/// Legacy-representation enrollment record, kept equally authoritative.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct LegacyEnrollmentRecord {
    /// Student this enrollment belongs to (legacy id column name).
    pub student_id: String,
    /// Course the student is enrolled in.
    pub course_id: String,
    /// Whether the enrollment currently grants access.
    pub is_active: bool,
    /// When the enrollment was created.
    pub created_at: DateTime<Utc>,
}

/// Status of a payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Submitted, awaiting manual or gateway approval.
    Pending,
    /// Approved; an enrollment record should exist shortly.
    Approved,
    /// Rejected; never becomes an enrollment.
    Rejected,
}

impl PaymentStatus {
    /// Stable string form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the stored string form. Unknown values map to `Pending`.
    pub fn parse(value: &str) -> Self {
        match value {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// Pending payment request record.
///
/// An approved, active request is a weaker asynchronous signal that an
/// enrollment record should exist shortly.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct PaymentRequestRecord {
    /// Request identifier.
    pub id: String,
    /// Phone number the student submitted the payment under.
    pub student_phone: String,
    /// Course the payment is for.
    pub course_id: String,
    /// pending, approved or rejected.
    pub status: String,
    /// Whether the request is still live.
    pub is_active: bool,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl PaymentRequestRecord {
    /// Parsed status.
    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::parse(&self.status)
    }

    /// True when this request should be treated as proof-of-payment-in-flight.
    pub fn grants_optimistic_access(&self) -> bool {
        self.is_active && self.payment_status() == PaymentStatus::Approved
    }
}

/// Single-use access code record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct AccessCodeRecord {
    /// The code itself (unique).
    pub code: String,
    /// Course the code grants access to.
    pub course_id: String,
    /// Student who redeemed the code, if any.
    pub used_by: Option<String>,
    /// When the code was redeemed.
    pub used_at: Option<DateTime<Utc>>,
    /// When the code was created.
    pub created_at: DateTime<Utc>,
}

/// Lesson catalog record; ordering within a course is (section, position).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct LessonRecord {
    /// Lesson identifier.
    pub lesson_id: String,
    /// Course this lesson belongs to.
    pub course_id: String,
    /// Section index within the course.
    pub section: i64,
    /// Position within the section.
    pub position: i64,
    /// Configured video duration. Zero means "unknown" and disables
    /// timer-driven completion.
    pub duration_minutes: i64,
    /// Preview lessons are playable without enrollment.
    pub is_preview: bool,
    /// Display title.
    pub title: String,
}

/// Per-lesson watch progress record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct LessonProgressRecord {
    /// Student.
    pub user_id: String,
    /// Lesson.
    pub lesson_id: String,
    /// Course (denormalized for course-level queries).
    pub course_id: String,
    /// Accumulated watched seconds; merged greatest-wins on upsert.
    pub watched_seconds: i64,
    /// Percentage of the required watch threshold, 0..=100.
    pub progress_percent: i64,
    /// Whether the lesson is complete. Implies progress_percent >= 100.
    pub is_completed: bool,
    /// Last commit time.
    pub updated_at: DateTime<Utc>,
}

/// Points ledger entry. The (user, action, reference) triple is unique so
/// re-awards are detectable by the caller.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct PointsEntry {
    /// Database primary key.
    pub id: i64,
    /// Student.
    pub user_id: String,
    /// Points awarded by this entry.
    pub points: i64,
    /// Action tag, e.g. "lesson_completion".
    pub action: String,
    /// Idempotency reference, e.g. the lesson id.
    pub reference_id: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Granted achievement; grants are first-write-wins.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct AchievementRecord {
    /// Database primary key.
    pub id: i64,
    /// Student.
    pub user_id: String,
    /// Course the achievement is scoped to.
    pub course_id: String,
    /// Achievement name, e.g. "course_completed".
    pub name: String,
    /// When the achievement was granted.
    pub granted_at: DateTime<Utc>,
}

/// Authoritative-store operations the reconciliation core depends on.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Create or reactivate an enrollment for (user, course).
    async fn upsert_enrollment(&self, user_id: &str, course_id: &str) -> Result<EnrollmentRecord>;

    /// Whether an active current-representation enrollment exists.
    async fn enrollment_active(&self, user_id: &str, course_id: &str) -> Result<bool>;

    /// Create or reactivate a legacy-representation enrollment.
    async fn upsert_legacy_enrollment(&self, student_id: &str, course_id: &str) -> Result<()>;

    /// Whether an active legacy-representation enrollment exists.
    async fn legacy_enrollment_active(&self, student_id: &str, course_id: &str) -> Result<bool>;

    /// Record a payment request.
    async fn insert_payment_request(
        &self,
        student_phone: &str,
        course_id: &str,
        status: PaymentStatus,
        is_active: bool,
    ) -> Result<PaymentRequestRecord>;

    /// All payment requests submitted under a phone number, newest first.
    async fn list_payment_requests(&self, student_phone: &str)
    -> Result<Vec<PaymentRequestRecord>>;

    /// Mint a new single-use access code for a course.
    async fn create_access_code(&self, code: &str, course_id: &str) -> Result<()>;

    /// Look up an access code.
    async fn get_access_code(&self, code: &str) -> Result<Option<AccessCodeRecord>>;

    /// Redeem an access code for a student, exactly once.
    ///
    /// The claim is a conditional update inside a transaction: concurrent
    /// redemption attempts of the same code resolve to exactly one success,
    /// the rest fail with `CodeAlreadyUsed`. A successful claim creates (or
    /// reactivates) the enrollment in the same transaction.
    async fn redeem_access_code(
        &self,
        code: &str,
        course_id: &str,
        user_id: &str,
    ) -> Result<EnrollmentRecord>;

    /// Add a lesson to the catalog.
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<()>;

    /// Look up a lesson.
    async fn get_lesson(&self, lesson_id: &str) -> Result<Option<LessonRecord>>;

    /// The lesson following `lesson_id` in (section, position) order within
    /// its course, or None when it is the last lesson.
    async fn next_lesson(&self, course_id: &str, lesson_id: &str) -> Result<Option<LessonRecord>>;

    /// Fetch a student's progress for a lesson.
    async fn get_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonProgressRecord>>;

    /// Upsert progress with a greatest-wins merge.
    ///
    /// Commits may arrive out of order under network jitter; the stored row
    /// keeps the greatest watched_seconds and progress_percent seen, and
    /// is_completed once set never clears. Returns the merged row.
    async fn upsert_lesson_progress(
        &self,
        progress: &LessonProgressRecord,
    ) -> Result<LessonProgressRecord>;

    /// All completed lesson ids for a student within a course.
    async fn completed_lessons(&self, user_id: &str, course_id: &str) -> Result<Vec<String>>;

    /// Award points, idempotent on (user, action, reference).
    ///
    /// Returns true when the entry was newly written, false when an identical
    /// award already existed.
    async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        action: &str,
        reference_id: &str,
    ) -> Result<bool>;

    /// Sum of all points awarded to a student.
    async fn total_points(&self, user_id: &str) -> Result<i64>;

    /// Evaluate course-level achievement rules and grant anything newly
    /// earned. Returns the names granted by this call only.
    async fn check_achievements(&self, user_id: &str, course_id: &str) -> Result<Vec<String>>;

    /// All achievements a student holds for a course.
    async fn list_achievements(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<AchievementRecord>>;
}

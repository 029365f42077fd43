// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded backend running directly on a `coursekit-core` store.
//!
//! Used by single-process deployments and by the test suites. All trait
//! methods delegate to the [`Persistence`] layer and translate records into
//! the client-side types.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use coursekit_core::CoreError;
use coursekit_core::persistence::{
    LessonProgressRecord, LessonRecord, PaymentStatus, Persistence,
};

use crate::backend::{EnrollmentSource, SdkBackend};
use crate::error::{RedeemError, Result, SdkError};
use crate::types::{
    Enrollment, LessonProgress, LessonSummary, PaymentRequest, PaymentRequestStatus,
    RedeemIdentity,
};

fn backend_err(err: CoreError) -> SdkError {
    SdkError::Backend(err.to_string())
}

fn lesson_summary(record: LessonRecord) -> LessonSummary {
    LessonSummary {
        lesson_id: record.lesson_id,
        course_id: record.course_id,
        section: record.section,
        position: record.position,
        duration_minutes: record.duration_minutes,
        is_preview: record.is_preview,
        title: record.title,
    }
}

fn lesson_progress(record: LessonProgressRecord) -> LessonProgress {
    LessonProgress {
        lesson_id: record.lesson_id,
        course_id: record.course_id,
        watched_seconds: record.watched_seconds.max(0) as u32,
        progress_percent: record.progress_percent.clamp(0, 100) as u8,
        is_completed: record.is_completed,
    }
}

/// Current-representation enrollment table as a resolver source.
pub struct CurrentEnrollmentSource {
    persistence: Arc<dyn Persistence>,
}

#[async_trait]
impl EnrollmentSource for CurrentEnrollmentSource {
    fn name(&self) -> &'static str {
        "current"
    }

    async fn is_active(&self, user_id: &str, course_id: &str) -> Result<bool> {
        self.persistence
            .enrollment_active(user_id, course_id)
            .await
            .map_err(backend_err)
    }
}

/// Legacy-representation enrollment table, equally authoritative.
pub struct LegacyEnrollmentSource {
    persistence: Arc<dyn Persistence>,
}

#[async_trait]
impl EnrollmentSource for LegacyEnrollmentSource {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn is_active(&self, user_id: &str, course_id: &str) -> Result<bool> {
        self.persistence
            .legacy_enrollment_active(user_id, course_id)
            .await
            .map_err(backend_err)
    }
}

/// Backend that runs against an in-process authoritative store.
#[derive(Clone)]
pub struct EmbeddedBackend {
    persistence: Arc<dyn Persistence>,
}

impl EmbeddedBackend {
    /// Create an embedded backend over a persistence layer.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// The underlying store, for callers that also administer the catalog.
    pub fn persistence(&self) -> Arc<dyn Persistence> {
        self.persistence.clone()
    }
}

#[async_trait]
impl SdkBackend for EmbeddedBackend {
    fn enrollment_sources(&self) -> Vec<Arc<dyn EnrollmentSource>> {
        vec![
            Arc::new(CurrentEnrollmentSource {
                persistence: self.persistence.clone(),
            }),
            Arc::new(LegacyEnrollmentSource {
                persistence: self.persistence.clone(),
            }),
        ]
    }

    async fn payment_requests(&self, student_phone: &str) -> Result<Vec<PaymentRequest>> {
        let records = self
            .persistence
            .list_payment_requests(student_phone)
            .await
            .map_err(backend_err)?;

        Ok(records
            .into_iter()
            .map(|record| {
                let status = match record.payment_status() {
                    PaymentStatus::Pending => PaymentRequestStatus::Pending,
                    PaymentStatus::Approved => PaymentRequestStatus::Approved,
                    PaymentStatus::Rejected => PaymentRequestStatus::Rejected,
                };
                PaymentRequest {
                    course_id: record.course_id,
                    status,
                    is_active: record.is_active,
                }
            })
            .collect())
    }

    async fn redeem_code(
        &self,
        code: &str,
        course_id: &str,
        identity: &RedeemIdentity,
    ) -> std::result::Result<Enrollment, RedeemError> {
        let Some(user_id) = identity.canonical_id() else {
            return Err(RedeemError::IdentityMissing);
        };

        match self
            .persistence
            .redeem_access_code(code, course_id, user_id)
            .await
        {
            Ok(record) => Ok(Enrollment {
                user_id: record.user_id,
                course_id: record.course_id,
                is_active: record.is_active,
                created_at: record.created_at,
            }),
            Err(CoreError::CodeNotFound { .. }) => Err(RedeemError::CodeInvalid),
            Err(CoreError::CodeAlreadyUsed { .. }) => Err(RedeemError::CodeAlreadyUsed),
            Err(CoreError::CodeCourseMismatch { .. }) => Err(RedeemError::CourseMismatch),
            Err(e) => Err(RedeemError::Unavailable(e.to_string())),
        }
    }

    async fn fetch_lesson(&self, lesson_id: &str) -> Result<Option<LessonSummary>> {
        Ok(self
            .persistence
            .get_lesson(lesson_id)
            .await
            .map_err(backend_err)?
            .map(lesson_summary))
    }

    async fn next_lesson(
        &self,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonSummary>> {
        Ok(self
            .persistence
            .next_lesson(course_id, lesson_id)
            .await
            .map_err(backend_err)?
            .map(lesson_summary))
    }

    async fn fetch_progress(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonProgress>> {
        Ok(self
            .persistence
            .get_lesson_progress(user_id, lesson_id)
            .await
            .map_err(backend_err)?
            .filter(|record| record.course_id == course_id)
            .map(lesson_progress))
    }

    async fn commit_progress(&self, user_id: &str, progress: &LessonProgress) -> Result<()> {
        let record = LessonProgressRecord {
            user_id: user_id.to_string(),
            lesson_id: progress.lesson_id.clone(),
            course_id: progress.course_id.clone(),
            watched_seconds: progress.watched_seconds as i64,
            progress_percent: progress.progress_percent as i64,
            is_completed: progress.is_completed,
            updated_at: Utc::now(),
        };
        self.persistence
            .upsert_lesson_progress(&record)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        action: &str,
        reference_id: &str,
    ) -> Result<bool> {
        self.persistence
            .award_points(user_id, points, action, reference_id)
            .await
            .map_err(backend_err)
    }

    async fn check_achievements(&self, user_id: &str, course_id: &str) -> Result<Vec<String>> {
        self.persistence
            .check_achievements(user_id, course_id)
            .await
            .map_err(backend_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursekit_core::persistence::SqlitePersistence;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_backend() -> EmbeddedBackend {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        SqlitePersistence::migrate(&pool)
            .await
            .expect("Failed to run migrations");
        EmbeddedBackend::new(Arc::new(SqlitePersistence::new(pool)))
    }

    #[tokio::test]
    async fn test_redeem_maps_core_errors() {
        let backend = test_backend().await;

        let err = backend
            .redeem_code("NOPE", "rust-101", &RedeemIdentity::user("student-a"))
            .await
            .unwrap_err();
        assert_eq!(err, RedeemError::CodeInvalid);

        backend
            .persistence()
            .create_access_code("CODE-1", "rust-101")
            .await
            .unwrap();
        let err = backend
            .redeem_code("CODE-1", "go-201", &RedeemIdentity::user("student-a"))
            .await
            .unwrap_err();
        assert_eq!(err, RedeemError::CourseMismatch);

        let err = backend
            .redeem_code("CODE-1", "rust-101", &RedeemIdentity::default())
            .await
            .unwrap_err();
        assert_eq!(err, RedeemError::IdentityMissing);
    }

    #[tokio::test]
    async fn test_phone_identity_is_accepted() {
        let backend = test_backend().await;

        backend
            .persistence()
            .create_access_code("CODE-1", "rust-101")
            .await
            .unwrap();

        let enrollment = backend
            .redeem_code("CODE-1", "rust-101", &RedeemIdentity::phone("+48123"))
            .await
            .unwrap();
        assert_eq!(enrollment.user_id, "+48123");
        assert!(enrollment.is_active);
    }

    #[tokio::test]
    async fn test_fetch_progress_is_scoped_to_the_course() {
        let backend = test_backend().await;

        let progress = LessonProgress {
            lesson_id: "l1".to_string(),
            course_id: "rust-101".to_string(),
            watched_seconds: 118,
            progress_percent: 25,
            is_completed: false,
        };
        backend.commit_progress("student-a", &progress).await.unwrap();

        let found = backend
            .fetch_progress("student-a", "rust-101", "l1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.watched_seconds, 118);
        assert_eq!(found.course_id, "rust-101");

        // The same lesson queried under another course yields nothing.
        assert!(
            backend
                .fetch_progress("student-a", "go-201", "l1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_sources_cover_both_representations() {
        let backend = test_backend().await;
        let sources = backend.enrollment_sources();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["current", "legacy"]);

        backend
            .persistence()
            .upsert_legacy_enrollment("student-a", "rust-101")
            .await
            .unwrap();

        assert!(!sources[0].is_active("student-a", "rust-101").await.unwrap());
        assert!(sources[1].is_active("student-a", "rust-101").await.unwrap());
    }
}

//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoreError;

use super::{
    AccessCodeRecord, AchievementRecord, EnrollmentRecord, LessonProgressRecord, LessonRecord,
    PaymentRequestRecord, PaymentStatus, Persistence,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Achievement granted when the first lesson of a course is completed.
pub const ACHIEVEMENT_FIRST_LESSON: &str = "first_lesson";
/// Achievement granted when every lesson of a course is completed.
pub const ACHIEVEMENT_COURSE_COMPLETED: &str = "course_completed";

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates parent directories and the database file when missing,
    /// connects with sensible defaults, and runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        MIGRATOR.run(&pool).await.map_err(|e| CoreError::Database {
            operation: "migrate".to_string(),
            details: format!("Failed to run migrations: {}", e),
        })?;

        Ok(Self { pool })
    }

    /// Run migrations on an externally created pool (e.g. in-memory tests).
    pub async fn migrate(pool: &SqlitePool) -> Result<(), CoreError> {
        MIGRATOR.run(pool).await.map_err(|e| CoreError::Database {
            operation: "migrate".to_string(),
            details: format!("Failed to run migrations: {}", e),
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn upsert_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<EnrollmentRecord, CoreError> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, course_id, is_active, created_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (user_id, course_id) DO UPDATE SET is_active = 1
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, EnrollmentRecord>(
            r#"
            SELECT user_id, course_id, is_active, created_at
            FROM enrollments
            WHERE user_id = ? AND course_id = ?
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn enrollment_active(&self, user_id: &str, course_id: &str) -> Result<bool, CoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM enrollments
            WHERE user_id = ? AND course_id = ? AND is_active = 1
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn upsert_legacy_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO legacy_enrollments (student_id, course_id, is_active, created_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (student_id, course_id) DO UPDATE SET is_active = 1
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn legacy_enrollment_active(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<bool, CoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM legacy_enrollments
            WHERE student_id = ? AND course_id = ? AND is_active = 1
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn insert_payment_request(
        &self,
        student_phone: &str,
        course_id: &str,
        status: PaymentStatus,
        is_active: bool,
    ) -> Result<PaymentRequestRecord, CoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO payment_requests (id, student_phone, course_id, status, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(student_phone)
        .bind(course_id)
        .bind(status.as_str())
        .bind(is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(PaymentRequestRecord {
            id,
            student_phone: student_phone.to_string(),
            course_id: course_id.to_string(),
            status: status.as_str().to_string(),
            is_active,
            created_at: now,
        })
    }

    async fn list_payment_requests(
        &self,
        student_phone: &str,
    ) -> Result<Vec<PaymentRequestRecord>, CoreError> {
        let records = sqlx::query_as::<_, PaymentRequestRecord>(
            r#"
            SELECT id, student_phone, course_id, status, is_active, created_at
            FROM payment_requests
            WHERE student_phone = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(student_phone)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn create_access_code(&self, code: &str, course_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO access_codes (code, course_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(code)
        .bind(course_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_access_code(&self, code: &str) -> Result<Option<AccessCodeRecord>, CoreError> {
        let record = sqlx::query_as::<_, AccessCodeRecord>(
            r#"
            SELECT code, course_id, used_by, used_at, created_at
            FROM access_codes
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn redeem_access_code(
        &self,
        code: &str,
        course_id: &str,
        user_id: &str,
    ) -> Result<EnrollmentRecord, CoreError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, AccessCodeRecord>(
            r#"
            SELECT code, course_id, used_by, used_at, created_at
            FROM access_codes
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        let record = match existing {
            None => {
                return Err(CoreError::CodeNotFound {
                    code: code.to_string(),
                });
            }
            Some(record) => record,
        };

        if record.course_id != course_id {
            return Err(CoreError::CodeCourseMismatch {
                code: code.to_string(),
                bound_course_id: record.course_id,
                requested_course_id: course_id.to_string(),
            });
        }

        if record.used_by.is_some() {
            return Err(CoreError::CodeAlreadyUsed {
                code: code.to_string(),
            });
        }

        // The claim itself. The used_by IS NULL guard is what makes concurrent
        // redemption attempts of the same code resolve to exactly one success.
        let claimed = sqlx::query(
            r#"
            UPDATE access_codes
            SET used_by = ?, used_at = ?
            WHERE code = ? AND used_by IS NULL
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(code)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Err(CoreError::CodeAlreadyUsed {
                code: code.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, course_id, is_active, created_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (user_id, course_id) DO UPDATE SET is_active = 1
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let enrollment = sqlx::query_as::<_, EnrollmentRecord>(
            r#"
            SELECT user_id, course_id, is_active, created_at
            FROM enrollments
            WHERE user_id = ? AND course_id = ?
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(code = %code, user_id = %user_id, "Access code redeemed");
        Ok(enrollment)
    }

    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO lessons (lesson_id, course_id, section, position, duration_minutes, is_preview, title)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lesson.lesson_id)
        .bind(&lesson.course_id)
        .bind(lesson.section)
        .bind(lesson.position)
        .bind(lesson.duration_minutes)
        .bind(lesson.is_preview)
        .bind(&lesson.title)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_lesson(&self, lesson_id: &str) -> Result<Option<LessonRecord>, CoreError> {
        let record = sqlx::query_as::<_, LessonRecord>(
            r#"
            SELECT lesson_id, course_id, section, position, duration_minutes, is_preview, title
            FROM lessons
            WHERE lesson_id = ?
            "#,
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn next_lesson(
        &self,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonRecord>, CoreError> {
        let current = self
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| CoreError::LessonNotFound {
                lesson_id: lesson_id.to_string(),
            })?;

        let record = sqlx::query_as::<_, LessonRecord>(
            r#"
            SELECT lesson_id, course_id, section, position, duration_minutes, is_preview, title
            FROM lessons
            WHERE course_id = ?
              AND (section > ? OR (section = ? AND position > ?))
            ORDER BY section, position
            LIMIT 1
            "#,
        )
        .bind(course_id)
        .bind(current.section)
        .bind(current.section)
        .bind(current.position)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonProgressRecord>, CoreError> {
        let record = sqlx::query_as::<_, LessonProgressRecord>(
            r#"
            SELECT user_id, lesson_id, course_id, watched_seconds,
                   progress_percent, is_completed, updated_at
            FROM lesson_progress
            WHERE user_id = ? AND lesson_id = ?
            "#,
        )
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert_lesson_progress(
        &self,
        progress: &LessonProgressRecord,
    ) -> Result<LessonProgressRecord, CoreError> {
        // Greatest-wins merge: commits can arrive out of order, so the stored
        // row keeps the maximum of each monotonic column and is_completed
        // never clears once set.
        sqlx::query(
            r#"
            INSERT INTO lesson_progress
                (user_id, lesson_id, course_id, watched_seconds, progress_percent, is_completed, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, lesson_id) DO UPDATE SET
                watched_seconds = MAX(lesson_progress.watched_seconds, excluded.watched_seconds),
                progress_percent = MAX(lesson_progress.progress_percent, excluded.progress_percent),
                is_completed = MAX(lesson_progress.is_completed, excluded.is_completed),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&progress.user_id)
        .bind(&progress.lesson_id)
        .bind(&progress.course_id)
        .bind(progress.watched_seconds)
        .bind(progress.progress_percent)
        .bind(progress.is_completed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let merged = sqlx::query_as::<_, LessonProgressRecord>(
            r#"
            SELECT user_id, lesson_id, course_id, watched_seconds,
                   progress_percent, is_completed, updated_at
            FROM lesson_progress
            WHERE user_id = ? AND lesson_id = ?
            "#,
        )
        .bind(&progress.user_id)
        .bind(&progress.lesson_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(merged)
    }

    async fn completed_lessons(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<String>, CoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT lesson_id FROM lesson_progress
            WHERE user_id = ? AND course_id = ? AND is_completed = 1
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        action: &str,
        reference_id: &str,
    ) -> Result<bool, CoreError> {
        // Unique (user, action, reference) index makes retried awards no-ops.
        let result = sqlx::query(
            r#"
            INSERT INTO points_ledger (user_id, points, action, reference_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, action, reference_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(points)
        .bind(action)
        .bind(reference_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn total_points(&self, user_id: &str) -> Result<i64, CoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(points), 0) FROM points_ledger WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn check_achievements(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<String>, CoreError> {
        let total_lessons: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM lessons WHERE course_id = ?"#)
                .bind(course_id)
                .fetch_one(&self.pool)
                .await?;

        let completed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM lesson_progress
            WHERE user_id = ? AND course_id = ? AND is_completed = 1
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        let mut earned = Vec::new();
        if completed >= 1 {
            earned.push(ACHIEVEMENT_FIRST_LESSON);
        }
        if total_lessons > 0 && completed >= total_lessons {
            earned.push(ACHIEVEMENT_COURSE_COMPLETED);
        }

        let mut newly_granted = Vec::new();
        for name in earned {
            let result = sqlx::query(
                r#"
                INSERT INTO achievements (user_id, course_id, name, granted_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (user_id, course_id, name) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(course_id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                debug!(user_id = %user_id, course_id = %course_id, name = %name, "Achievement granted");
                newly_granted.push(name.to_string());
            }
        }

        Ok(newly_granted)
    }

    async fn list_achievements(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<AchievementRecord>, CoreError> {
        let records = sqlx::query_as::<_, AchievementRecord>(
            r#"
            SELECT id, user_id, course_id, name, granted_at
            FROM achievements
            WHERE user_id = ? AND course_id = ?
            ORDER BY granted_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the points ledger and achievement rules.

use chrono::Utc;
use coursekit_core::persistence::sqlite::{
    ACHIEVEMENT_COURSE_COMPLETED, ACHIEVEMENT_FIRST_LESSON,
};
use coursekit_core::persistence::{
    LessonProgressRecord, LessonRecord, Persistence, SqlitePersistence,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    SqlitePersistence::migrate(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn completed(lesson_id: &str) -> LessonProgressRecord {
    LessonProgressRecord {
        user_id: "student-a".to_string(),
        lesson_id: lesson_id.to_string(),
        course_id: "rust-101".to_string(),
        watched_seconds: 480,
        progress_percent: 100,
        is_completed: true,
        updated_at: Utc::now(),
    }
}

fn lesson(id: &str, position: i64) -> LessonRecord {
    LessonRecord {
        lesson_id: id.to_string(),
        course_id: "rust-101".to_string(),
        section: 0,
        position,
        duration_minutes: 10,
        is_preview: false,
        title: format!("Lesson {}", id),
    }
}

#[tokio::test]
async fn test_award_points_is_idempotent_per_reference() {
    let persistence = SqlitePersistence::new(test_pool().await);

    let first = persistence
        .award_points("student-a", 50, "lesson_completion", "lesson-1")
        .await
        .unwrap();
    assert!(first, "first award writes a ledger entry");

    // Retried award with the same (action, reference) tag is a no-op.
    let second = persistence
        .award_points("student-a", 50, "lesson_completion", "lesson-1")
        .await
        .unwrap();
    assert!(!second, "duplicate award must not write");

    assert_eq!(persistence.total_points("student-a").await.unwrap(), 50);

    // A different reference accrues normally.
    persistence
        .award_points("student-a", 50, "lesson_completion", "lesson-2")
        .await
        .unwrap();
    assert_eq!(persistence.total_points("student-a").await.unwrap(), 100);
}

#[tokio::test]
async fn test_first_lesson_achievement() {
    let persistence = SqlitePersistence::new(test_pool().await);

    persistence.insert_lesson(&lesson("a", 0)).await.unwrap();
    persistence.insert_lesson(&lesson("b", 1)).await.unwrap();

    persistence
        .upsert_lesson_progress(&completed("a"))
        .await
        .unwrap();

    let granted = persistence
        .check_achievements("student-a", "rust-101")
        .await
        .unwrap();
    assert_eq!(granted, vec![ACHIEVEMENT_FIRST_LESSON.to_string()]);

    // Second check grants nothing new.
    let granted = persistence
        .check_achievements("student-a", "rust-101")
        .await
        .unwrap();
    assert!(granted.is_empty());
}

#[tokio::test]
async fn test_course_completed_achievement() {
    let persistence = SqlitePersistence::new(test_pool().await);

    persistence.insert_lesson(&lesson("a", 0)).await.unwrap();
    persistence.insert_lesson(&lesson("b", 1)).await.unwrap();

    persistence
        .upsert_lesson_progress(&completed("a"))
        .await
        .unwrap();
    persistence
        .check_achievements("student-a", "rust-101")
        .await
        .unwrap();

    persistence
        .upsert_lesson_progress(&completed("b"))
        .await
        .unwrap();

    let granted = persistence
        .check_achievements("student-a", "rust-101")
        .await
        .unwrap();
    assert_eq!(granted, vec![ACHIEVEMENT_COURSE_COMPLETED.to_string()]);

    let all = persistence
        .list_achievements("student-a", "rust-101")
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_empty_course_never_grants_completion() {
    let persistence = SqlitePersistence::new(test_pool().await);

    let granted = persistence
        .check_achievements("student-a", "rust-101")
        .await
        .unwrap();
    assert!(granted.is_empty());
}

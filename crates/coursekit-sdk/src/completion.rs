// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lesson completion side effects.
//!
//! Once the 100% milestone commit is issued, completion is a persisted fact.
//! Everything in this module is decoration on top of that fact: points,
//! achievements and auto-advance are best-effort, fire once per session, and
//! never roll back or block the completion itself.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::SdkBackend;
use crate::config::SdkConfig;
use crate::milestones::MilestoneGuard;
use crate::types::{CompletionOutcome, LessonSummary, NextStep};

/// Action tag under which completion points are recorded in the ledger.
pub const ACTION_LESSON_COMPLETION: &str = "lesson_completion";

/// Runs the side effects of a lesson completing.
pub struct CompletionEngine {
    backend: Arc<dyn SdkBackend>,
    config: SdkConfig,
}

impl CompletionEngine {
    /// Create an engine for a student.
    pub fn new(backend: Arc<dyn SdkBackend>, config: SdkConfig) -> Self {
        Self { backend, config }
    }

    /// Fire completion side effects for a lesson, exactly once per session.
    ///
    /// Returns `None` when the guard shows the side effects already fired.
    /// Points and achievement failures are logged and reported as empty in
    /// the outcome; the auto-advance delay elapses before the next lesson is
    /// looked up.
    pub async fn complete(
        &self,
        guard: &mut MilestoneGuard,
        lesson: &LessonSummary,
    ) -> Option<CompletionOutcome> {
        if !guard.mark_completed(&lesson.lesson_id) {
            return None;
        }

        let points_awarded = match self
            .backend
            .award_points(
                &self.config.user_id,
                self.config.completion_points,
                ACTION_LESSON_COMPLETION,
                &lesson.lesson_id,
            )
            .await
        {
            Ok(true) => self.config.completion_points,
            // An existing ledger entry means this lesson was completed in an
            // earlier session.
            Ok(false) => 0,
            Err(e) => {
                warn!(lesson_id = %lesson.lesson_id, error = %e, "points award failed");
                0
            }
        };

        let granted_achievements = match self
            .backend
            .check_achievements(&self.config.user_id, &lesson.course_id)
            .await
        {
            Ok(granted) => granted,
            Err(e) => {
                warn!(lesson_id = %lesson.lesson_id, error = %e, "achievement check failed");
                Vec::new()
            }
        };

        info!(
            lesson_id = %lesson.lesson_id,
            points_awarded,
            achievements = granted_achievements.len(),
            "lesson completed"
        );

        tokio::time::sleep(self.config.auto_advance_delay()).await;

        let next = match self
            .backend
            .next_lesson(&lesson.course_id, &lesson.lesson_id)
            .await
        {
            Ok(Some(next)) => NextStep::Lesson(next),
            Ok(None) => NextStep::CourseCompleted,
            Err(e) => {
                warn!(lesson_id = %lesson.lesson_id, error = %e, "next lesson lookup failed");
                NextStep::Stay
            }
        };

        Some(CompletionOutcome {
            lesson_id: lesson.lesson_id.clone(),
            points_awarded,
            granted_achievements,
            next,
        })
    }
}

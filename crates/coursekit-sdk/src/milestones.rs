// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Milestone-gated progress commits.
//!
//! Progress is committed to the backend only when watch progress crosses a
//! milestone threshold, never per tick. [`MilestoneGuard`] remembers which
//! milestones this session has already committed; marking happens before
//! the commit is issued, so a retried or slow commit can never double-fire
//! a milestone. A failed intermediate commit is only logged: the next
//! milestone commits fresher numbers anyway, and the server merges
//! greatest-wins. A failed 100% commit is unmarked instead, so a later tick
//! retries it.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::SdkBackend;
use crate::types::{LessonProgress, LessonSummary};

/// Thresholds, in percent of the required watch time, at which progress is
/// committed.
pub const MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// Percentage of the required watch time, clamped to 0..=100.
///
/// A zero requirement (unknown video duration) always reads as zero so such
/// lessons can never complete through the timer.
pub fn percent_of(watched_seconds: u32, required_seconds: u32) -> u8 {
    if required_seconds == 0 {
        return 0;
    }
    let percent = (f64::from(watched_seconds) / f64::from(required_seconds) * 100.0).round();
    if percent >= 100.0 { 100 } else { percent as u8 }
}

/// Per-session record of which milestones have fired.
#[derive(Debug, Default)]
pub struct MilestoneGuard {
    reached: HashSet<(String, u8)>,
    completed: HashSet<String>,
}

impl MilestoneGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a milestone as reached. Returns true when it was not already
    /// marked.
    pub fn mark_reached(&mut self, lesson_id: &str, percent: u8) -> bool {
        self.reached.insert((lesson_id.to_string(), percent))
    }

    /// Forget a marked milestone so a later tick can retry its commit.
    pub fn clear_reached(&mut self, lesson_id: &str, percent: u8) -> bool {
        self.reached.remove(&(lesson_id.to_string(), percent))
    }

    /// Whether a milestone has been marked.
    pub fn is_reached(&self, lesson_id: &str, percent: u8) -> bool {
        self.reached.contains(&(lesson_id.to_string(), percent))
    }

    /// Mark a lesson's completion side effects as fired. Returns true when
    /// they were not already.
    pub fn mark_completed(&mut self, lesson_id: &str) -> bool {
        self.completed.insert(lesson_id.to_string())
    }

    /// Whether completion side effects have fired for a lesson.
    pub fn is_completed(&self, lesson_id: &str) -> bool {
        self.completed.contains(lesson_id)
    }

    /// Pre-mark everything a stored progress snapshot already covers, so a
    /// resumed session does not re-commit milestones from a previous one.
    pub fn seed_from_progress(&mut self, lesson_id: &str, percent: u8, completed: bool) {
        for threshold in MILESTONES {
            if percent >= threshold {
                self.mark_reached(lesson_id, threshold);
            }
        }
        if completed {
            self.mark_completed(lesson_id);
        }
    }
}

/// Issues milestone commits as watch progress crosses thresholds.
pub struct MilestoneCommitter {
    backend: Arc<dyn SdkBackend>,
    user_id: String,
}

impl MilestoneCommitter {
    /// Create a committer for a student.
    pub fn new(backend: Arc<dyn SdkBackend>, user_id: impl Into<String>) -> Self {
        Self {
            backend,
            user_id: user_id.into(),
        }
    }

    /// React to a new watched-seconds total.
    ///
    /// Every milestone threshold newly covered by the current percentage is
    /// marked in the guard and committed. Intermediate commits are spawned
    /// so the tick path never waits on the network; the 100% commit is
    /// awaited because the completion side effects read the row it writes.
    /// When that commit fails, the milestone is unmarked so a later tick
    /// retries it. Returns true when the 100% commit landed on this call.
    pub async fn on_tick(
        &self,
        guard: &mut MilestoneGuard,
        lesson: &LessonSummary,
        watched_seconds: u32,
    ) -> bool {
        let percent = percent_of(watched_seconds, lesson.required_watch_seconds());
        let mut completed_now = false;

        for threshold in MILESTONES {
            if percent < threshold || !guard.mark_reached(&lesson.lesson_id, threshold) {
                continue;
            }

            debug!(lesson_id = %lesson.lesson_id, threshold, percent, "milestone reached");
            let progress = LessonProgress {
                lesson_id: lesson.lesson_id.clone(),
                course_id: lesson.course_id.clone(),
                watched_seconds,
                progress_percent: percent,
                is_completed: threshold == 100,
            };

            if threshold == 100 {
                if let Err(e) = self.backend.commit_progress(&self.user_id, &progress).await {
                    // Unlike the intermediate milestones, nothing fresher is
                    // coming: unmark so the next tick retries the commit.
                    warn!(
                        lesson_id = %lesson.lesson_id,
                        threshold,
                        error = %e,
                        "completion commit failed"
                    );
                    guard.clear_reached(&lesson.lesson_id, threshold);
                } else {
                    completed_now = true;
                }
            } else {
                self.spawn_commit(progress, threshold);
            }
        }

        completed_now
    }

    fn spawn_commit(&self, progress: LessonProgress, threshold: u8) {
        let backend = self.backend.clone();
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.commit_progress(&user_id, &progress).await {
                // The next milestone carries fresher numbers; greatest-wins
                // merging on the server makes skipping a retry safe.
                warn!(
                    lesson_id = %progress.lesson_id,
                    threshold,
                    error = %e,
                    "milestone commit failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::backend::EnrollmentSource;
    use crate::error::{RedeemError, Result, SdkError};
    use crate::types::{Enrollment, PaymentRequest, RedeemIdentity};

    /// Backend whose next completion commit fails, then recovers.
    #[derive(Default)]
    struct FlakyCommitBackend {
        fail_next_completion: AtomicBool,
        completion_commits: Mutex<Vec<LessonProgress>>,
    }

    #[async_trait]
    impl SdkBackend for FlakyCommitBackend {
        fn enrollment_sources(&self) -> Vec<Arc<dyn EnrollmentSource>> {
            Vec::new()
        }

        async fn payment_requests(&self, _student_phone: &str) -> Result<Vec<PaymentRequest>> {
            Ok(Vec::new())
        }

        async fn redeem_code(
            &self,
            _code: &str,
            _course_id: &str,
            _identity: &RedeemIdentity,
        ) -> std::result::Result<Enrollment, RedeemError> {
            Err(RedeemError::CodeInvalid)
        }

        async fn fetch_lesson(&self, _lesson_id: &str) -> Result<Option<LessonSummary>> {
            Ok(None)
        }

        async fn next_lesson(
            &self,
            _course_id: &str,
            _lesson_id: &str,
        ) -> Result<Option<LessonSummary>> {
            Ok(None)
        }

        async fn fetch_progress(
            &self,
            _user_id: &str,
            _course_id: &str,
            _lesson_id: &str,
        ) -> Result<Option<LessonProgress>> {
            Ok(None)
        }

        async fn commit_progress(&self, _user_id: &str, progress: &LessonProgress) -> Result<()> {
            if progress.is_completed {
                if self.fail_next_completion.swap(false, Ordering::SeqCst) {
                    return Err(SdkError::Backend("store offline".to_string()));
                }
                self.completion_commits.lock().unwrap().push(progress.clone());
            }
            Ok(())
        }

        async fn award_points(
            &self,
            _user_id: &str,
            _points: i64,
            _action: &str,
            _reference_id: &str,
        ) -> Result<bool> {
            Ok(true)
        }

        async fn check_achievements(
            &self,
            _user_id: &str,
            _course_id: &str,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn ten_minute_lesson() -> LessonSummary {
        LessonSummary {
            lesson_id: "l1".to_string(),
            course_id: "rust-101".to_string(),
            section: 0,
            position: 0,
            duration_minutes: 10,
            is_preview: false,
            title: "Lesson l1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_completion_commit_is_retried_on_next_tick() {
        let backend = Arc::new(FlakyCommitBackend {
            fail_next_completion: AtomicBool::new(true),
            ..Default::default()
        });
        let committer = MilestoneCommitter::new(backend.clone(), "student-a");
        let lesson = ten_minute_lesson();

        let mut guard = MilestoneGuard::new();
        // Earlier milestones were already committed this session.
        guard.seed_from_progress("l1", 75, false);

        // 478 s of a 480 s requirement rounds to 100%, but the commit fails.
        assert!(!committer.on_tick(&mut guard, &lesson, 478).await);
        assert!(
            !guard.is_reached("l1", 100),
            "a failed completion commit must stay retryable"
        );
        assert!(backend.completion_commits.lock().unwrap().is_empty());

        // The next tick retries and lands it.
        assert!(committer.on_tick(&mut guard, &lesson, 479).await);
        assert!(guard.is_reached("l1", 100));

        let commits = backend.completion_commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].watched_seconds, 479);
        assert!(commits[0].is_completed);
    }

    #[test]
    fn test_percent_of_rounds_and_clamps() {
        assert_eq!(percent_of(0, 480), 0);
        assert_eq!(percent_of(120, 480), 25);
        assert_eq!(percent_of(121, 480), 25);
        assert_eq!(percent_of(479, 480), 100, "99.79% rounds to 100");
        assert_eq!(percent_of(477, 480), 99);
        assert_eq!(percent_of(9999, 480), 100);
    }

    #[test]
    fn test_percent_of_zero_requirement() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(10_000, 0), 0);
    }

    #[test]
    fn test_guard_marks_once() {
        let mut guard = MilestoneGuard::new();
        assert!(guard.mark_reached("l1", 25));
        assert!(!guard.mark_reached("l1", 25));
        assert!(guard.mark_reached("l1", 50));
        assert!(guard.mark_reached("l2", 25), "guards are per lesson");

        assert!(guard.mark_completed("l1"));
        assert!(!guard.mark_completed("l1"));
    }

    #[test]
    fn test_seed_from_progress_covers_prior_milestones() {
        let mut guard = MilestoneGuard::new();
        guard.seed_from_progress("l1", 50, false);

        assert!(guard.is_reached("l1", 25));
        assert!(guard.is_reached("l1", 50));
        assert!(!guard.is_reached("l1", 75));
        assert!(!guard.is_completed("l1"));

        guard.seed_from_progress("l2", 100, true);
        assert!(guard.is_reached("l2", 100));
        assert!(guard.is_completed("l2"));
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lesson viewing sessions.
//!
//! A [`LessonSession`] wires the pieces together for one open lesson: the
//! enrollment gate, the resumed watch timer, milestone-gated commits and
//! completion side effects. The host drives it either tick by tick
//! ([`LessonSession::tick`]) or with the built-in one-second loop
//! ([`LessonSession::run`]).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::SdkBackend;
use crate::completion::CompletionEngine;
use crate::config::SdkConfig;
use crate::enrollment::EnrollmentResolver;
use crate::error::{Result, SdkError};
use crate::milestones::{MilestoneCommitter, MilestoneGuard};
use crate::types::{CompletionOutcome, LessonSummary};
use crate::watch::{PlaybackState, WatchTimer};

/// One student viewing one lesson.
pub struct LessonSession {
    lesson: LessonSummary,
    timer: WatchTimer,
    guard: MilestoneGuard,
    committer: MilestoneCommitter,
    completion: CompletionEngine,
}

impl LessonSession {
    /// Open a lesson for viewing.
    ///
    /// Enforces the access gate: non-preview lessons require the resolver to
    /// confirm enrollment, otherwise [`SdkError::NotEnrolled`] is returned.
    /// Stored progress is fetched once so the timer resumes where the
    /// student left off and previously committed milestones stay committed.
    pub async fn open(
        backend: Arc<dyn SdkBackend>,
        resolver: &EnrollmentResolver,
        config: SdkConfig,
        lesson_id: &str,
    ) -> Result<Self> {
        let lesson = backend
            .fetch_lesson(lesson_id)
            .await?
            .ok_or_else(|| SdkError::LessonNotFound {
                lesson_id: lesson_id.to_string(),
            })?;

        if !lesson.is_preview && !resolver.resolve(&lesson.course_id, false).await {
            return Err(SdkError::NotEnrolled {
                course_id: lesson.course_id.clone(),
            });
        }

        let mut timer = WatchTimer::new(&lesson);
        let mut guard = MilestoneGuard::new();
        if let Some(progress) = backend
            .fetch_progress(&config.user_id, &lesson.course_id, lesson_id)
            .await?
        {
            debug!(
                lesson_id,
                watched_seconds = progress.watched_seconds,
                progress_percent = progress.progress_percent,
                "resuming from stored progress"
            );
            timer.seed(progress.watched_seconds, progress.is_completed);
            guard.seed_from_progress(lesson_id, progress.progress_percent, progress.is_completed);
        }

        let committer = MilestoneCommitter::new(backend.clone(), &config.user_id);
        let completion = CompletionEngine::new(backend, config);

        Ok(Self {
            lesson,
            timer,
            guard,
            committer,
            completion,
        })
    }

    /// The lesson this session plays.
    pub fn lesson(&self) -> &LessonSummary {
        &self.lesson
    }

    /// Seconds already watched, for seeking the player on resume.
    pub fn resume_offset(&self) -> u32 {
        self.timer.watched_seconds()
    }

    /// Current playback state.
    pub fn playback_state(&self) -> PlaybackState {
        self.timer.state()
    }

    /// Whether completion side effects have fired (this session or a prior
    /// one).
    pub fn is_completed(&self) -> bool {
        self.timer.is_completed() || self.guard.is_completed(&self.lesson.lesson_id)
    }

    /// Start or resume playback. Never called implicitly.
    pub fn play(&mut self) {
        self.timer.play();
    }

    /// Pause playback.
    pub fn pause(&mut self) {
        self.timer.pause();
    }

    /// Stop playback for good.
    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// Forward page visibility from the host view.
    pub fn set_page_visible(&mut self, visible: bool) {
        self.timer.set_page_visible(visible);
    }

    /// Account one elapsed second.
    ///
    /// Intermediate milestone commits triggered by this tick are spawned,
    /// not awaited; the completion commit is.
    /// When the tick pushes the lesson across the completion threshold, the
    /// completion side effects run (once) and their outcome is returned.
    pub async fn tick(&mut self) -> Option<CompletionOutcome> {
        let watched = self.timer.tick()?;
        let completed_now = self
            .committer
            .on_tick(&mut self.guard, &self.lesson, watched)
            .await;

        if completed_now {
            self.timer.mark_completed();
            return self.completion.complete(&mut self.guard, &self.lesson).await;
        }
        None
    }

    /// Drive the session with a one-second tick loop until the lesson
    /// completes or the token is cancelled.
    ///
    /// Missed ticks are skipped rather than bursted, so a stall never
    /// counts more watch time than actually elapsed. Cancellation tears the
    /// loop down without a forced partial commit; milestones already
    /// committed stand.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Option<CompletionOutcome> {
        if self.is_completed() {
            return None;
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = ticker.tick() => {
                    if let Some(outcome) = self.tick().await {
                        return Some(outcome);
                    }
                }
            }
        }
    }
}

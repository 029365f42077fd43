// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Watch-time accounting.
//!
//! [`WatchTimer`] is a pure state machine: it owns no clock and no IO. The
//! session drives it with one [`WatchTimer::tick`] per elapsed second of
//! wall time, and the timer decides whether that second counts as watched.
//! A second counts only while playback is active and the page is visible,
//! so backgrounded tabs and paused players accrue nothing.

use crate::types::LessonSummary;

/// Playback states the timer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Player loaded, nothing started yet. Playback never auto-starts.
    Idle,
    /// Actively playing.
    Playing,
    /// Paused; accrued time is kept.
    Paused,
    /// Player torn down. Terminal.
    Stopped,
}

/// Accumulates watched seconds for one lesson.
#[derive(Debug)]
pub struct WatchTimer {
    watched_seconds: u32,
    required_watch_seconds: u32,
    state: PlaybackState,
    page_visible: bool,
    completed: bool,
}

impl WatchTimer {
    /// Create a timer for a lesson, starting from zero.
    pub fn new(lesson: &LessonSummary) -> Self {
        Self {
            watched_seconds: 0,
            required_watch_seconds: lesson.required_watch_seconds(),
            state: PlaybackState::Idle,
            page_visible: true,
            completed: false,
        }
    }

    /// Seed the timer from stored progress so a returning student continues
    /// where they left off. A lesson already completed never ticks again.
    pub fn seed(&mut self, watched_seconds: u32, completed: bool) {
        self.watched_seconds = watched_seconds;
        self.completed = completed;
    }

    /// Start or resume playback. Ignored once stopped or completed.
    pub fn play(&mut self) {
        if self.state != PlaybackState::Stopped && !self.completed {
            self.state = PlaybackState::Playing;
        }
    }

    /// Pause playback, keeping accrued time.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Tear the player down. Terminal.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Page visibility as reported by the host view.
    pub fn set_page_visible(&mut self, visible: bool) {
        self.page_visible = visible;
    }

    /// Mark the lesson completed; subsequent ticks accrue nothing.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Account one elapsed second of wall time.
    ///
    /// Returns the new watched total when the second counted, or `None`
    /// when it was discarded (not playing, page hidden, stopped, or the
    /// lesson is already complete).
    pub fn tick(&mut self) -> Option<u32> {
        if self.completed || self.state != PlaybackState::Playing || !self.page_visible {
            return None;
        }
        self.watched_seconds = self.watched_seconds.saturating_add(1);
        Some(self.watched_seconds)
    }

    /// Total seconds counted so far.
    pub fn watched_seconds(&self) -> u32 {
        self.watched_seconds
    }

    /// Seconds required before the lesson completes. Zero disables
    /// timer-driven completion.
    pub fn required_watch_seconds(&self) -> u32 {
        self.required_watch_seconds
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the lesson has been marked completed.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(duration_minutes: i64) -> LessonSummary {
        LessonSummary {
            lesson_id: "l1".to_string(),
            course_id: "c1".to_string(),
            section: 0,
            position: 0,
            duration_minutes,
            is_preview: false,
            title: "Intro".to_string(),
        }
    }

    #[test]
    fn test_never_counts_before_play() {
        let mut timer = WatchTimer::new(&lesson(10));
        assert_eq!(timer.state(), PlaybackState::Idle);
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.watched_seconds(), 0);
    }

    #[test]
    fn test_counts_only_while_playing_and_visible() {
        let mut timer = WatchTimer::new(&lesson(10));
        timer.play();
        assert_eq!(timer.tick(), Some(1));
        assert_eq!(timer.tick(), Some(2));

        timer.pause();
        assert_eq!(timer.tick(), None);

        timer.play();
        timer.set_page_visible(false);
        assert_eq!(timer.tick(), None);

        timer.set_page_visible(true);
        assert_eq!(timer.tick(), Some(3));
    }

    #[test]
    fn test_pause_keeps_accrued_time() {
        let mut timer = WatchTimer::new(&lesson(10));
        timer.play();
        timer.tick();
        timer.tick();
        timer.pause();
        timer.play();
        assert_eq!(timer.tick(), Some(3));
    }

    #[test]
    fn test_stop_is_terminal() {
        let mut timer = WatchTimer::new(&lesson(10));
        timer.play();
        timer.tick();
        timer.stop();
        timer.play();
        assert_eq!(timer.state(), PlaybackState::Stopped);
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn test_completed_lesson_never_ticks() {
        let mut timer = WatchTimer::new(&lesson(10));
        timer.seed(480, true);
        timer.play();
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.watched_seconds(), 480);
    }

    #[test]
    fn test_seed_resumes_from_stored_progress() {
        let mut timer = WatchTimer::new(&lesson(10));
        timer.seed(120, false);
        timer.play();
        assert_eq!(timer.tick(), Some(121));
    }

    #[test]
    fn test_zero_duration_disables_completion_threshold() {
        let timer = WatchTimer::new(&lesson(0));
        assert_eq!(timer.required_watch_seconds(), 0);
    }
}

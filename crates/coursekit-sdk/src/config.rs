// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK configuration for the enrollment and progress reconciliation client.

use std::env;
use std::time::Duration;

use crate::error::{Result, SdkError};

/// SDK configuration.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// User ID (required) - the student this client acts for
    pub user_id: String,
    /// Phone number the student may have submitted payments under (optional)
    pub student_phone: Option<String>,
    /// Cached enrollment verdicts younger than this are trusted without a
    /// network round trip (default: 300_000, five minutes)
    pub recent_window_ms: u64,
    /// Backoff before re-confirming a stale cached enrollment (default: 2_000)
    pub confirm_backoff_ms: u64,
    /// How many times a failed confirmation is retried after backoff
    /// (default: 1)
    pub confirm_retries: u32,
    /// Background enrollment re-check interval in milliseconds
    /// (default: 15_000). Set to 0 to disable the poller.
    pub enrollment_poll_interval_ms: u64,
    /// Points awarded per lesson completion (default: 50)
    pub completion_points: i64,
    /// Delay before auto-advancing to the next lesson after completion
    /// (default: 3_000)
    pub auto_advance_delay_ms: u64,
}

impl SdkConfig {
    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `COURSEKIT_USER_ID` - The student this client acts for
    ///
    /// # Optional Environment Variables
    /// - `COURSEKIT_STUDENT_PHONE` - Phone number used for payment lookups
    /// - `COURSEKIT_RECENT_WINDOW_MS` - Cache trust window (default: 300000)
    /// - `COURSEKIT_CONFIRM_BACKOFF_MS` - Confirmation retry backoff (default: 2000)
    /// - `COURSEKIT_CONFIRM_RETRIES` - Confirmation retries (default: 1)
    /// - `COURSEKIT_ENROLLMENT_POLL_INTERVAL_MS` - Background re-check interval (default: 15000, 0 to disable)
    /// - `COURSEKIT_COMPLETION_POINTS` - Points per lesson completion (default: 50)
    /// - `COURSEKIT_AUTO_ADVANCE_DELAY_MS` - Auto-advance delay (default: 3000)
    pub fn from_env() -> Result<Self> {
        let user_id = env::var("COURSEKIT_USER_ID")
            .map_err(|_| SdkError::Config("COURSEKIT_USER_ID is required".to_string()))?;

        let student_phone = env::var("COURSEKIT_STUDENT_PHONE").ok();

        let recent_window_ms = env::var("COURSEKIT_RECENT_WINDOW_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300_000);

        let confirm_backoff_ms = env::var("COURSEKIT_CONFIRM_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2_000);

        let confirm_retries = env::var("COURSEKIT_CONFIRM_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let enrollment_poll_interval_ms = env::var("COURSEKIT_ENROLLMENT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15_000);

        let completion_points = env::var("COURSEKIT_COMPLETION_POINTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);

        let auto_advance_delay_ms = env::var("COURSEKIT_AUTO_ADVANCE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3_000);

        Ok(Self {
            user_id,
            student_phone,
            recent_window_ms,
            confirm_backoff_ms,
            confirm_retries,
            enrollment_poll_interval_ms,
            completion_points,
            auto_advance_delay_ms,
        })
    }

    /// Create a configuration with defaults for a given student.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            student_phone: None,
            recent_window_ms: 300_000,
            confirm_backoff_ms: 2_000,
            confirm_retries: 1,
            enrollment_poll_interval_ms: 15_000,
            completion_points: 50,
            auto_advance_delay_ms: 3_000,
        }
    }

    /// Set the phone number used for pending-payment lookups.
    pub fn with_student_phone(mut self, phone: impl Into<String>) -> Self {
        self.student_phone = Some(phone.into());
        self
    }

    /// Set the cache trust window.
    pub fn with_recent_window_ms(mut self, ms: u64) -> Self {
        self.recent_window_ms = ms;
        self
    }

    /// Set the confirmation backoff.
    pub fn with_confirm_backoff_ms(mut self, ms: u64) -> Self {
        self.confirm_backoff_ms = ms;
        self
    }

    /// Set the background re-check interval. 0 disables the poller.
    pub fn with_enrollment_poll_interval_ms(mut self, ms: u64) -> Self {
        self.enrollment_poll_interval_ms = ms;
        self
    }

    /// Set the points awarded per lesson completion.
    pub fn with_completion_points(mut self, points: i64) -> Self {
        self.completion_points = points;
        self
    }

    /// Set the auto-advance delay.
    pub fn with_auto_advance_delay_ms(mut self, ms: u64) -> Self {
        self.auto_advance_delay_ms = ms;
        self
    }

    /// Cache trust window as a `Duration`.
    pub fn recent_window(&self) -> Duration {
        Duration::from_millis(self.recent_window_ms)
    }

    /// Confirmation backoff as a `Duration`.
    pub fn confirm_backoff(&self) -> Duration {
        Duration::from_millis(self.confirm_backoff_ms)
    }

    /// Background re-check interval as a `Duration`.
    pub fn enrollment_poll_interval(&self) -> Duration {
        Duration::from_millis(self.enrollment_poll_interval_ms)
    }

    /// Auto-advance delay as a `Duration`.
    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = SdkConfig::new("student-a");
        assert_eq!(config.user_id, "student-a");
        assert_eq!(config.student_phone, None);
        assert_eq!(config.recent_window_ms, 300_000);
        assert_eq!(config.confirm_backoff_ms, 2_000);
        assert_eq!(config.confirm_retries, 1);
        assert_eq!(config.enrollment_poll_interval_ms, 15_000);
        assert_eq!(config.completion_points, 50);
        assert_eq!(config.auto_advance_delay_ms, 3_000);
    }

    #[test]
    fn test_builder_methods() {
        let config = SdkConfig::new("student-a")
            .with_student_phone("+48123456789")
            .with_recent_window_ms(60_000)
            .with_confirm_backoff_ms(500)
            .with_enrollment_poll_interval_ms(0)
            .with_completion_points(10)
            .with_auto_advance_delay_ms(0);

        assert_eq!(config.student_phone.as_deref(), Some("+48123456789"));
        assert_eq!(config.recent_window(), Duration::from_secs(60));
        assert_eq!(config.confirm_backoff(), Duration::from_millis(500));
        assert_eq!(config.enrollment_poll_interval(), Duration::ZERO);
        assert_eq!(config.completion_points, 10);
        assert_eq!(config.auto_advance_delay(), Duration::ZERO);
    }
}

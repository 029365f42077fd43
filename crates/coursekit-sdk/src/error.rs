// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the coursekit SDK.

use thiserror::Error;

/// Result type using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur in SDK operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SdkError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend operation failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Lesson does not exist.
    #[error("lesson '{lesson_id}' not found")]
    LessonNotFound {
        /// The lesson that was requested.
        lesson_id: String,
    },

    /// The student is not enrolled and the lesson is not a preview.
    #[error("not enrolled in course '{course_id}'")]
    NotEnrolled {
        /// The gated course.
        course_id: String,
    },

    /// Access-code redemption failed.
    #[error(transparent)]
    Redeem(#[from] RedeemError),
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        SdkError::Backend(err.to_string())
    }
}

/// Typed redemption failures, stable enough to key user-facing messages on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RedeemError {
    /// The code does not exist (or was empty after trimming).
    #[error("access code is not valid")]
    CodeInvalid,

    /// The code was already redeemed by someone.
    #[error("access code has already been used")]
    CodeAlreadyUsed,

    /// The code is bound to a different course.
    #[error("access code belongs to a different course")]
    CourseMismatch,

    /// Neither a user id nor a phone number was supplied.
    #[error("a student id or phone number is required")]
    IdentityMissing,

    /// The redemption endpoint could not be reached or failed internally.
    #[error("redemption service unavailable: {0}")]
    Unavailable(String),
}

impl RedeemError {
    /// Map a stable backend error code to a typed redemption failure.
    pub(crate) fn from_error_code(code: &str, details: &str) -> Self {
        match code {
            "CODE_NOT_FOUND" => Self::CodeInvalid,
            "CODE_ALREADY_USED" => Self::CodeAlreadyUsed,
            "CODE_COURSE_MISMATCH" => Self::CourseMismatch,
            _ => Self::Unavailable(details.to_string()),
        }
    }
}

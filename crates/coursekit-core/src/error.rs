// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for coursekit-core.

use thiserror::Error;

/// Result type using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in the authoritative store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Access code does not exist.
    #[error("access code '{code}' not found")]
    CodeNotFound {
        /// The submitted code.
        code: String,
    },

    /// Access code has already been redeemed by another student.
    #[error("access code '{code}' already used")]
    CodeAlreadyUsed {
        /// The submitted code.
        code: String,
    },

    /// Access code is bound to a different course.
    #[error("access code '{code}' is for course '{bound_course_id}', not '{requested_course_id}'")]
    CodeCourseMismatch {
        /// The submitted code.
        code: String,
        /// Course the code actually grants access to.
        bound_course_id: String,
        /// Course the redemption was attempted for.
        requested_course_id: String,
    },

    /// Lesson does not exist in the catalog.
    #[error("lesson '{lesson_id}' not found")]
    LessonNotFound {
        /// The requested lesson.
        lesson_id: String,
    },

    /// Input validation failed.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Database operation failed.
    #[error("database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Driver-level detail.
        details: String,
    },
}

impl CoreError {
    /// Stable error code string, used by transport layers as a response code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CodeNotFound { .. } => "CODE_NOT_FOUND",
            Self::CodeAlreadyUsed { .. } => "CODE_ALREADY_USED",
            Self::CodeCourseMismatch { .. } => "CODE_COURSE_MISMATCH",
            Self::LessonNotFound { .. } => "LESSON_NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Database {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

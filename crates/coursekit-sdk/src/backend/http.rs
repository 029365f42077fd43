// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP backend against the platform REST API.
//!
//! Speaks the platform's camelCase JSON contract:
//!
//! - `GET  /enrollment/current?userId&courseId` -> `{active}`
//! - `GET  /enrollment/legacy?userId&courseId` -> `{active}`
//! - `GET  /payment-requests?studentPhone` -> `[{courseId, status, isActive}]`
//! - `POST /course-access-code {code, courseId, studentId|studentPhone}` -> `{success, message}`
//! - `GET  /lessons/{lessonId}` and `GET /lessons/{lessonId}/next?courseId`
//! - `GET  /lesson-progress?userId&lessonId&courseId` / `POST /lesson-progress`
//! - `POST /points/award {userId, points, action, referenceId}`
//! - `POST /achievements/check {userId, courseId}`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::backend::{EnrollmentSource, SdkBackend};
use crate::error::{RedeemError, Result, SdkError};
use crate::types::{
    Enrollment, LessonProgress, LessonSummary, PaymentRequest, RedeemIdentity,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[derive(Debug, Deserialize)]
struct ActiveResponse {
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequestDto {
    course_id: String,
    status: crate::types::PaymentRequestStatus,
    is_active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RedeemRequest<'a> {
    code: &'a str,
    course_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_phone: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedeemResponse {
    success: bool,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    enrollment: Option<EnrollmentDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollmentDto {
    user_id: String,
    course_id: String,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<EnrollmentDto> for Enrollment {
    fn from(dto: EnrollmentDto) -> Self {
        Self {
            user_id: dto.user_id,
            course_id: dto.course_id,
            is_active: dto.is_active,
            created_at: dto.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonDto {
    lesson_id: String,
    course_id: String,
    section: i64,
    position: i64,
    duration_minutes: i64,
    is_preview: bool,
    title: String,
}

impl From<LessonDto> for LessonSummary {
    fn from(dto: LessonDto) -> Self {
        Self {
            lesson_id: dto.lesson_id,
            course_id: dto.course_id,
            section: dto.section,
            position: dto.position,
            duration_minutes: dto.duration_minutes,
            is_preview: dto.is_preview,
            title: dto.title,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressDto {
    watched_seconds: u32,
    progress_percent: u8,
    is_completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressCommit<'a> {
    user_id: &'a str,
    lesson_id: &'a str,
    course_id: &'a str,
    watched_seconds: u32,
    progress_percent: u8,
    is_completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PointsAward<'a> {
    user_id: &'a str,
    points: i64,
    action: &'a str,
    reference_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsAwardResponse {
    #[serde(default = "default_true")]
    newly_awarded: bool,
}

fn default_true() -> bool {
    true
}

/// Map a redemption response body to the typed outcome.
///
/// The documented contract answers `{success, message}` without echoing the
/// created enrollment. Servers that do include one are honored; otherwise the
/// enrollment is synthesized from what the caller already knows.
fn map_redeem_response(
    body: RedeemResponse,
    user_id: &str,
    course_id: &str,
) -> std::result::Result<Enrollment, RedeemError> {
    if body.success {
        Ok(body
            .enrollment
            .map(Enrollment::from)
            .unwrap_or_else(|| Enrollment {
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
                is_active: true,
                created_at: chrono::Utc::now(),
            }))
    } else {
        let message = body.message.unwrap_or_default();
        Err(RedeemError::from_error_code(
            body.error_code.as_deref().unwrap_or_default(),
            &message,
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AchievementCheck<'a> {
    user_id: &'a str,
    course_id: &'a str,
}

/// One enrollment REST route wrapped as a resolver source.
struct HttpEnrollmentSource {
    client: reqwest::Client,
    base_url: String,
    name: &'static str,
    route: &'static str,
}

#[async_trait]
impl EnrollmentSource for HttpEnrollmentSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn is_active(&self, user_id: &str, course_id: &str) -> Result<bool> {
        let url = format!(
            "{}{}?userId={}&courseId={}",
            self.base_url,
            self.route,
            encode(user_id),
            encode(course_id)
        );
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: ActiveResponse = response.json().await?;
        Ok(body.active)
    }
}

/// Backend that talks to the platform REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend for the given API base URL, e.g.
    /// `https://api.example.com`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a backend reusing an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SdkBackend for HttpBackend {
    fn enrollment_sources(&self) -> Vec<Arc<dyn EnrollmentSource>> {
        vec![
            Arc::new(HttpEnrollmentSource {
                client: self.client.clone(),
                base_url: self.base_url.clone(),
                name: "current",
                route: "/enrollment/current",
            }),
            Arc::new(HttpEnrollmentSource {
                client: self.client.clone(),
                base_url: self.base_url.clone(),
                name: "legacy",
                route: "/enrollment/legacy",
            }),
        ]
    }

    async fn payment_requests(&self, student_phone: &str) -> Result<Vec<PaymentRequest>> {
        let url = format!(
            "{}?studentPhone={}",
            self.url("/payment-requests"),
            encode(student_phone)
        );
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: Vec<PaymentRequestDto> = response.json().await?;
        Ok(body
            .into_iter()
            .map(|dto| PaymentRequest {
                course_id: dto.course_id,
                status: dto.status,
                is_active: dto.is_active,
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

        let request = RedeemRequest {
            code,
            course_id,
            student_id: identity.user_id.as_deref(),
            student_phone: identity.phone.as_deref(),
        };

        let response = self
            .client
            .post(self.url("/course-access-code"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RedeemError::Unavailable(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(RedeemError::Unavailable(format!(
                "redemption endpoint returned {}",
                response.status()
            )));
        }

        let body: RedeemResponse = response
            .json()
            .await
            .map_err(|e| RedeemError::Unavailable(e.to_string()))?;

        map_redeem_response(body, user_id, course_id)
    }

    async fn fetch_lesson(&self, lesson_id: &str) -> Result<Option<LessonSummary>> {
        let url = format!("{}/{}", self.url("/lessons"), encode(lesson_id));
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: LessonDto = response.error_for_status()?.json().await?;
        Ok(Some(body.into()))
    }

    async fn next_lesson(
        &self,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonSummary>> {
        let url = format!(
            "{}/{}/next?courseId={}",
            self.url("/lessons"),
            encode(lesson_id),
            encode(course_id)
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: LessonDto = response.error_for_status()?.json().await?;
        Ok(Some(body.into()))
    }

    async fn fetch_progress(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonProgress>> {
        let url = format!(
            "{}?userId={}&lessonId={}&courseId={}",
            self.url("/lesson-progress"),
            encode(user_id),
            encode(lesson_id),
            encode(course_id)
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ProgressDto = response.error_for_status()?.json().await?;
        Ok(Some(LessonProgress {
            lesson_id: lesson_id.to_string(),
            course_id: course_id.to_string(),
            watched_seconds: body.watched_seconds,
            progress_percent: body.progress_percent,
            is_completed: body.is_completed,
        }))
    }

    async fn commit_progress(&self, user_id: &str, progress: &LessonProgress) -> Result<()> {
        let commit = ProgressCommit {
            user_id,
            lesson_id: &progress.lesson_id,
            course_id: &progress.course_id,
            watched_seconds: progress.watched_seconds,
            progress_percent: progress.progress_percent,
            is_completed: progress.is_completed,
        };
        self.client
            .post(self.url("/lesson-progress"))
            .json(&commit)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        action: &str,
        reference_id: &str,
    ) -> Result<bool> {
        let award = PointsAward {
            user_id,
            points,
            action,
            reference_id,
        };
        let response = self
            .client
            .post(self.url("/points/award"))
            .json(&award)
            .send()
            .await?
            .error_for_status()?;
        let body: PointsAwardResponse = response.json().await?;
        Ok(body.newly_awarded)
    }

    async fn check_achievements(&self, user_id: &str, course_id: &str) -> Result<Vec<String>> {
        let check = AchievementCheck { user_id, course_id };
        let response = self
            .client
            .post(self.url("/achievements/check"))
            .json(&check)
            .send()
            .await?
            .error_for_status()?;
        let granted: Vec<String> = response.json().await?;
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = reqwest::Client::new();
        let backend = HttpBackend::with_client(client, "https://api.example.com///");
        assert_eq!(
            backend.url("/payment-requests"),
            "https://api.example.com/payment-requests"
        );
    }

    #[test]
    fn test_redeem_request_omits_absent_identity() {
        let request = RedeemRequest {
            code: "CODE-1",
            course_id: "rust-101",
            student_id: Some("u1"),
            student_phone: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["studentId"], "u1");
        assert!(json.get("studentPhone").is_none());
        assert_eq!(json["courseId"], "rust-101");
    }

    #[test]
    fn test_redeem_response_error_shape() {
        let body: RedeemResponse = serde_json::from_str(
            r#"{"success": false, "errorCode": "CODE_ALREADY_USED", "message": "taken"}"#,
        )
        .unwrap();
        assert!(!body.success);
        assert_eq!(body.error_code.as_deref(), Some("CODE_ALREADY_USED"));
    }

    #[test]
    fn test_redeem_success_without_enrollment_body() {
        // The documented contract answers only {success, message}.
        let body: RedeemResponse =
            serde_json::from_str(r#"{"success": true, "message": "enrolled"}"#).unwrap();

        let enrollment = map_redeem_response(body, "student-a", "rust-101").unwrap();
        assert_eq!(enrollment.user_id, "student-a");
        assert_eq!(enrollment.course_id, "rust-101");
        assert!(enrollment.is_active);
    }

    #[test]
    fn test_redeem_success_honors_returned_enrollment() {
        let body: RedeemResponse = serde_json::from_str(
            r#"{
                "success": true,
                "enrollment": {
                    "userId": "student-b",
                    "courseId": "go-201",
                    "isActive": true,
                    "createdAt": "2025-06-01T10:00:00Z"
                }
            }"#,
        )
        .unwrap();

        let enrollment = map_redeem_response(body, "student-a", "rust-101").unwrap();
        assert_eq!(enrollment.user_id, "student-b");
        assert_eq!(enrollment.course_id, "go-201");
    }

    #[test]
    fn test_redeem_failure_maps_error_code() {
        let body: RedeemResponse = serde_json::from_str(
            r#"{"success": false, "errorCode": "CODE_ALREADY_USED", "message": "taken"}"#,
        )
        .unwrap();

        let err = map_redeem_response(body, "student-a", "rust-101").unwrap_err();
        assert_eq!(err, RedeemError::CodeAlreadyUsed);
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Access-code redemption.
//!
//! Thin boundary in front of the backend's exactly-once redemption. Unlike
//! the resolver this surface is deliberately fail-closed: every failure is
//! a typed [`RedeemError`] shown to the student, and nothing touches the
//! cache until the backend has actually recorded the enrollment.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::backend::SdkBackend;
use crate::cache::CacheStore;
use crate::error::RedeemError;
use crate::types::{Enrollment, RedeemIdentity};

/// Redeems single-use access codes and primes the enrollment cache.
pub struct AccessCodeRedeemer {
    backend: Arc<dyn SdkBackend>,
    cache: Arc<dyn CacheStore>,
}

impl AccessCodeRedeemer {
    /// Create a redeemer over a backend and the shared cache store.
    pub fn new(backend: Arc<dyn SdkBackend>, cache: Arc<dyn CacheStore>) -> Self {
        Self { backend, cache }
    }

    /// Redeem `code` for `course_id` on behalf of `identity`.
    ///
    /// On success the enrollment cache is primed with `true` so the next
    /// resolution needs no network round trip. On failure nothing is
    /// cached or recorded.
    pub async fn redeem(
        &self,
        code: &str,
        course_id: &str,
        identity: &RedeemIdentity,
    ) -> Result<Enrollment, RedeemError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(RedeemError::CodeInvalid);
        }
        if identity.canonical_id().is_none() {
            return Err(RedeemError::IdentityMissing);
        }

        let enrollment = self.backend.redeem_code(code, course_id, identity).await?;

        self.cache.set(course_id, true, Utc::now());
        info!(course_id, user_id = %enrollment.user_id, "access code redeemed");

        Ok(enrollment)
    }
}

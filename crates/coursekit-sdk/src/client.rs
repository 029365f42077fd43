// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level client facade.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use coursekit_core::persistence::Persistence;

use crate::backend::SdkBackend;
use crate::backend::embedded::EmbeddedBackend;
use crate::cache::{CacheStore, MemoryCacheStore};
use crate::config::SdkConfig;
use crate::enrollment::EnrollmentResolver;
use crate::error::{RedeemError, Result};
use crate::redeem::AccessCodeRedeemer;
use crate::session::LessonSession;
use crate::types::{Enrollment, RedeemIdentity};

/// Everything a client device needs, wired together.
///
/// Owns the backend, the enrollment cache, the resolver and the redeemer,
/// and opens [`LessonSession`]s behind the enrollment gate.
pub struct CoursekitClient {
    backend: Arc<dyn SdkBackend>,
    config: SdkConfig,
    resolver: Arc<EnrollmentResolver>,
    redeemer: AccessCodeRedeemer,
}

impl CoursekitClient {
    /// Build a client over an arbitrary backend and cache store.
    pub fn new(
        backend: Arc<dyn SdkBackend>,
        cache: Arc<dyn CacheStore>,
        config: SdkConfig,
    ) -> Self {
        let resolver = Arc::new(EnrollmentResolver::new(
            backend.clone(),
            cache.clone(),
            config.clone(),
        ));
        let redeemer = AccessCodeRedeemer::new(backend.clone(), cache);
        Self {
            backend,
            config,
            resolver,
            redeemer,
        }
    }

    /// Client over an in-process authoritative store, with an in-memory
    /// enrollment cache. The deployment used by single-process setups and
    /// tests.
    pub fn embedded(persistence: Arc<dyn Persistence>, config: SdkConfig) -> Self {
        Self::new(
            Arc::new(EmbeddedBackend::new(persistence)),
            Arc::new(MemoryCacheStore::new()),
            config,
        )
    }

    /// Client over the platform REST API, with an in-memory enrollment
    /// cache. Pass a [`crate::FileCacheStore`] through [`Self::new`] for a
    /// cache that survives restarts.
    #[cfg(feature = "http")]
    pub fn http(base_url: impl Into<String>, config: SdkConfig) -> Result<Self> {
        let backend = crate::backend::http::HttpBackend::new(base_url)?;
        Ok(Self::new(
            Arc::new(backend),
            Arc::new(MemoryCacheStore::new()),
            config,
        ))
    }

    /// Whether the configured student may access a course. Fail-open; see
    /// [`EnrollmentResolver::resolve`].
    pub async fn is_enrolled(&self, course_id: &str) -> bool {
        self.resolver.resolve(course_id, false).await
    }

    /// Redeem an access code on behalf of the configured student.
    pub async fn redeem_code(
        &self,
        code: &str,
        course_id: &str,
    ) -> std::result::Result<Enrollment, RedeemError> {
        let identity = RedeemIdentity {
            user_id: Some(self.config.user_id.clone()),
            phone: self.config.student_phone.clone(),
        };
        self.redeemer.redeem(code, course_id, &identity).await
    }

    /// Open a lesson for viewing, enforcing the enrollment gate.
    pub async fn open_lesson(&self, lesson_id: &str) -> Result<LessonSession> {
        LessonSession::open(
            self.backend.clone(),
            &self.resolver,
            self.config.clone(),
            lesson_id,
        )
        .await
    }

    /// Keep the enrollment verdict for a course warm in the background.
    pub fn spawn_enrollment_poller(
        &self,
        course_id: impl Into<String>,
    ) -> (JoinHandle<()>, CancellationToken) {
        self.resolver.spawn_poller(course_id)
    }

    /// The shared resolver, for callers composing their own gating.
    pub fn resolver(&self) -> Arc<EnrollmentResolver> {
        self.resolver.clone()
    }

    /// The underlying backend.
    pub fn backend(&self) -> Arc<dyn SdkBackend> {
        self.backend.clone()
    }
}

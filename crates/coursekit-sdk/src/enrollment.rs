// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fail-open enrollment resolution.
//!
//! The resolver reconciles a local cached verdict with the authoritative
//! enrollment representations. Its one non-negotiable rule is fail-open: a
//! student who has ever been confirmed enrolled on this client keeps access,
//! even when every backend confirmation fails. Losing a paying student to a
//! network blip costs more than an extra free view ever could.
//!
//! Resolution order:
//!
//! 1. Fresh cached `true` (younger than the recent window, no force-refresh):
//!    trusted without any network traffic.
//! 2. Stale cached `true`: re-confirmed against each enrollment source, with
//!    one backed-off retry round.
//! 3. Confirmation failed or errored: keep access anyway and re-touch the
//!    cache (fail-open).
//! 4. No cached verdict: query the sources once; a hit caches `true`.
//! 5. Still nothing: an active approved payment request for the course
//!    grants optimistic access and caches `true`.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{EnrollmentSource, SdkBackend};
use crate::cache::CacheStore;
use crate::config::SdkConfig;

/// Query every source once; the first positive answer wins. Source errors
/// are logged and treated as "not confirmed".
pub(crate) async fn query_sources_once(
    sources: &[Arc<dyn EnrollmentSource>],
    user_id: &str,
    course_id: &str,
) -> bool {
    for source in sources {
        match source.is_active(user_id, course_id).await {
            Ok(true) => {
                debug!(source = source.name(), course_id, "enrollment confirmed");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(source = source.name(), course_id, error = %e, "enrollment source unavailable");
            }
        }
    }
    false
}

/// Query the sources, retrying after a backoff when nothing confirms.
pub(crate) async fn confirm_with_retry(
    sources: &[Arc<dyn EnrollmentSource>],
    user_id: &str,
    course_id: &str,
    backoff: std::time::Duration,
    retries: u32,
) -> bool {
    for attempt in 0..=retries {
        if attempt > 0 {
            tokio::time::sleep(backoff).await;
        }
        if query_sources_once(sources, user_id, course_id).await {
            return true;
        }
    }
    false
}

/// Reconciles cached enrollment verdicts with the authoritative sources.
pub struct EnrollmentResolver {
    cache: Arc<dyn CacheStore>,
    sources: Vec<Arc<dyn EnrollmentSource>>,
    backend: Arc<dyn SdkBackend>,
    config: SdkConfig,
}

impl EnrollmentResolver {
    /// Create a resolver over a backend and a cache store. The source list
    /// is taken from the backend.
    pub fn new(backend: Arc<dyn SdkBackend>, cache: Arc<dyn CacheStore>, config: SdkConfig) -> Self {
        Self {
            sources: backend.enrollment_sources(),
            cache,
            backend,
            config,
        }
    }

    /// Resolve whether the configured student may access a course.
    ///
    /// Infallible by design: every failure path collapses to a boolean
    /// verdict per the fail-open rule. `force_refresh` skips the fresh-cache
    /// fast path but never the fail-open fallback.
    pub async fn resolve(&self, course_id: &str, force_refresh: bool) -> bool {
        let cached = self.cache.get(course_id);

        if let Some(entry) = &cached
            && entry.enrolled
        {
            if !force_refresh && entry.is_fresh(Utc::now(), self.config.recent_window()) {
                debug!(course_id, "fresh cached enrollment, skipping confirmation");
                return true;
            }

            let confirmed = confirm_with_retry(
                &self.sources,
                &self.config.user_id,
                course_id,
                self.config.confirm_backoff(),
                self.config.confirm_retries,
            )
            .await;

            if !confirmed {
                // Fail-open: a previously confirmed enrollment survives
                // backend trouble. The touch restores the fast path.
                warn!(course_id, "enrollment confirmation failed, keeping cached access");
            }
            self.cache.touch(course_id, Utc::now());
            return true;
        }

        if query_sources_once(&self.sources, &self.config.user_id, course_id).await {
            self.cache.set(course_id, true, Utc::now());
            return true;
        }

        if self.pending_payment_grants_access(course_id).await {
            info!(course_id, "approved payment request grants optimistic access");
            self.cache.set(course_id, true, Utc::now());
            return true;
        }

        false
    }

    /// Whether an active, approved payment request exists for the course
    /// under the configured phone number.
    async fn pending_payment_grants_access(&self, course_id: &str) -> bool {
        let Some(phone) = &self.config.student_phone else {
            return false;
        };

        match self.backend.payment_requests(phone).await {
            Ok(requests) => requests
                .iter()
                .any(|r| r.course_id == course_id && r.grants_optimistic_access()),
            Err(e) => {
                warn!(course_id, error = %e, "payment request lookup failed");
                false
            }
        }
    }

    /// Spawn a background task that re-resolves the course on the configured
    /// interval, keeping the cached verdict warm while a lesson is open.
    ///
    /// Returns the task handle and a token that stops it. A zero interval
    /// returns an already finished task.
    pub fn spawn_poller(
        self: &Arc<Self>,
        course_id: impl Into<String>,
    ) -> (JoinHandle<()>, CancellationToken) {
        let token = CancellationToken::new();
        let child = token.clone();
        let resolver = Arc::clone(self);
        let course_id = course_id.into();
        let interval = self.config.enrollment_poll_interval();

        let handle = tokio::spawn(async move {
            if interval.is_zero() {
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let enrolled = resolver.resolve(&course_id, false).await;
                        debug!(course_id, enrolled, "periodic enrollment re-check");
                    }
                }
            }
        });

        (handle, token)
    }
}

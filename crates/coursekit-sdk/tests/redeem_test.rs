// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for client-side access-code redemption.
//!
//! These tests verify that:
//! 1. A successful redemption enrolls the student and primes the cache
//! 2. Every failure is a typed error and leaves the cache untouched
//! 3. The primed cache makes the next resolution local

use std::sync::Arc;

use coursekit_core::persistence::{Persistence, SqlitePersistence};
use coursekit_sdk::backend::embedded::EmbeddedBackend;
use coursekit_sdk::{
    AccessCodeRedeemer, CacheStore, CoursekitClient, MemoryCacheStore, RedeemError,
    RedeemIdentity, SdkConfig,
};
use sqlx::sqlite::SqlitePoolOptions;

async fn test_persistence() -> Arc<dyn Persistence> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    SqlitePersistence::migrate(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(SqlitePersistence::new(pool))
}

async fn redeemer_with_cache() -> (AccessCodeRedeemer, Arc<MemoryCacheStore>, Arc<dyn Persistence>)
{
    let persistence = test_persistence().await;
    let backend = Arc::new(EmbeddedBackend::new(persistence.clone()));
    let cache = Arc::new(MemoryCacheStore::new());
    let redeemer = AccessCodeRedeemer::new(backend, cache.clone());
    (redeemer, cache, persistence)
}

#[tokio::test]
async fn test_successful_redemption_enrolls_and_primes_cache() {
    let (redeemer, cache, persistence) = redeemer_with_cache().await;
    persistence
        .create_access_code("RUST-2024", "rust-101")
        .await
        .unwrap();

    let enrollment = redeemer
        .redeem("RUST-2024", "rust-101", &RedeemIdentity::user("student-a"))
        .await
        .expect("redemption should succeed");

    assert_eq!(enrollment.user_id, "student-a");
    assert!(enrollment.is_active);

    let entry = cache.get("rust-101").expect("cache must be primed");
    assert!(entry.enrolled);

    assert!(
        persistence
            .enrollment_active("student-a", "rust-101")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_code_is_trimmed_before_submission() {
    let (redeemer, _cache, persistence) = redeemer_with_cache().await;
    persistence
        .create_access_code("RUST-2024", "rust-101")
        .await
        .unwrap();

    redeemer
        .redeem("  RUST-2024  ", "rust-101", &RedeemIdentity::user("student-a"))
        .await
        .expect("whitespace around the code is not the student's problem");
}

#[tokio::test]
async fn test_empty_code_rejected_locally() {
    let (redeemer, cache, _persistence) = redeemer_with_cache().await;

    let err = redeemer
        .redeem("   ", "rust-101", &RedeemIdentity::user("student-a"))
        .await
        .unwrap_err();
    assert_eq!(err, RedeemError::CodeInvalid);
    assert!(cache.get("rust-101").is_none());
}

#[tokio::test]
async fn test_missing_identity_rejected_locally() {
    let (redeemer, cache, persistence) = redeemer_with_cache().await;
    persistence
        .create_access_code("RUST-2024", "rust-101")
        .await
        .unwrap();

    let err = redeemer
        .redeem("RUST-2024", "rust-101", &RedeemIdentity::default())
        .await
        .unwrap_err();
    assert_eq!(err, RedeemError::IdentityMissing);

    // Nothing was redeemed or cached.
    assert!(cache.get("rust-101").is_none());
    let code = persistence.get_access_code("RUST-2024").await.unwrap().unwrap();
    assert!(code.used_by.is_none());
}

#[tokio::test]
async fn test_used_code_fails_without_cache_mutation() {
    let (redeemer, cache, persistence) = redeemer_with_cache().await;
    persistence
        .create_access_code("RUST-2024", "rust-101")
        .await
        .unwrap();

    redeemer
        .redeem("RUST-2024", "rust-101", &RedeemIdentity::user("student-a"))
        .await
        .unwrap();

    // Student B tries the same code through their own client.
    let cache_b = Arc::new(MemoryCacheStore::new());
    let redeemer_b = AccessCodeRedeemer::new(
        Arc::new(EmbeddedBackend::new(persistence.clone())),
        cache_b.clone(),
    );

    let err = redeemer_b
        .redeem("RUST-2024", "rust-101", &RedeemIdentity::user("student-b"))
        .await
        .unwrap_err();
    assert_eq!(err, RedeemError::CodeAlreadyUsed);
    assert!(cache_b.get("rust-101").is_none());

    // Student A's cache and enrollment are unaffected.
    assert!(cache.get("rust-101").unwrap().enrolled);
}

#[tokio::test]
async fn test_course_mismatch_is_typed() {
    let (redeemer, cache, persistence) = redeemer_with_cache().await;
    persistence
        .create_access_code("RUST-2024", "rust-101")
        .await
        .unwrap();

    let err = redeemer
        .redeem("RUST-2024", "go-201", &RedeemIdentity::user("student-a"))
        .await
        .unwrap_err();
    assert_eq!(err, RedeemError::CourseMismatch);
    assert!(cache.get("go-201").is_none());
}

#[tokio::test]
async fn test_client_redeem_then_enrolled_without_network() {
    let persistence = test_persistence().await;
    persistence
        .create_access_code("RUST-2024", "rust-101")
        .await
        .unwrap();

    let client = CoursekitClient::embedded(persistence.clone(), SdkConfig::new("student-a"));
    assert!(!client.is_enrolled("rust-101").await);

    client.redeem_code("RUST-2024", "rust-101").await.unwrap();

    // The redemption primed the cache; this resolve is the fast path.
    assert!(client.is_enrolled("rust-101").await);
}

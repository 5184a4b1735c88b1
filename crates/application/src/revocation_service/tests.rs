use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use grantor_core::AppError;
use grantor_domain::{GrantStatus, PermissionGrant, PermissionId, PermissionScope};

use crate::test_support::TestEngine;
use crate::{
    CachedDecision, Clock, CreateGrantInput, DecisionCache, DecisionCacheKey, LifecycleEvent,
};

async fn seed_grant(
    engine: &TestEngine,
    subject: &str,
    permission_id: &PermissionId,
    expires_at: Option<DateTime<Utc>>,
) -> PermissionGrant {
    engine
        .grants
        .create_active_grant(CreateGrantInput {
            subject: subject.to_owned(),
            permission_id: permission_id.clone(),
            scope: PermissionScope::global(),
            granted_by: "admin".to_owned(),
            expires_at,
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap_or_else(|_| unreachable!("seed grant"))
}

async fn cache_allowance(engine: &TestEngine, subject: &str, permission_id: &PermissionId) {
    use grantor_domain::AccessDecision;

    let key = DecisionCacheKey {
        subject: subject.to_owned(),
        permission_id: permission_id.clone(),
        fingerprint: PermissionScope::global().fingerprint(),
    };
    let decision = CachedDecision {
        decision: AccessDecision::Granted {
            grant_id: grantor_core::GrantId::new(),
            expires_at: None,
        },
        cached_until: engine.clock.now() + Duration::minutes(5),
    };
    let cached = engine.cache.put(key, decision).await;
    assert!(cached.is_ok());
}

#[tokio::test]
async fn revoke_invalidates_the_cache_before_returning() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let grant = seed_grant(&engine, "alice", &permission, None).await;
    cache_allowance(&engine, "alice", &permission).await;
    assert_eq!(engine.cache.entry_count(), 1);

    let revoked = engine
        .revocation
        .revoke(grant.grant_id(), "device lost", "security")
        .await;
    assert!(revoked.is_ok());

    assert_eq!(engine.cache.entry_count(), 0);
    let stored = engine
        .grants
        .get_grant(grant.grant_id())
        .await
        .unwrap_or_else(|_| unreachable!("grant exists"));
    assert_eq!(stored.status(), GrantStatus::Revoked);
    assert_eq!(stored.revocation_reason(), Some("device lost"));
}

#[tokio::test]
async fn revocation_requires_a_reason() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let grant = seed_grant(&engine, "alice", &permission, None).await;

    let result = engine
        .revocation
        .revoke(grant.grant_id(), "   ", "security")
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let stored = engine
        .grants
        .get_grant(grant.grant_id())
        .await
        .unwrap_or_else(|_| unreachable!("grant exists"));
    assert_eq!(stored.status(), GrantStatus::Active);
}

#[tokio::test]
async fn revoking_a_terminal_grant_fails() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let grant = seed_grant(&engine, "alice", &permission, None).await;

    let first = engine
        .revocation
        .revoke(grant.grant_id(), "first", "security")
        .await;
    assert!(first.is_ok());

    let second = engine
        .revocation
        .revoke(grant.grant_id(), "second", "security")
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn revocation_cascades_through_the_delegation_chain() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let origin = seed_grant(&engine, "alice", &permission, None).await;

    for (delegator, delegatee) in [("alice", "bob"), ("bob", "carol")] {
        let delegated = engine
            .delegation
            .delegate(
                delegator,
                delegatee,
                &permission,
                PermissionScope::global(),
                None,
            )
            .await;
        assert!(delegated.is_ok());
    }
    cache_allowance(&engine, "carol", &permission).await;

    let revoked = engine
        .revocation
        .revoke(origin.grant_id(), "origin compromised", "security")
        .await;
    assert!(revoked.is_ok());

    for subject in ["alice", "bob", "carol"] {
        let active = engine
            .grants
            .list_active_grants(subject, &permission)
            .await
            .unwrap_or_default();
        assert!(active.is_empty(), "{subject} must hold no active grant");
    }
    assert_eq!(engine.cache.entry_count(), 0, "every pair invalidated");

    let revocations = engine
        .sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, LifecycleEvent::Revoked { .. }))
        .count();
    assert_eq!(revocations, 3);
}

#[tokio::test]
async fn cascade_skips_already_terminal_derived_grants() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let origin = seed_grant(&engine, "alice", &permission, None).await;

    let delegated = engine
        .delegation
        .delegate("alice", "bob", &permission, PermissionScope::global(), None)
        .await;
    let delegated = delegated.unwrap_or_else(|_| unreachable!("delegation expected"));

    // Bob's grant is revoked on its own first.
    let revoked = engine
        .revocation
        .revoke(delegated.derived_grant_id(), "bob offboarded", "security")
        .await;
    assert!(revoked.is_ok());

    // Revoking the origin afterwards must not fail on the terminal link.
    let revoked = engine
        .revocation
        .revoke(origin.grant_id(), "origin compromised", "security")
        .await;
    assert!(revoked.is_ok());
}

#[tokio::test]
async fn sweep_expires_due_grants_and_cascades() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let expiry = engine.clock.now() + Duration::minutes(5);
    let origin = seed_grant(&engine, "alice", &permission, Some(expiry)).await;

    let delegated = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            PermissionScope::global(),
            Some(expiry),
        )
        .await;
    assert!(delegated.is_ok());
    seed_grant(&engine, "carol", &permission, None).await;

    engine.clock.advance(Duration::minutes(10));
    let outcome = engine
        .revocation
        .sweep_expired(100)
        .await
        .unwrap_or_else(|_| unreachable!("sweep"));

    // The origin expires; bob's derived grant is reached by the origin's
    // cascade or expires in its own right, never both.
    assert_eq!(outcome.expired + outcome.cascaded, 2);

    let stored = engine
        .grants
        .get_grant(origin.grant_id())
        .await
        .unwrap_or_else(|_| unreachable!("grant exists"));
    assert_eq!(stored.status(), GrantStatus::Expired);
    let carol = engine
        .grants
        .list_active_grants("carol", &permission)
        .await
        .unwrap_or_default();
    assert_eq!(carol.len(), 1, "unbounded grants are untouched");
}

#[tokio::test]
async fn sweep_with_nothing_due_is_a_no_op() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    seed_grant(
        &engine,
        "alice",
        &permission,
        Some(engine.clock.now() + Duration::hours(1)),
    )
    .await;

    let outcome = engine
        .revocation
        .sweep_expired(100)
        .await
        .unwrap_or_else(|_| unreachable!("sweep"));
    assert_eq!(outcome.expired, 0);
    assert_eq!(outcome.cascaded, 0);
}

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use grantor_core::AppError;
use grantor_domain::{
    CompositionMode, PermissionGrant, PermissionId, PermissionScope, ScopeConstraint,
};

use crate::test_support::TestEngine;
use crate::{Clock, CreateGrantInput};

fn project_scope(ids: &[&str]) -> PermissionScope {
    PermissionScope::new(
        ids.iter()
            .map(|id| ScopeConstraint::Project {
                id: (*id).to_owned(),
            })
            .collect(),
        CompositionMode::AnyOf,
    )
    .unwrap_or_else(|_| PermissionScope::global())
}

async fn seed_grant(
    engine: &TestEngine,
    subject: &str,
    permission_id: &PermissionId,
    scope: PermissionScope,
    expires_at: Option<DateTime<Utc>>,
) -> PermissionGrant {
    engine
        .grants
        .create_active_grant(CreateGrantInput {
            subject: subject.to_owned(),
            permission_id: permission_id.clone(),
            scope,
            granted_by: "admin".to_owned(),
            expires_at,
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap_or_else(|_| unreachable!("seed grant"))
}

#[tokio::test]
async fn delegating_a_narrower_scope_creates_a_derived_grant() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    seed_grant(
        &engine,
        "alice",
        &permission,
        project_scope(&["project-p", "project-q"]),
        None,
    )
    .await;

    let delegation = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            project_scope(&["project-p"]),
            None,
        )
        .await;

    let delegation = delegation.unwrap_or_else(|_| unreachable!("delegation expected"));
    assert_eq!(delegation.depth(), 1);
    assert_eq!(delegation.delegator(), "alice");
    assert_eq!(delegation.delegatee(), "bob");

    let context = engine.context_in_project("bob", "project-p");
    let allowed = engine
        .authorization
        .has_permission("bob", &permission, &context)
        .await;
    assert_eq!(allowed.ok(), Some(true));

    // The derived grant stays inside the delegated scope.
    let outside = engine.context_in_project("bob", "project-q");
    let allowed = engine
        .authorization
        .has_permission("bob", &permission, &outside)
        .await;
    assert_eq!(allowed.ok(), Some(false));
}

#[tokio::test]
async fn broadening_the_scope_is_rejected_without_side_effects() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    seed_grant(
        &engine,
        "alice",
        &permission,
        project_scope(&["project-p"]),
        None,
    )
    .await;

    let result = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            project_scope(&["project-p", "project-q"]),
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::ScopeExceeded(_))));
    let bob_grants = engine
        .grants
        .list_active_grants("bob", &permission)
        .await
        .unwrap_or_default();
    assert!(bob_grants.is_empty(), "no derived grant may exist");
}

#[tokio::test]
async fn delegation_requires_an_active_origin_grant() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");

    let result = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            project_scope(&["project-p"]),
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn derived_expiry_must_not_outlive_the_origin() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let origin_expiry = engine.clock.now() + Duration::hours(1);
    seed_grant(
        &engine,
        "alice",
        &permission,
        project_scope(&["project-p"]),
        Some(origin_expiry),
    )
    .await;

    // Later than the origin's expiry.
    let result = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            project_scope(&["project-p"]),
            Some(origin_expiry + Duration::hours(1)),
        )
        .await;
    assert!(matches!(result, Err(AppError::ScopeExceeded(_))));

    // Unbounded is also later than a bounded origin.
    let result = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            project_scope(&["project-p"]),
            None,
        )
        .await;
    assert!(matches!(result, Err(AppError::ScopeExceeded(_))));

    // Equal to the origin's expiry is allowed.
    let result = engine
        .delegation
        .delegate(
            "alice",
            "bob",
            &permission,
            project_scope(&["project-p"]),
            Some(origin_expiry),
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn chain_depth_is_capped() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let scope = project_scope(&["project-p"]);
    seed_grant(&engine, "alice", &permission, scope.clone(), None).await;

    for (delegator, delegatee, depth) in
        [("alice", "bob", 1), ("bob", "carol", 2), ("carol", "dave", 3)]
    {
        let delegation = engine
            .delegation
            .delegate(delegator, delegatee, &permission, scope.clone(), None)
            .await;
        let delegation =
            delegation.unwrap_or_else(|_| unreachable!("delegation within the depth cap"));
        assert_eq!(delegation.depth(), depth);
    }

    let result = engine
        .delegation
        .delegate("dave", "erin", &permission, scope.clone(), None)
        .await;
    assert!(matches!(
        result,
        Err(AppError::DepthExceeded { depth: 4, max: 3 })
    ));
}

#[tokio::test]
async fn expired_origin_cannot_back_a_delegation() {
    let engine = TestEngine::new();
    let permission = engine.declare_permission("file.read");
    let scope = project_scope(&["project-p"]);
    seed_grant(
        &engine,
        "alice",
        &permission,
        scope.clone(),
        Some(engine.clock.now() + Duration::minutes(5)),
    )
    .await;

    engine.clock.advance(Duration::minutes(10));
    let result = engine
        .delegation
        .delegate("alice", "bob", &permission, scope, None)
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

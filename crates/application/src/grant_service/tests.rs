use std::collections::BTreeMap;

use grantor_core::{AppError, GrantId};
use grantor_domain::{AuditAction, GrantStatus, PermissionScope};

use crate::test_support::TestEngine;
use crate::{Clock, CreateGrantInput};

async fn seed_active_grant(engine: &TestEngine, subject: &str) -> GrantId {
    let permission_id = engine.declare_permission("files.read");
    let grant = engine
        .grants
        .create_active_grant(CreateGrantInput {
            subject: subject.to_owned(),
            permission_id,
            scope: PermissionScope::global(),
            granted_by: "admin".to_owned(),
            expires_at: None,
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap_or_else(|_| unreachable!("seed grant"));
    grant.grant_id()
}

#[tokio::test]
async fn superseding_keeps_the_grant_in_the_ledger() {
    let engine = TestEngine::new();
    let grant_id = seed_active_grant(&engine, "alice").await;

    let superseded = engine
        .grants
        .transition(
            grant_id,
            GrantStatus::Superseded,
            "admin",
            Some("replaced by a narrower grant"),
        )
        .await
        .unwrap_or_else(|_| unreachable!("supersede"));

    assert_eq!(superseded.status(), GrantStatus::Superseded);
    assert_eq!(superseded.version(), 2);

    // Soft status change only. The row stays readable for audit.
    let reloaded = engine
        .grants
        .get_grant(grant_id)
        .await
        .unwrap_or_else(|_| unreachable!("grant exists"));
    assert_eq!(reloaded.status(), GrantStatus::Superseded);
    assert!(!reloaded.is_active_at(engine.clock.now()));

    let trail = engine
        .grants
        .audit_trail(grant_id)
        .await
        .unwrap_or_else(|_| unreachable!("audit trail"));
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[1].action, AuditAction::GrantTransitioned);
    assert_eq!(trail[1].new_status, Some(GrantStatus::Superseded));
}

#[tokio::test]
async fn terminal_grants_cannot_be_superseded() {
    let engine = TestEngine::new();
    let grant_id = seed_active_grant(&engine, "alice").await;

    engine
        .grants
        .transition(grant_id, GrantStatus::Revoked, "admin", Some("key leaked"))
        .await
        .unwrap_or_else(|_| unreachable!("revoke"));

    let result = engine
        .grants
        .transition(grant_id, GrantStatus::Superseded, "admin", None)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn superseded_grants_stop_satisfying_active_lookups() {
    let engine = TestEngine::new();
    let grant_id = seed_active_grant(&engine, "alice").await;
    let permission_id = engine.declare_permission("files.read");

    engine
        .grants
        .transition(grant_id, GrantStatus::Superseded, "admin", None)
        .await
        .unwrap_or_else(|_| unreachable!("supersede"));

    let active = engine
        .grants
        .list_active_grants("alice", &permission_id)
        .await
        .unwrap_or_else(|_| unreachable!("listing"));
    assert!(active.is_empty());
}

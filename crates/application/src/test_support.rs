//! Hand-written fakes shared by the service tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantor_core::{AppError, AppResult, GrantId};
use grantor_domain::{
    AuditEntry, Delegation, EvaluationContext, GrantStatus, PermissionGrant, PermissionId,
    PermissionMetadata, PermissionRequest, PermissionScope, RiskLevel,
};

use crate::{
    AuthorizationConfig, AuthorizationService, CachedDecision, Clock, ConsentExplanation,
    ConsentOutcome, ConsentService, DecisionCache, DecisionCacheKey, DelegationService,
    GrantService, GrantStore, LifecycleEvent, LifecycleEventSink, PermissionRegistry,
    RevocationService,
};

/// Deterministic clock the tests can move.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|_| Utc::now())
    }
}

fn poisoned() -> AppError {
    AppError::Internal("test lock poisoned".to_owned())
}

/// In-memory grant store fake with a switchable outage mode.
#[derive(Default)]
pub struct FakeGrantStore {
    grants: Mutex<HashMap<GrantId, PermissionGrant>>,
    audits: Mutex<Vec<AuditEntry>>,
    delegations: Mutex<Vec<Delegation>>,
    unavailable: Mutex<bool>,
}

impl FakeGrantStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audits
            .lock()
            .map(|audits| audits.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> AppResult<()> {
        let unavailable = self.unavailable.lock().map_err(|_| poisoned())?;
        if *unavailable {
            return Err(AppError::StoreUnavailable(
                "store outage injected by test".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GrantStore for FakeGrantStore {
    async fn create_grant(&self, grant: &PermissionGrant, entry: &AuditEntry) -> AppResult<()> {
        self.check_available()?;
        self.grants
            .lock()
            .map_err(|_| poisoned())?
            .insert(grant.grant_id(), grant.clone());
        self.audits.lock().map_err(|_| poisoned())?.push(entry.clone());
        Ok(())
    }

    async fn get_grant(&self, grant_id: GrantId) -> AppResult<Option<PermissionGrant>> {
        self.check_available()?;
        Ok(self
            .grants
            .lock()
            .map_err(|_| poisoned())?
            .get(&grant_id)
            .cloned())
    }

    async fn list_active_grants(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<Vec<PermissionGrant>> {
        self.check_available()?;
        Ok(self
            .grants
            .lock()
            .map_err(|_| poisoned())?
            .values()
            .filter(|grant| {
                grant.subject() == subject
                    && grant.permission_id() == permission_id
                    && grant.status() == GrantStatus::Active
            })
            .cloned()
            .collect())
    }

    async fn list_expired_grants(
        &self,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<PermissionGrant>> {
        self.check_available()?;
        Ok(self
            .grants
            .lock()
            .map_err(|_| poisoned())?
            .values()
            .filter(|grant| {
                !grant.status().is_terminal()
                    && grant.expires_at().is_some_and(|expires| expires <= as_of)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transition_grant(
        &self,
        grant_id: GrantId,
        expected_version: i64,
        new_status: GrantStatus,
        at: DateTime<Utc>,
        reason: Option<&str>,
        entry: &AuditEntry,
    ) -> AppResult<PermissionGrant> {
        self.check_available()?;
        let mut grants = self.grants.lock().map_err(|_| poisoned())?;
        let grant = grants
            .get_mut(&grant_id)
            .ok_or_else(|| AppError::NotFound(format!("grant '{grant_id}' does not exist")))?;

        if grant.version() != expected_version {
            return Err(AppError::Conflict(format!(
                "grant '{grant_id}' was modified concurrently"
            )));
        }

        grant.apply_transition(new_status, at, reason)?;
        let updated = grant.clone();
        drop(grants);

        self.audits.lock().map_err(|_| poisoned())?.push(entry.clone());
        Ok(updated)
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> AppResult<()> {
        self.check_available()?;
        self.audits.lock().map_err(|_| poisoned())?.push(entry.clone());
        Ok(())
    }

    async fn audit_trail(&self, grant_id: GrantId) -> AppResult<Vec<AuditEntry>> {
        self.check_available()?;
        Ok(self
            .audits
            .lock()
            .map_err(|_| poisoned())?
            .iter()
            .filter(|entry| entry.grant_id == Some(grant_id))
            .cloned()
            .collect())
    }

    async fn create_delegated_grant(
        &self,
        grant: &PermissionGrant,
        delegation: &Delegation,
        entry: &AuditEntry,
    ) -> AppResult<()> {
        self.check_available()?;
        self.grants
            .lock()
            .map_err(|_| poisoned())?
            .insert(grant.grant_id(), grant.clone());
        self.delegations
            .lock()
            .map_err(|_| poisoned())?
            .push(delegation.clone());
        self.audits.lock().map_err(|_| poisoned())?.push(entry.clone());
        Ok(())
    }

    async fn list_delegations_from(&self, origin_grant_id: GrantId) -> AppResult<Vec<Delegation>> {
        self.check_available()?;
        Ok(self
            .delegations
            .lock()
            .map_err(|_| poisoned())?
            .iter()
            .filter(|delegation| delegation.origin_grant_id() == origin_grant_id)
            .cloned()
            .collect())
    }

    async fn find_delegation_to(
        &self,
        derived_grant_id: GrantId,
    ) -> AppResult<Option<Delegation>> {
        self.check_available()?;
        Ok(self
            .delegations
            .lock()
            .map_err(|_| poisoned())?
            .iter()
            .find(|delegation| delegation.derived_grant_id() == derived_grant_id)
            .cloned())
    }
}

/// In-memory decision cache fake.
#[derive(Default)]
pub struct FakeDecisionCache {
    entries: Mutex<HashMap<DecisionCacheKey, CachedDecision>>,
}

impl FakeDecisionCache {
    pub fn entry_count(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DecisionCache for FakeDecisionCache {
    async fn get(&self, key: &DecisionCacheKey) -> AppResult<Option<CachedDecision>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned())
    }

    async fn put(&self, key: DecisionCacheKey, decision: CachedDecision) -> AppResult<()> {
        self.entries
            .lock()
            .map_err(|_| poisoned())?
            .insert(key, decision);
        Ok(())
    }

    async fn invalidate_subject_permission(
        &self,
        subject: &str,
        permission_id: &PermissionId,
    ) -> AppResult<()> {
        self.entries
            .lock()
            .map_err(|_| poisoned())?
            .retain(|key, _| !(key.subject == subject && &key.permission_id == permission_id));
        Ok(())
    }
}

/// Registry fake with explicit metadata and implication edges.
#[derive(Default)]
pub struct FakeRegistry {
    permissions: Mutex<HashMap<PermissionId, PermissionMetadata>>,
    implications: Mutex<HashMap<PermissionId, Vec<PermissionId>>>,
}

impl FakeRegistry {
    pub fn declare(&self, permission_id: &PermissionId, risk_level: RiskLevel) {
        if let Ok(mut permissions) = self.permissions.lock() {
            permissions.insert(
                permission_id.clone(),
                PermissionMetadata {
                    permission_id: permission_id.clone(),
                    display_name: permission_id.to_string(),
                    description: format!("allows {permission_id}"),
                    risk_level,
                },
            );
        }
    }

    pub fn imply(&self, narrow: &PermissionId, broad: &PermissionId) {
        if let Ok(mut implications) = self.implications.lock() {
            implications
                .entry(narrow.clone())
                .or_default()
                .push(broad.clone());
        }
    }
}

#[async_trait]
impl PermissionRegistry for FakeRegistry {
    async fn lookup(&self, permission_id: &PermissionId) -> AppResult<Option<PermissionMetadata>> {
        Ok(self
            .permissions
            .lock()
            .map_err(|_| poisoned())?
            .get(permission_id)
            .cloned())
    }

    async fn implied_by(&self, permission_id: &PermissionId) -> AppResult<Vec<PermissionId>> {
        Ok(self
            .implications
            .lock()
            .map_err(|_| poisoned())?
            .get(permission_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Consent fake that replays a scripted list of outcomes.
#[derive(Default)]
pub struct ScriptedConsent {
    outcomes: Mutex<Vec<ConsentOutcome>>,
    calls: Mutex<usize>,
}

impl ScriptedConsent {
    pub fn script(&self, outcome: ConsentOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(outcome);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| *calls).unwrap_or_default()
    }
}

#[async_trait]
impl ConsentService for ScriptedConsent {
    async fn request_consent(
        &self,
        _request: &PermissionRequest,
        _explanation: ConsentExplanation,
        _timeout: Duration,
    ) -> AppResult<ConsentOutcome> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        let mut outcomes = self.outcomes.lock().map_err(|_| poisoned())?;
        if outcomes.is_empty() {
            return Ok(ConsentOutcome::Denied);
        }
        Ok(outcomes.remove(0))
    }
}

/// Sink that records every published event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LifecycleEventSink for RecordingSink {
    async fn publish(&self, event: LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Fully wired engine over the fakes, shared across service tests.
pub struct TestEngine {
    pub store: Arc<FakeGrantStore>,
    pub cache: Arc<FakeDecisionCache>,
    pub registry: Arc<FakeRegistry>,
    pub consent: Arc<ScriptedConsent>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<FixedClock>,
    pub grants: GrantService,
    pub authorization: AuthorizationService,
    pub revocation: RevocationService,
    pub delegation: DelegationService,
}

impl TestEngine {
    pub fn new() -> Self {
        let store = Arc::new(FakeGrantStore::default());
        let cache = Arc::new(FakeDecisionCache::default());
        let registry = Arc::new(FakeRegistry::default());
        let consent = Arc::new(ScriptedConsent::default());
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(FixedClock::new(Utc::now()));

        let grants = GrantService::new(store.clone(), clock.clone());
        let authorization = AuthorizationService::new(
            registry.clone(),
            grants.clone(),
            cache.clone(),
            consent.clone(),
            sink.clone(),
            clock.clone(),
            AuthorizationConfig::default(),
        );
        let revocation = RevocationService::new(
            grants.clone(),
            cache.clone(),
            sink.clone(),
            clock.clone(),
        );
        let delegation = DelegationService::new(grants.clone(), sink.clone(), clock.clone());

        Self {
            store,
            cache,
            registry,
            consent,
            sink,
            clock,
            grants,
            authorization,
            revocation,
            delegation,
        }
    }

    /// Declares a medium-risk permission and returns its id.
    pub fn declare_permission(&self, id: &str) -> PermissionId {
        let permission_id =
            PermissionId::new(id).unwrap_or_else(|_| unreachable!("test permission id"));
        self.registry.declare(&permission_id, RiskLevel::Medium);
        permission_id
    }

    /// Builds a request for the permission with the given scope.
    pub fn request(
        &self,
        subject: &str,
        permission_id: &PermissionId,
        scope: PermissionScope,
    ) -> PermissionRequest {
        PermissionRequest::new(
            permission_id.clone(),
            subject,
            "session-1",
            scope,
            self.clock.now(),
            "test justification",
        )
    }

    /// Builds a context for the subject inside a project.
    pub fn context_in_project(&self, subject: &str, project_id: &str) -> EvaluationContext {
        EvaluationContext::new(subject, "session-1", self.clock.now()).with_project(project_id)
    }
}

//! Application services and ports for the permission authorization engine.

#![forbid(unsafe_code)]

mod authorization_ports;
mod authorization_service;
mod clock;
mod decision_cache;
mod delegation_service;
mod grant_service;
mod lifecycle_events;
mod revocation_service;
#[cfg(test)]
mod test_support;

pub use authorization_ports::{
    ConsentExplanation, ConsentOutcome, ConsentService, GrantStore, PermissionRegistry,
};
pub use authorization_service::{AuthorizationConfig, AuthorizationService};
pub use clock::{Clock, SystemClock};
pub use decision_cache::{CachedDecision, DecisionCache, DecisionCacheConfig, DecisionCacheKey};
pub use delegation_service::DelegationService;
pub use grant_service::{CreateGrantInput, GrantService};
pub use lifecycle_events::{LifecycleEvent, LifecycleEventSink, NullEventSink};
pub use revocation_service::{RevocationService, SweepOutcome};

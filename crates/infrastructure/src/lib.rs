//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod channel_consent_service;
mod in_memory_decision_cache;
mod in_memory_grant_store;
mod in_memory_permission_registry;
mod postgres_grant_store;
mod redis_decision_cache;
mod tracing_event_sink;

pub use channel_consent_service::{ChannelConsentService, ConsentPrompt};
pub use in_memory_decision_cache::InMemoryDecisionCache;
pub use in_memory_grant_store::InMemoryGrantStore;
pub use in_memory_permission_registry::InMemoryPermissionRegistry;
pub use postgres_grant_store::PostgresGrantStore;
pub use redis_decision_cache::RedisDecisionCache;
pub use tracing_event_sink::TracingEventSink;

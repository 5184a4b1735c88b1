//! Ports to the engine's external collaborators.

mod consent;
mod grant_store;
mod registry;

pub use consent::{ConsentExplanation, ConsentOutcome, ConsentService};
pub use grant_store::GrantStore;
pub use registry::PermissionRegistry;

//! Lifecycle registry: the single shared record of colony state.
//!
//! Pure data plus invariant-preserving mutators ([`Registry`]) and the
//! exclusively locked, snapshot-persisted owner of that data
//! ([`RegistryStore`]). Every promotion, rollback, and seeding decision in
//! the colony takes effect here and nowhere else.

mod model;
mod store;

pub use model::{LifecycleState, Niche, PhaseStats, ProdStats, Registry, ZooidRecord};
pub use store::RegistryStore;

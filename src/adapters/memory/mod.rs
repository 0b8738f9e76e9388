//! In-memory adapters for tests and ephemeral runs.

pub mod provenance_store;

pub use provenance_store::InMemoryProvenanceStore;

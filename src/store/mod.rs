// ABOUTME: Dataset store module exposing the capability interface and reference types
// ABOUTME: Exports store traits, dataset references, errors, and the in-memory backend

pub mod client;
pub mod error;
pub mod facility;
pub mod memory;
pub mod reference;

pub use client::{
    CollectionKind, DatasetStore, FullStore, PruneOptions, RestrictedStoreFactory, StoreAccess,
};
pub use error::{Result, StoreError};
pub use facility::FacilityRegistry;
pub use memory::MemoryStore;
pub use reference::{CoordValue, DataId, DatasetRef, DatasetType};

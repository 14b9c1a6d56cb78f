//! Alert subscription preferences: validation, storage, identity-resolving upsert.

pub mod repo;
pub mod store;
pub mod types;

pub use repo::{
    FilePreferenceRepository, MemoryPreferenceRepository, PreferenceRepository, StorageError,
};
pub use store::{PreferenceError, PreferenceStore, UpsertOutcome, RESOLUTION_ORDER};
pub use types::{AlertPreference, AlertPreferenceInput, IdentityKey, ValidationError};

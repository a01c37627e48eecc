//! C2: decides which Chrome user-data directory to use and keeps a
//! persistent mirror of the real user's cookies when the real profile is
//! locked by the user's own running Chrome (§4.2).

pub mod atomic_store;
pub mod manager;

pub use atomic_store::{AtomicStore, ReadOutcome, WriteOptions};
pub use manager::{ProfileManager, ProfileOptions, ProfileType, ResolvedProfile, SnapshotOutcome};

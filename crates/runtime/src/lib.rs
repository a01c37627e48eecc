//! Browser lifecycle, profile management, and CDP transport (C1-C4).
//!
//! This crate has no notion of sessions or tabs-as-owned-resources; it is
//! the layer `openchrome-core` builds session/pool/ref-table semantics on
//! top of. Everything here is safe to share across every session.

pub mod launcher;
pub mod profile;
pub mod transport;

pub use openchrome_protocol::{Error, Result};
pub use transport::{Connection, EventSubscription};

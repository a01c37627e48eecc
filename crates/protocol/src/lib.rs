//! Wire types shared by `openchrome-runtime` and `openchrome-core`: the CDP
//! transport envelope (C4), the `ErrorKind` taxonomy (§7), and the on-disk
//! data model types from §3 that cross a serialization boundary.

pub mod cdp;
pub mod error;
pub mod model;

pub use cdp::{Event, IdGenerator, Message, ProtocolError, Request, Response};
pub use error::{Error, Result};
pub use model::{Cookie, SameSite, StorageState, SyncMetadata, STORAGE_STATE_SCHEMA, SYNC_METADATA_SCHEMA};

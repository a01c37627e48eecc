//! C11: sessions own tabs, enforce cross-session isolation, and dispatch
//! every operation through their per-session FIFO queue (§4.11, §3
//! `Session`).

pub mod manager;
pub mod tab;

pub use manager::{CreateTabResult, SessionEvent, SessionInfo, SessionManager};
pub use tab::{Tab, Viewport};

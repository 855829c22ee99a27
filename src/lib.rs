//! ProjectDesk: project dashboard backend.
//!
//! The HTTP API and notification streams live in [`api`], the client-side
//! message/log sync with automatic follow-ups in [`sync`], and the per-project
//! credential editor in [`credentials`]. Storage and data types come from
//! `projectdesk-core`.

pub mod api;
pub mod client;
pub mod config;
pub mod credentials;
pub mod mcp;
pub mod notify;
pub mod sync;

pub use projectdesk_core::{db, models};

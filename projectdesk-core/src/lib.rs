//! Core library for ProjectDesk.
//!
//! This crate provides the domain models and database operations for ProjectDesk,
//! independent of any transport layer (HTTP, MCP, etc.).
//!
//! # Usage
//!
//! ```no_run
//! use projectdesk_core::db::Database;
//! use projectdesk_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let messages = db.get_messages(7)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod db;
pub mod models;

// Re-export commonly used types at crate root
pub use db::Database;

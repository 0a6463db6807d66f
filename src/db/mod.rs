//! Database layer.
//!
//! A single local SQLite database (via libsql) holds users, chats, missions,
//! execution logs, document groups, and versioned research reports. The
//! mission context itself is persisted as a sanitized JSON blob in the
//! `missions` table; execution log entries additionally get their own rows
//! so cost and token columns can be queried without parsing the blob.

/// libsql client and row types.
pub mod store;

pub use store::{Chat, DocumentRow, MissionRow, ResearchReport, Store, User};

//! # clique-store
//!
//! Relational storage for the Clique backend, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain
//! model: accounts and their bearer tokens, the symmetric friend graph,
//! owned groups with their memberships, and media with normalized tags.
//! Multi-row invariants (friendship pairs, ownership succession, cascade
//! deletes) are enforced inside single transactions here, not in callers.

pub mod database;
pub mod friends;
pub mod groups;
pub mod media;
pub mod migrations;
pub mod models;
pub mod tags;
pub mod tokens;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use friends::FriendRequestOutcome;
pub use groups::MemberRemoval;
pub use media::SearchMode;
pub use models::*;

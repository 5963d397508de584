//! notesync-core - Core library for notesync
//!
//! This crate contains the note store, the sync manifest, the OAuth 1.0a
//! handshake, and the sync engine shared by every notesync front end. The
//! engine talks to servers through [`sync::SyncServer`]; [`web::WebSyncServer`]
//! implements it for Tomboy-compatible REST servers.

pub mod config;
pub mod db;
pub mod error;
pub mod manifest;
pub mod models;
pub mod oauth;
pub mod services;
pub mod sync;
pub mod transport;
pub mod web;

pub use error::{Error, Result};
pub use models::{Conflict, ConflictOutcome, Note, NoteId};
pub use services::NoteService;
pub use sync::{SyncError, SyncManager, SyncReport};
pub use transport::{TransportError, TransportErrorKind};

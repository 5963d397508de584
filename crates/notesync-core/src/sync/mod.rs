//! Note synchronization against a revision-counting server

mod engine;
mod error;
mod local;
mod memory;
mod report;
mod resolver;
mod traits;

pub use engine::SyncManager;
pub use error::{SyncError, SyncResult};
pub use local::LocalSyncClient;
pub use memory::MemorySyncServer;
pub use report::SyncReport;
pub use resolver::{ConflictResolver, Decisions, LastWriterWins, Resolution};
pub use traits::{SyncClient, SyncServer};

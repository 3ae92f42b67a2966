//! # Anchormark Store
//!
//! Persistent bookmark records for one workspace.
//!
//! ## Lifecycle
//!
//! ```text
//! WorkspaceState ──load──> BookmarkStore ──put/delete/apply──> WorkspaceState
//!       │                      │
//!       │                      └──> StoreEvent (broadcast to observers)
//!       │
//!       └─ stale cleanup: records whose file no longer exists are dropped
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use anchormark_store::{BookmarkStore, JsonFileState, LocalFileSystem, WorkspaceState};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anchormark_store::Result<()> {
//!     let root = Path::new("/path/to/workspace");
//!     let state: Arc<dyn WorkspaceState> = Arc::new(JsonFileState::for_workspace(root));
//!     let store = BookmarkStore::load(Some(state), &LocalFileSystem::rooted(root)).await?;
//!     println!("{} bookmarks", store.len());
//!     Ok(())
//! }
//! ```

mod error;
mod fs;
mod record;
mod state;
mod store;

pub use error::{Result, StoreError};
pub use fs::{FileSystem, LocalFileSystem, StaticFileSystem};
pub use record::{BookmarkRecord, Generation};
pub use state::{JsonFileState, MemoryState, WorkspaceState, STATE_DIR_NAME};
pub use store::{BookmarkStore, StoreChange, StoreEvent, BOOKMARKS_KEY, STORE_SCHEMA_VERSION};

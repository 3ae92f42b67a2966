//! # Anchormark Engine
//!
//! Keeps line bookmarks attached to code while the code is edited.
//!
//! ## Flow
//!
//! ```text
//! editor document (Document)
//!     │
//!     ├──> toggle / place_explicit / clear_file   (write marker text, records)
//!     │
//!     ├──> Reconciler                              (markers in text ⇄ stored records)
//!     │        │
//!     │        ├──> LabelGenerator ──> SymbolProvider (breadcrumbs, time-boxed)
//!     │        │
//!     │        └──> ReconcileUpdate (broadcast)
//!     │
//!     └──> navigation                              (next / previous bookmarked line)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use anchormark_engine::{Document, EngineConfig, Session, TextDocument, TreeSitterOutline};
//! use anchormark_store::StaticFileSystem;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anchormark_engine::Result<()> {
//!     let session = Session::open(
//!         None,
//!         Arc::new(StaticFileSystem::default()),
//!         Arc::new(TreeSitterOutline),
//!         EngineConfig::default(),
//!     )
//!     .await?;
//!
//!     let mut doc = TextDocument::new("src/lib.rs", "/ws", "rust", "fn main() {\n}\n");
//!     session.toggle(&mut doc, 0).await?;
//!     let doc: Arc<dyn Document> = Arc::new(doc);
//!     session.reconcile(doc).await?;
//!
//!     for record in session.list().await {
//!         println!("{} {:?}", record.marker, record.cached_label);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod document;
mod error;
mod label;
mod navigation;
mod placement;
mod reconcile;
mod session;
mod symbols;

pub use config::EngineConfig;
pub use document::{Document, TextDocument, TextRange};
pub use error::{EngineError, Result};
pub use label::{breadcrumb, clean_line, LabelGenerator, LABEL_PLACEHOLDER};
pub use navigation::{adjacent_line, bookmark_lines, Direction};
pub use placement::{clear_file, place_explicit, toggle, ToggleOutcome};
pub use reconcile::{ReconcileOutcome, ReconcileUpdate, Reconciler};
pub use session::Session;
pub use symbols::{NoSymbols, StaticSymbols, SymbolProvider, TreeSitterOutline};

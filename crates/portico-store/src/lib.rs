//! # Portico Store
//!
//! The narrow persistence interface business services use, and an in-memory
//! backend.
//!
//! - [`Store`] - `create` / `find` / `first` / `count` / `delete` / `update`,
//!   scoped by [`Store::with_context`], with [`Store::transaction`]
//! - [`Record`] - what a stored type declares: collection, unique fields, id
//! - [`Query`] - closed set of typed query options
//! - [`MemoryCatalog`] / [`MemoryStore`] - `memory://` databases that must be
//!   provisioned before they can be connected to
//!
//! # Example
//!
//! ```
//! use portico_store::{MemoryCatalog, Query, Record, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Note {
//!     id: u64,
//!     text: String,
//! }
//!
//! impl Record for Note {
//!     const COLLECTION: &'static str = "notes";
//!     fn id(&self) -> u64 { self.id }
//!     fn set_id(&mut self, id: u64) { self.id = id; }
//! }
//!
//! # tokio_test_block_on(async {
//! let catalog = MemoryCatalog::new();
//! catalog.provision("memory://app")?;
//! let store = catalog.connect("memory://app")?;
//!
//! let note = store.create(Note { id: 0, text: "hi".into() }).await?;
//! let found: Note = store.first(&Query::by_id(note.id)).await?;
//! assert_eq!(found.text, "hi");
//! # Ok::<(), portico_store::StoreError>(())
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/portico-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod memory;
mod query;
mod record;
mod scope;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCatalog, MemoryStore, MEMORY_SCHEME};
pub use query::{Direction, Filter, Query};
pub use record::Record;
pub use scope::Scope;
pub use store::Store;

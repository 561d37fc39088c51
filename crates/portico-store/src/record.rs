//! The record contract.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A keyed record stored in a named collection.
///
/// Records are stored as their serde representation; the unique fields are
/// looked up by their serialized names.
///
/// # Example
///
/// ```
/// use portico_store::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Account {
///     id: u64,
///     email: String,
/// }
///
/// impl Record for Account {
///     const COLLECTION: &'static str = "accounts";
///     const UNIQUE: &'static [&'static str] = &["email"];
///
///     fn id(&self) -> u64 {
///         self.id
///     }
///
///     fn set_id(&mut self, id: u64) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name.
    const COLLECTION: &'static str;

    /// Fields that must be unique across the collection.
    const UNIQUE: &'static [&'static str] = &[];

    /// Returns the record id. Zero means "not yet stored".
    fn id(&self) -> u64;

    /// Sets the record id. Called by the store on create.
    fn set_id(&mut self, id: u64);
}

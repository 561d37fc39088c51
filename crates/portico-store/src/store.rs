//! The persistence interface.

use std::future::Future;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::query::Query;
use crate::record::Record;
use crate::scope::Scope;

/// Keyed-record persistence.
///
/// Every operation honours the handle's [`Scope`]: a cancelled or expired
/// scope fails before touching data.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// Returns a handle bound to `scope`, sharing the same data.
    fn with_context(&self, scope: Scope) -> Self;

    /// Inserts a record, assigning its id. Fails on unique-field collisions.
    async fn create<R: Record>(&self, record: R) -> StoreResult<R>;

    /// Returns every record matching the query.
    async fn find<R: Record>(&self, query: &Query) -> StoreResult<Vec<R>>;

    /// Returns the first matching record, or `NotFound`.
    async fn first<R: Record>(&self, query: &Query) -> StoreResult<R>;

    /// Counts matching records, ignoring paging.
    async fn count<R: Record>(&self, query: &Query) -> StoreResult<u64>;

    /// Deletes matching records and returns how many were removed.
    async fn delete<R: Record>(&self, query: &Query) -> StoreResult<u64>;

    /// Replaces the stored record with the same id.
    async fn update<R: Record>(&self, record: &R) -> StoreResult<R>;

    /// Runs `work` against a transactional handle. Its writes become visible
    /// only if `work` returns `Ok`.
    async fn transaction<T, F, Fut>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Fut + Send + 'static,
        Fut: Future<Output = StoreResult<T>> + Send + 'static;
}

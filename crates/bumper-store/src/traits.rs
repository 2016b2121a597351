//! Store trait definitions

use crate::{GrantMap, StoreResult};

/// Durable mapping from subject to grant.
///
/// The collection is always read and written whole. Grant counts are small,
/// and full replacement inside a [`GrantTransaction`] rules out lost updates.
pub trait GrantStore: Send + Sync {
    /// Snapshot of every stored grant.
    ///
    /// Missing or corrupt data yields an empty map; only I/O and database
    /// failures are errors.
    fn get_all(&self) -> StoreResult<GrantMap>;

    /// Replace the whole collection in one atomic write
    fn put_all(&self, grants: &GrantMap) -> StoreResult<()>;

    /// Open an exclusive read-modify-write transaction.
    ///
    /// No other transaction, in this process or another, can begin until this
    /// one is committed or dropped. Dropping without `commit` discards every
    /// write made through it.
    fn begin(&self) -> StoreResult<Box<dyn GrantTransaction + '_>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Exclusive access to the grant collection
pub trait GrantTransaction {
    /// Current collection, including writes made earlier in this transaction
    fn get_all(&self) -> StoreResult<GrantMap>;

    /// Replace the collection (visible to others only after commit)
    fn put_all(&mut self, grants: &GrantMap) -> StoreResult<()>;

    /// Make the writes durable and release exclusive access
    fn commit(self: Box<Self>) -> StoreResult<()>;
}

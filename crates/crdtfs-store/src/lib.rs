//! Client surface of the replicated key-value store behind crdtfs.
//!
//! The backing store is an eventually-consistent CRDT database (add-wins
//! maps of last-writer-wins registers) with multi-key transactions. This
//! crate does not implement replication or merge; it describes the calls the
//! filesystem makes and ships an in-process implementation.
//!
//! - [`RemoteStore`] - read a keyed map, commit a [`Transaction`]
//! - [`Transaction`] - staged writes/removals across maps, applied atomically
//! - [`MapSnapshot`] - ordered copy of one map's registers
//! - [`MemoryStore`] - in-process store for tests and the shell

mod error;
mod memory;
mod store;
mod txn;
mod value;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryStoreStats};
pub use store::{RemoteStore, StoreCapabilities};
pub use txn::{Guard, Transaction, TxnOp};
pub use value::{MapSnapshot, RegisterValue};

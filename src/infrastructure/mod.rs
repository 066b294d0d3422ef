//! Adapters implementing the domain ports: in-memory stores, a scriptable chain source,
//! a rate history and, behind the `storage-rocksdb` feature, a persistent store.

pub mod chain;
pub mod in_memory;
pub mod rates;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

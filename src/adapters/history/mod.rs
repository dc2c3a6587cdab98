//! History Adapters
//!
//! Persistence for scan snapshots behind the `HistoryStore` port.

mod jsonl_store;

pub use jsonl_store::JsonlHistoryStore;

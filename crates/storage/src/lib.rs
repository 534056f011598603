#![forbid(unsafe_code)]

//! SQLite-backed local cache of CRM records and the rollback journal that
//! protects every write to it.

mod store;

pub use store::*;

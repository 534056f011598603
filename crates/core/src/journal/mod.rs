#![forbid(unsafe_code)]

//! Value types of the rollback journal. Nothing here touches storage; the
//! storage crate drives these through the cache.

mod field;
mod operation;
mod rollback_info;

pub use field::*;
pub use operation::*;
pub use rollback_info::*;

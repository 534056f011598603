#![forbid(unsafe_code)]

mod schema;
mod sql;

pub(super) use schema::migrate_sqlite_schema;
pub(super) use sql::*;

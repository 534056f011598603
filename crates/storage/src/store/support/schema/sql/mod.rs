#![forbid(unsafe_code)]

mod core;
mod indexes;
mod pragmas;
mod rollbackinfo;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(pragmas::SQL);
    sql.push_str(core::SQL);
    sql.push_str(rollbackinfo::SQL);
    sql.push_str(indexes::SQL);
    sql
}

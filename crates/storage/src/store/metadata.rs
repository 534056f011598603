#![forbid(unsafe_code)]

use super::support::quote_ident;
use crm_core::ids::InfoAreaId;
use std::collections::BTreeMap;

pub const DEFAULT_RECORD_ID_COLUMN: &str = "recordid";

/// Resolves logical CRM field and link numbering to physical cache columns.
pub trait TableMetadata: std::fmt::Debug + Send + Sync {
    fn table_name(&self, info_area_id: &InfoAreaId) -> String {
        format!("CRM_{info_area_id}")
    }

    fn record_id_column(&self) -> &str {
        DEFAULT_RECORD_ID_COLUMN
    }

    fn field_column(&self, info_area_id: &InfoAreaId, field_id: i32) -> Option<FieldColumn>;

    fn link_columns(
        &self,
        info_area_id: &InfoAreaId,
        target_info_area_id: &InfoAreaId,
        link_id: i32,
    ) -> Option<LinkColumns>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    Date,
    Time,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Text | ColumnKind::Date | ColumnKind::Time => "TEXT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Columns holding one link: the target record id and, for links that may
/// point at several info areas, the target's info area id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkColumns {
    pub record_id_column: String,
    pub info_area_column: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LinkDef {
    target: InfoAreaId,
    link_id: i32,
    columns: LinkColumns,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableDef {
    fields: BTreeMap<i32, FieldColumn>,
    links: Vec<LinkDef>,
}

impl TableDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field_id: i32, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.fields.insert(
            field_id,
            FieldColumn {
                name: name.into(),
                kind,
            },
        );
        self
    }

    pub fn link(mut self, target: InfoAreaId, link_id: i32, column: impl Into<String>) -> Self {
        self.links.push(LinkDef {
            target,
            link_id,
            columns: LinkColumns {
                record_id_column: column.into(),
                info_area_column: None,
            },
        });
        self
    }

    /// A link whose target info area is stored next to the record id. It also
    /// serves targets in other info areas that have no link of their own.
    pub fn polymorphic_link(
        mut self,
        target: InfoAreaId,
        link_id: i32,
        column: impl Into<String>,
        info_area_column: impl Into<String>,
    ) -> Self {
        self.links.push(LinkDef {
            target,
            link_id,
            columns: LinkColumns {
                record_id_column: column.into(),
                info_area_column: Some(info_area_column.into()),
            },
        });
        self
    }

    fn columns(&self) -> Vec<(&str, &'static str)> {
        let fields = self
            .fields
            .values()
            .map(|column| (column.name.as_str(), column.kind.sql_type()));
        let links = self.links.iter().flat_map(|link| {
            std::iter::once(link.columns.record_id_column.as_str())
                .chain(link.columns.info_area_column.as_deref())
                .map(|name| (name, "TEXT"))
        });

        let mut out: Vec<(&str, &'static str)> = Vec::new();
        for (name, sql_type) in fields.chain(links) {
            if !out.iter().any(|(existing, _)| *existing == name) {
                out.push((name, sql_type));
            }
        }
        out
    }

    fn find_link(&self, target: &InfoAreaId, link_id: i32) -> Option<&LinkDef> {
        let matches_id = |link: &&LinkDef| link_id < 0 || link.link_id == link_id;
        self.links
            .iter()
            .filter(|link| &link.target == target)
            .find(matches_id)
            .or_else(|| {
                self.links
                    .iter()
                    .filter(|link| link.columns.info_area_column.is_some())
                    .find(matches_id)
            })
    }
}

/// In-memory [`TableMetadata`] built from table definitions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaCatalog {
    tables: BTreeMap<InfoAreaId, TableDef>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, info_area_id: InfoAreaId, table: TableDef) -> Self {
        self.tables.insert(info_area_id, table);
        self
    }

    pub fn info_area_ids(&self) -> impl Iterator<Item = &InfoAreaId> {
        self.tables.keys()
    }

    /// DDL for every cache table. Record ids are indexed but not unique: the
    /// cache does not enforce it and pre-image capture checks for duplicates.
    pub fn create_tables_sql(&self) -> String {
        let record_id = quote_ident(self.record_id_column());
        let mut sql = String::new();
        for (info_area_id, table) in &self.tables {
            let table_name = self.table_name(info_area_id);
            let mut columns = vec![format!("{record_id} TEXT NOT NULL")];
            columns.extend(
                table
                    .columns()
                    .into_iter()
                    .map(|(name, sql_type)| format!("{} {sql_type}", quote_ident(name))),
            );
            sql.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({});\n",
                quote_ident(&table_name),
                columns.join(", ")
            ));
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}({record_id});\n",
                quote_ident(&format!("{table_name}_recordid")),
                quote_ident(&table_name),
            ));
        }
        sql
    }
}

impl TableMetadata for SchemaCatalog {
    fn field_column(&self, info_area_id: &InfoAreaId, field_id: i32) -> Option<FieldColumn> {
        self.tables.get(info_area_id)?.fields.get(&field_id).cloned()
    }

    fn link_columns(
        &self,
        info_area_id: &InfoAreaId,
        target_info_area_id: &InfoAreaId,
        link_id: i32,
    ) -> Option<LinkColumns> {
        self.tables
            .get(info_area_id)?
            .find_link(target_info_area_id, link_id)
            .map(|link| link.columns.clone())
    }
}

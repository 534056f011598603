#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS rollbackinfo (
          requestnr INTEGER NOT NULL,
          infoareaid TEXT NOT NULL,
          recordid TEXT,
          rollbackinfo TEXT NOT NULL
        );
"#;

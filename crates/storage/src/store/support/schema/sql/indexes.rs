#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_rollbackinfo_requestnr ON rollbackinfo(requestnr);
"#;

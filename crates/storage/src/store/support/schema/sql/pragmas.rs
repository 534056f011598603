#![forbid(unsafe_code)]

// The journal must be on disk before the cache write it protects.
pub(super) const SQL: &str = r#"

        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=FULL;
"#;

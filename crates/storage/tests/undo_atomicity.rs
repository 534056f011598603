#![forbid(unsafe_code)]

use crm_core::Record;
use crm_core::ids::{InfoAreaId, RecordIdentification};
use crm_core::journal::{UndoAction, UndoOperation};
use crm_storage::{ColumnKind, SchemaCatalog, SqliteStore, StoreError, TableDef, UndoRequest};
use rusqlite::params;
use std::sync::Arc;

fn ia(value: &str) -> InfoAreaId {
    InfoAreaId::try_new(value).expect("info area id")
}

fn rid(value: &str) -> RecordIdentification {
    RecordIdentification::parse(value).expect("record identification")
}

fn open_store() -> SqliteStore {
    let catalog = SchemaCatalog::new()
        .with_table(ia("FI"), TableDef::new().field(0, "name", ColumnKind::Text))
        .with_table(ia("XX"), TableDef::new().field(0, "name", ColumnKind::Text));
    let store = SqliteStore::open_in_memory(Arc::new(catalog.clone())).expect("open store");
    store.install_tables(&catalog).expect("install tables");
    store
}

fn seed(store: &SqliteStore, table: &str, record_id: &str, name: &str) {
    store
        .connection()
        .execute(
            &format!("INSERT INTO {table}(recordid, name) VALUES (?1, ?2)"),
            params![record_id, name],
        )
        .expect("seed row");
}

fn name_of(store: &SqliteStore, identification: &str) -> Option<String> {
    store
        .read_row(&rid(identification))
        .expect("read row")
        .and_then(|row| row.get("name").cloned().flatten())
}

fn rename(identification: &str, from: &str, to: &str) -> Record {
    let mut record = Record::update(rid(identification));
    record.set_value(0, to, Some(from.to_string()));
    record
}

#[test]
fn update_is_reversed_to_captured_pre_image() {
    let mut store = open_store();
    seed(&store, "CRM_FI", "1", "Alice");

    let mut record = rename("FI.1", "Alice", "Bob");
    let mut request = UndoRequest::new(1);
    request
        .add_record(&record, store.metadata())
        .expect("add record");
    request
        .check_before_cache_save(&store)
        .expect("check before");
    let entry = request.record(&rid("FI.1")).expect("entry");
    assert_eq!(entry.field("name").unwrap().old_value.as_deref(), Some("Alice"));

    request.save(&mut store).expect("save journal");
    store.save_record(&mut record).expect("cache write");
    assert_eq!(name_of(&store, "FI.1").as_deref(), Some("Bob"));

    request.undo_request(&mut store).expect("undo");
    assert_eq!(name_of(&store, "FI.1").as_deref(), Some("Alice"));
    assert_eq!(
        request.records()[0].operation(),
        UndoOperation::Done(UndoAction::Update)
    );
    assert_eq!(request.records()[0].operation().as_str(), "DoneUpdate");

    // A second pass finds nothing left to reverse.
    request.undo_request(&mut store).expect("second undo");
    assert_eq!(name_of(&store, "FI.1").as_deref(), Some("Alice"));
}

#[test]
fn failing_reversal_rolls_back_every_earlier_one() {
    let mut store = open_store();
    seed(&store, "CRM_FI", "1", "a");
    seed(&store, "CRM_FI", "2", "b");
    seed(&store, "CRM_XX", "3", "c");
    seed(&store, "CRM_FI", "4", "d");

    let mut records = vec![
        rename("FI.1", "a", "a2"),
        rename("FI.2", "b", "b2"),
        rename("XX.3", "c", "c2"),
        rename("FI.4", "d", "d2"),
    ];
    let mut request = UndoRequest::new(5);
    for record in &records {
        request
            .add_record(record, store.metadata())
            .expect("add record");
    }
    request
        .check_before_cache_save(&store)
        .expect("check before");
    request.save(&mut store).expect("save journal");
    store.save_records(&mut records).expect("cache write");

    // Make the third reversal fail.
    store
        .connection()
        .execute_batch("DROP TABLE CRM_XX")
        .expect("drop table");

    let err = request
        .undo_request(&mut store)
        .expect_err("undo must fail");
    assert!(matches!(err, StoreError::Sql(_)), "got {err:?}");

    assert_eq!(name_of(&store, "FI.1").as_deref(), Some("a2"));
    assert_eq!(name_of(&store, "FI.2").as_deref(), Some("b2"));
    assert_eq!(name_of(&store, "FI.4").as_deref(), Some("d2"));
    assert!(
        request
            .records()
            .iter()
            .all(|entry| entry.operation() == UndoOperation::Pending(UndoAction::Update)),
        "in-memory entries must not claim a reversal that was rolled back"
    );
}

#[test]
fn null_pre_image_is_written_back_as_null() {
    let mut store = open_store();
    store
        .connection()
        .execute("INSERT INTO CRM_FI(recordid, name) VALUES ('7', NULL)", [])
        .expect("seed row");

    let mut record = Record::update(rid("FI.7"));
    record.set_value(0, "filled", None);
    let mut request = UndoRequest::new(2);
    request
        .add_record(&record, store.metadata())
        .expect("add record");
    request
        .check_before_cache_save(&store)
        .expect("check before");
    store.save_record(&mut record).expect("cache write");
    assert_eq!(name_of(&store, "FI.7").as_deref(), Some("filled"));

    request.undo_request(&mut store).expect("undo");
    assert_eq!(name_of(&store, "FI.7"), None);
    assert!(store.read_row(&rid("FI.7")).expect("read row").is_some());
}

#[test]
fn deleted_row_is_reinserted() {
    let mut store = open_store();
    seed(&store, "CRM_FI", "8", "Gone");

    let mut record = Record::delete(rid("FI.8"));
    let mut request = UndoRequest::new(4);
    request
        .add_record(&record, store.metadata())
        .expect("add record");
    request
        .check_before_cache_save(&store)
        .expect("check before");
    store.save_record(&mut record).expect("cache write");
    assert!(store.read_row(&rid("FI.8")).expect("read row").is_none());

    request.undo_request(&mut store).expect("undo");
    assert_eq!(name_of(&store, "FI.8").as_deref(), Some("Gone"));
    assert_eq!(request.records()[0].operation().as_str(), "DoneInsert");
}

use super::*;
use crate::{ColumnKind, SchemaCatalog, SqliteStore, StoreError, TableDef};
use crm_core::ids::{InfoAreaId, RecordIdentification};
use crm_core::journal::{UndoAction, UndoMode, UndoOperation};
use crm_core::{Link, Record};
use rusqlite::params;
use std::sync::Arc;

fn ia(value: &str) -> InfoAreaId {
    InfoAreaId::try_new(value).unwrap()
}

fn rid(value: &str) -> RecordIdentification {
    RecordIdentification::parse(value).unwrap()
}

fn open_store() -> SqliteStore {
    let catalog = SchemaCatalog::new()
        .with_table(
            ia("FI"),
            TableDef::new()
                .field(0, "name", ColumnKind::Text)
                .field(1, "city", ColumnKind::Text),
        )
        .with_table(
            ia("PE"),
            TableDef::new()
                .field(0, "name", ColumnKind::Text)
                .link(ia("FI"), 0, "fi_id")
                .polymorphic_link(ia("KP"), 0, "parent_id", "parent_ia"),
        );
    let store = SqliteStore::open_in_memory(Arc::new(catalog.clone())).unwrap();
    store.install_tables(&catalog).unwrap();
    store
}

fn insert_fi(store: &SqliteStore, record_id: &str, name: &str) {
    store
        .connection()
        .execute(
            "INSERT INTO CRM_FI(recordid, name, city) VALUES (?1, ?2, NULL)",
            params![record_id, name],
        )
        .unwrap();
}

#[test]
fn update_captures_only_touched_columns() {
    let store = open_store();
    insert_fi(&store, "1", "Alice");

    let mut record = Record::update(rid("FI.1"));
    record.set_value(0, "Bob", Some("Alice".into()));
    let mut undo = UndoRecord::from_record(7, &record, store.metadata()).unwrap();
    assert_eq!(undo.operation(), UndoOperation::Uncommitted);
    assert_eq!(undo.field("name").unwrap().old_value, None);

    undo.check_before_cache_save(store.connection(), store.metadata())
        .unwrap();
    assert_eq!(undo.operation(), UndoOperation::Pending(UndoAction::Update));
    assert_eq!(undo.field("name").unwrap().old_value.as_deref(), Some("Alice"));
    assert_eq!(undo.field("name").unwrap().value.as_deref(), Some("Bob"));
    assert!(undo.field("city").is_none());
}

#[test]
fn update_of_uncached_record_becomes_delete() {
    let store = open_store();
    let mut record = Record::update(rid("FI.9"));
    record.set_value(1, "Linz", None);
    let mut undo = UndoRecord::from_record(1, &record, store.metadata()).unwrap();
    undo.check_before_cache_save(store.connection(), store.metadata())
        .unwrap();
    assert_eq!(undo.mode(), UndoMode::UpdateNew);
    assert_eq!(undo.operation(), UndoOperation::Pending(UndoAction::Delete));
}

#[test]
fn delete_snapshots_whole_row() {
    let store = open_store();
    insert_fi(&store, "1", "Alice");
    let mut undo = UndoRecord::from_record(1, &Record::delete(rid("FI.1")), store.metadata()).unwrap();
    undo.check_before_cache_save(store.connection(), store.metadata())
        .unwrap();
    assert_eq!(undo.operation(), UndoOperation::Pending(UndoAction::Insert));
    assert_eq!(undo.field("name").unwrap().old_value.as_deref(), Some("Alice"));
    assert_eq!(undo.field("city").unwrap().old_value, None);
    assert_eq!(undo.fields().count(), 2);
}

#[test]
fn delete_of_missing_row_is_ignored_without_statements() {
    let mut store = open_store();
    let mut undo =
        UndoRecord::from_record(1, &Record::delete(rid("FI.404")), store.metadata()).unwrap();
    undo.check_before_cache_save(store.connection(), store.metadata())
        .unwrap();
    assert_eq!(undo.mode(), UndoMode::DeleteIgnore);
    assert_eq!(undo.operation(), UndoOperation::Ignore);

    // The cache table is gone: any statement would fail.
    store.connection().execute_batch("DROP TABLE CRM_FI").unwrap();
    let metadata = Arc::new(SchemaCatalog::new());
    let tx = store.conn.transaction().unwrap();
    undo.undo_with_transaction(&tx, metadata.as_ref()).unwrap();
    assert_eq!(undo.operation(), UndoOperation::Ignore);
}

#[test]
fn duplicate_rows_abort_the_check() {
    let store = open_store();
    insert_fi(&store, "1", "Alice");
    insert_fi(&store, "1", "Alicia");
    let mut record = Record::update(rid("FI.1"));
    record.set_value(0, "Bob", None);
    let mut undo = UndoRecord::from_record(1, &record, store.metadata()).unwrap();
    let err = undo
        .check_before_cache_save(store.connection(), store.metadata())
        .unwrap_err();
    assert!(matches!(err, StoreError::AmbiguousRecord { rows: 2, .. }));
    assert_eq!(undo.operation(), UndoOperation::Uncommitted);
}

#[test]
fn new_record_is_removed_once_materialized() {
    let store = open_store();
    let mut record = Record::create(ia("FI"));
    record.set_value(0, "Acme", None);
    let mut undo = UndoRecord::from_record(1, &record, store.metadata()).unwrap();
    undo.check_before_cache_save(store.connection(), store.metadata())
        .unwrap();
    assert_eq!(undo.operation(), UndoOperation::Ignore);
    assert!(undo.identification().is_none());

    record.assign_record_id("new00000042");
    undo.check_after_cache_save(Some(&record)).unwrap();
    assert_eq!(undo.identification(), Some(rid("FI.new00000042")));
    assert_eq!(undo.operation(), UndoOperation::Pending(UndoAction::Delete));
}

#[test]
fn undo_before_check_is_rejected() {
    let mut store = open_store();
    let mut record = Record::update(rid("FI.1"));
    record.set_value(0, "Bob", None);
    let mut undo = UndoRecord::from_record(1, &record, store.metadata()).unwrap();
    let metadata = Arc::new(SchemaCatalog::new());
    let tx = store.conn.transaction().unwrap();
    let err = undo
        .undo_with_transaction(&tx, metadata.as_ref())
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition(_)));
}

#[test]
fn links_record_their_columns() {
    let store = open_store();
    let mut record = Record::update(rid("PE.5"));
    record.add_link(Link::new(rid("FI.1"), 0));
    record.add_link(Link::new(rid("MA.77"), 0));
    let undo = UndoRecord::from_record(1, &record, store.metadata()).unwrap();
    assert_eq!(undo.field("fi_id").unwrap().value.as_deref(), Some("1"));
    assert_eq!(undo.field("parent_id").unwrap().value.as_deref(), Some("77"));
    assert_eq!(undo.field("parent_ia").unwrap().value.as_deref(), Some("MA"));
}

#[test]
fn unknown_field_is_reported() {
    let store = open_store();
    let mut record = Record::update(rid("FI.1"));
    record.set_value(42, "x", None);
    let err = UndoRecord::from_record(1, &record, store.metadata()).unwrap_err();
    assert!(matches!(err, StoreError::UnknownField { field_id: 42, .. }));
}

#[test]
fn repeated_edits_share_one_entry() {
    let store = open_store();
    let mut request = UndoRequest::new(3);

    let mut first = Record::update(rid("FI.1"));
    first.set_value(0, "Bob", Some("Alice".into()));
    let mut second = Record::update(rid("FI.1"));
    second.set_value(0, "Carol", Some("Bob".into()));
    second.set_value(1, "Graz", None);
    let mut other = Record::update(rid("FI.2"));
    other.set_value(1, "Wels", None);

    for record in [&first, &second, &other] {
        request.add_record(record, store.metadata()).unwrap();
    }
    assert_eq!(request.len(), 2);
    let entry = request.record(&rid("FI.1")).unwrap();
    assert_eq!(entry.field("name").unwrap().value.as_deref(), Some("Carol"));
    assert_eq!(entry.field("city").unwrap().value.as_deref(), Some("Graz"));
}

#[test]
fn checked_entry_refuses_further_edits() {
    let mut store = open_store();
    store
        .connection()
        .execute(
            "INSERT INTO CRM_FI(recordid, name, city) VALUES ('1', 'Alice', 'Paris')",
            [],
        )
        .unwrap();
    let mut request = UndoRequest::new(4);

    let mut rename = Record::update(rid("FI.1"));
    rename.set_value(0, "Bob", Some("Alice".into()));
    request.add_record(&rename, store.metadata()).unwrap();
    request.check_before_cache_save(&store).unwrap();

    let mut relocate = Record::update(rid("FI.1"));
    relocate.set_value(1, "Rome", Some("Paris".into()));
    let err = request
        .add_record(&relocate, store.metadata())
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition(_)), "got {err:?}");
    assert_eq!(err.status_code(), 8);

    let entry = request.record(&rid("FI.1")).unwrap();
    assert!(entry.field("city").is_none());
    assert_eq!(entry.operation(), UndoOperation::Pending(UndoAction::Update));

    store.save_record(&mut rename).unwrap();
    request.undo_request(&mut store).unwrap();
    let row = store.read_row(&rid("FI.1")).unwrap().unwrap();
    assert_eq!(row.get("name").cloned().flatten().as_deref(), Some("Alice"));
    assert_eq!(row.get("city").cloned().flatten().as_deref(), Some("Paris"));
}

#[test]
fn delete_folded_into_update_captures_whole_row() {
    let store = open_store();
    insert_fi(&store, "1", "Alice");
    let mut request = UndoRequest::new(6);

    let mut rename = Record::update(rid("FI.1"));
    rename.set_value(0, "Bob", Some("Alice".into()));
    request.add_record(&rename, store.metadata()).unwrap();
    request
        .add_record(&Record::delete(rid("FI.1")), store.metadata())
        .unwrap();
    assert_eq!(request.len(), 1);
    assert_eq!(request.records()[0].mode(), UndoMode::Delete);

    request.check_before_cache_save(&store).unwrap();
    let entry = request.record(&rid("FI.1")).unwrap();
    assert_eq!(entry.operation(), UndoOperation::Pending(UndoAction::Insert));
    assert_eq!(entry.field("name").unwrap().old_value.as_deref(), Some("Alice"));
    assert!(entry.field("city").is_some());
}

#[test]
fn empty_request_refuses_save_and_undo() {
    let mut store = open_store();
    let mut request = UndoRequest::new(11);
    assert!(matches!(
        request.save(&mut store),
        Err(StoreError::EmptyJournal { request_nr: 11 })
    ));
    assert!(matches!(
        request.undo_request(&mut store),
        Err(StoreError::EmptyJournal { request_nr: 11 })
    ));
    assert_eq!(crate::status_of(&request.save(&mut store)), 7);
}

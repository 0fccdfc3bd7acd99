//! Integration tests for saving aggregates with their outbox rows.

mod models;

use std::collections::BTreeMap;

use serde_json::json;
use transactional_outbox::{
    Adapter, AggregateIdentifier, Configuration, ConfigurationError, InMemoryDatabase,
    OutboxError, Phase, Record, SaveOptions, StoreError,
};

use models::{configuration, repository, FakeModel, UuidFakeModel};

#[test]
fn create_writes_one_outbox_row() {
    let repo = repository(InMemoryDatabase::new(), configuration());

    let record = repo.create(FakeModel::new(1, "bob")).unwrap();
    assert!(record.is_persisted());
    assert_eq!(record.phase(), Phase::Committed);

    let rows = repo.outbox_rows::<FakeModel>().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.event, "FAKE_MODEL_CREATED");
    assert_eq!(row.aggregate, "FakeModel");
    assert_eq!(row.aggregate_identifier.key(), "1");

    let payload = row.decoded_payload().unwrap();
    assert!(payload.before.is_none());
    assert_eq!(payload.after.unwrap()["name"], "bob");
}

#[test]
fn update_and_destroy_follow_the_lifecycle() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    let mut record = repo.create(FakeModel::new(1, "bob")).unwrap();

    record.name = "robert".into();
    assert!(repo.save(&mut record, SaveOptions::new()).unwrap());
    repo.destroy(&mut record).unwrap();

    let rows = repo.outbox_rows::<FakeModel>().unwrap();
    let events: Vec<&str> = rows.iter().map(|row| row.event.as_str()).collect();
    assert_eq!(
        events,
        ["FAKE_MODEL_CREATED", "FAKE_MODEL_UPDATED", "FAKE_MODEL_DESTROYED"]
    );

    let updated = rows[1].decoded_payload().unwrap();
    assert_eq!(updated.before.unwrap()["name"], "bob");
    assert_eq!(updated.after.unwrap()["name"], "robert");

    let destroyed = rows[2].decoded_payload().unwrap();
    assert_eq!(destroyed.before.unwrap()["name"], "robert");
    assert!(destroyed.after.is_none());
    assert_eq!(repo.count::<FakeModel>().unwrap(), 0);
}

#[test]
fn namespaced_models_use_their_namespace_store() {
    let repo = repository(InMemoryDatabase::new(), configuration());

    let model = UuidFakeModel::new("bob");
    let id = model.identifier;
    repo.create(model).unwrap();

    let rows = repo.outbox_rows::<UuidFakeModel>().unwrap();
    assert_eq!(repo.outbox_store::<UuidFakeModel>().unwrap().table(), "uuid_outboxes");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event, "FAKE_MODEL_CREATED.uuid");
    assert_eq!(rows[0].aggregate, "Uuid::FakeModel");
    assert_eq!(rows[0].aggregate_identifier, AggregateIdentifier::Uuid(id));
    assert!(repo.outbox_rows::<FakeModel>().unwrap().is_empty());
}

#[test]
fn payload_is_a_string_unless_the_column_is_native_json() {
    let sqlite = repository(
        InMemoryDatabase::new(),
        configuration().with_adapter(Adapter::Sqlite),
    );
    sqlite.create(FakeModel::new(1, "bob")).unwrap();
    let row = &sqlite.outbox_rows::<FakeModel>().unwrap()[0];
    let encoded = row.payload.as_str().unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(encoded).unwrap(),
        json!({ "before": null, "after": { "id": 1, "name": "bob" } })
    );

    for adapter in [Adapter::Postgresql, Adapter::Mysql] {
        let native = repository(InMemoryDatabase::new(), configuration().with_adapter(adapter));
        native.create(FakeModel::new(1, "bob")).unwrap();
        let row = &native.outbox_rows::<FakeModel>().unwrap()[0];
        assert_eq!(
            row.payload,
            json!({ "before": null, "after": { "id": 1, "name": "bob" } })
        );
    }
}

#[test]
fn adapter_from_loaded_configuration_sets_the_payload_format() {
    let config = Configuration::from_json(
        r#"{"adapter": "postgresql", "outbox_mapping": {"default": "Outbox"}}"#,
    )
    .unwrap();
    let repo = repository(InMemoryDatabase::new(), config);

    repo.create(FakeModel::new(1, "bob")).unwrap();

    let row = &repo.outbox_rows::<FakeModel>().unwrap()[0];
    assert!(row.payload.is_object());
    assert_eq!(row.payload["after"]["name"], "bob");
}

#[test]
fn override_event_is_used_once() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    let mut record = repo.create(FakeModel::new(1, "bob")).unwrap();

    record.name = "robert".into();
    repo.save(&mut record, SaveOptions::event("FakeModelRenamed")).unwrap();
    assert_eq!(record.outbox_event(), None);

    record.name = "rob".into();
    repo.save(&mut record, SaveOptions::new()).unwrap();

    let events: Vec<String> = repo
        .outbox_rows::<FakeModel>()
        .unwrap()
        .into_iter()
        .map(|row| row.event)
        .collect();
    assert_eq!(
        events,
        ["FAKE_MODEL_CREATED", "FAKE_MODEL_RENAMED", "FAKE_MODEL_UPDATED"]
    );
}

#[test]
fn override_set_on_the_record_is_cleared_after_a_failed_save() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    let mut record = Record::new(FakeModel::new(1, ""));
    record.set_outbox_event("FakeModelImported");

    assert!(!repo.save(&mut record, SaveOptions::new()).unwrap());
    assert_eq!(record.outbox_event(), None);

    record.name = "bob".into();
    repo.save(&mut record, SaveOptions::new()).unwrap();
    assert_eq!(
        repo.outbox_rows::<FakeModel>().unwrap()[0].event,
        "FAKE_MODEL_CREATED"
    );
}

#[test]
fn invalid_outbox_row_rolls_back_the_aggregate() {
    let config = Configuration::new().map("default", "Strict::Outbox");
    let repo = repository(InMemoryDatabase::new(), config);
    let mut record = repo.create(FakeModel::new(1, "bob")).unwrap();

    let err = repo.destroy(&mut record).unwrap_err();
    let OutboxError::RecordInvalid(errors) = err else {
        panic!("expected RecordInvalid");
    };
    assert_eq!(errors.get("outbox.event"), vec!["is not allowed"]);
    assert_eq!(record.errors().get("outbox.event"), vec!["is not allowed"]);
    assert_eq!(record.phase(), Phase::Failed);
    assert!(record.is_persisted());

    assert_eq!(repo.count::<FakeModel>().unwrap(), 1);
    assert_eq!(repo.outbox_rows::<FakeModel>().unwrap().len(), 1);
}

#[test]
fn rejected_update_keeps_the_persisted_state() {
    let config = Configuration::new().map("default", "Frozen::Outbox");
    let repo = repository(InMemoryDatabase::new(), config);
    let mut record = repo.create(FakeModel::new(1, "bob")).unwrap();

    record.name = "robert".into();
    assert!(!repo.save(&mut record, SaveOptions::new()).unwrap());
    assert_eq!(record.errors().get("outbox.event"), vec!["is frozen"]);
    assert_eq!(record.phase(), Phase::Failed);

    assert_eq!(repo.find::<FakeModel>(1).unwrap().unwrap().name, "bob");
    assert_eq!(repo.outbox_rows::<FakeModel>().unwrap().len(), 1);
    assert!(record.previous_changes().is_empty());
    assert_eq!(record.persisted_snapshot().unwrap()["name"], "bob");
    assert_eq!(record.name, "robert");
}

#[test]
fn save_reports_outbox_errors_on_the_record() {
    let config = Configuration::new().map("default", "Strict::Outbox");
    let repo = repository(InMemoryDatabase::new(), config);
    let mut record = Record::new(FakeModel::new(1, "bob"));
    record.set_outbox_event("FakeModelDestroyed");

    assert!(!repo.save(&mut record, SaveOptions::new()).unwrap());
    let expected: BTreeMap<String, Vec<String>> =
        BTreeMap::from([("outbox.event".to_string(), vec!["is not allowed".to_string()])]);
    assert_eq!(record.errors().messages(), expected);
    assert!(record.is_new_record());
    assert_eq!(repo.count::<FakeModel>().unwrap(), 0);
    assert!(repo.outbox_rows::<FakeModel>().unwrap().is_empty());
}

#[test]
fn save_strict_raises_record_invalid() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    let mut record = Record::new(FakeModel::new(1, " "));

    let err = repo.save_strict(&mut record, SaveOptions::new()).unwrap_err();
    assert!(matches!(err, OutboxError::RecordInvalid(ref errors) if !errors.get("name").is_empty()));
    assert_eq!(repo.count::<FakeModel>().unwrap(), 0);
}

#[test]
fn failing_outbox_insert_leaves_nothing_behind() {
    let config = Configuration::new().map("default", "Broken::Outbox");
    let repo = repository(InMemoryDatabase::new(), config);
    let mut record = Record::new(FakeModel::new(1, "bob"));

    let err = repo.save(&mut record, SaveOptions::new()).unwrap_err();
    assert!(matches!(err, OutboxError::RecordNotSaved(_)));
    assert_eq!(record.phase(), Phase::Failed);
    assert_eq!(repo.count::<FakeModel>().unwrap(), 0);
    assert!(repo.outbox_rows::<FakeModel>().unwrap().is_empty());
}

#[test]
fn missing_configuration_fails_before_anything_is_written() {
    let repo = repository(InMemoryDatabase::new(), Configuration::new());
    let mut record = Record::new(FakeModel::new(1, "bob"));

    let err = repo.save(&mut record, SaveOptions::new()).unwrap_err();
    assert!(matches!(
        err,
        OutboxError::Configuration(ConfigurationError::OutboxClassNotFound { .. })
    ));
    assert_eq!(repo.count::<FakeModel>().unwrap(), 0);
}

#[test]
fn changing_the_primary_key_moves_the_row() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    let mut record = repo.create(FakeModel::new(1, "bob")).unwrap();

    record.id = 2;
    repo.save(&mut record, SaveOptions::new()).unwrap();

    assert!(repo.find::<FakeModel>(1).unwrap().is_none());
    assert_eq!(repo.find::<FakeModel>(2).unwrap().unwrap().name, "bob");

    let rows = repo.outbox_rows::<FakeModel>().unwrap();
    let payload = rows[1].decoded_payload().unwrap();
    assert_eq!(payload.before.unwrap()["id"], 1);
    assert_eq!(payload.after.unwrap()["id"], 2);
    assert_eq!(rows[1].aggregate_identifier.key(), "2");
}

#[test]
fn unchanged_update_still_records_an_event() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    let mut record = repo.create(FakeModel::new(1, "bob")).unwrap();

    repo.save(&mut record, SaveOptions::new()).unwrap();

    let rows = repo.outbox_rows::<FakeModel>().unwrap();
    assert_eq!(rows.len(), 2);
    let payload = rows[1].decoded_payload().unwrap();
    assert_eq!(payload.before, payload.after);
}

#[test]
fn repository_from_global_configuration() {
    transactional_outbox::configure(|config| {
        config.insert("default", "Outbox");
    });
    let repo = transactional_outbox::Repository::from_global_config(
        InMemoryDatabase::new(),
        models::stores(),
    );
    transactional_outbox::reset();

    repo.create(FakeModel::new(1, "bob")).unwrap();
    assert_eq!(repo.outbox_rows::<FakeModel>().unwrap().len(), 1);
}

#[test]
fn duplicate_key_on_create_is_a_store_error() {
    let repo = repository(InMemoryDatabase::new(), configuration());
    repo.create(FakeModel::new(1, "bob")).unwrap();

    let mut duplicate = Record::new(FakeModel::new(1, "alice"));
    let err = repo.save(&mut duplicate, SaveOptions::new()).unwrap_err();
    assert!(matches!(err, OutboxError::Store(StoreError::DuplicateKey { .. })));
    assert_eq!(repo.outbox_rows::<FakeModel>().unwrap().len(), 1);
}

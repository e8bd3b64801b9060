// tests/integration_test.rs

//! End-to-end tests exercising the engine against a real file-backed SQLite
//! database and a temp migrations directory, the way a user runs jetbase.

use jetbase::config::EngineConfig;
use jetbase::engine::Engine;
use jetbase::Error;
use jetbase::events::{ProgressEvent, VecSink};
use jetbase::validate::ValidationOptions;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn open_file_engine(tmp_dir: &Path, migrations_dir: &Path) -> Engine {
    let db_path = tmp_dir.join("jetbase.db");
    let config = EngineConfig::resolve(
        Default::default(),
        jetbase::config::EnvConfig::default(),
        jetbase::config::CliOverrides {
            database_url: Some(format!("sqlite://{}", db_path.display())),
            migrations_dir: Some(migrations_dir.to_path_buf()),
            postgres_schema: None,
            skip_validation: None,
            skip_checksum_validation: None,
            skip_file_validation: None,
        },
    )
    .unwrap();
    Engine::open(&config).unwrap()
}

#[test]
fn first_time_upgrade_applies_every_version_in_order() {
    let db_dir = TempDir::new().unwrap();
    let migrations_dir = TempDir::new().unwrap();
    write(
        migrations_dir.path(),
        "V1__create_users.sql",
        "-- upgrade\nCREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT);\n-- rollback\nDROP TABLE users;\n",
    );
    write(
        migrations_dir.path(),
        "V2__add_email.sql",
        "-- upgrade\nALTER TABLE users ADD COLUMN email TEXT;\n-- rollback\nSELECT 1;\n",
    );

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let mut sink = VecSink::default();
    let count = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();
    assert_eq!(count, 2);

    let history = engine.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version.as_deref(), Some("2"));
}

#[test]
fn rollback_one_version_removes_it_from_history() {
    let db_dir = TempDir::new().unwrap();
    let migrations_dir = TempDir::new().unwrap();
    write(
        migrations_dir.path(),
        "V1__create_t.sql",
        "-- upgrade\nCREATE TABLE t(x INT);\n-- rollback\nDROP TABLE t;\n",
    );
    write(
        migrations_dir.path(),
        "V2__create_u.sql",
        "-- upgrade\nCREATE TABLE u(y INT);\n-- rollback\nDROP TABLE u;\n",
    );

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let mut sink = VecSink::default();
    engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();

    let count = engine.rollback(Some("1"), None, &mut sink).unwrap();
    assert_eq!(count, 1);

    let history = engine.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version.as_deref(), Some("1"));
}

#[test]
fn editing_an_applied_migration_file_blocks_further_upgrades() {
    let db_dir = TempDir::new().unwrap();
    let migrations_dir = TempDir::new().unwrap();
    write(
        migrations_dir.path(),
        "V1__create_t.sql",
        "-- upgrade\nCREATE TABLE t(x INT);\n",
    );

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let mut sink = VecSink::default();
    engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();

    write(
        migrations_dir.path(),
        "V1__create_t.sql",
        "-- upgrade\nCREATE TABLE t(x INT, y INT);\n",
    );
    write(migrations_dir.path(), "V2__noop.sql", "-- upgrade\nSELECT 1;\n");

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let err = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap_err();
    assert!(matches!(err, Error::MigrationChecksumMismatch(_)));
}

#[test]
fn repair_checksums_clears_drift_after_an_intentional_edit() {
    let db_dir = TempDir::new().unwrap();
    let migrations_dir = TempDir::new().unwrap();
    write(
        migrations_dir.path(),
        "V1__create_t.sql",
        "-- upgrade\nCREATE TABLE t(x INT);\n",
    );

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let mut sink = VecSink::default();
    engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();

    write(
        migrations_dir.path(),
        "V1__create_t.sql",
        "-- upgrade\nCREATE TABLE t (x INT);\n",
    );

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    engine.repair_checksums().unwrap();
    write(migrations_dir.path(), "V2__noop.sql", "-- upgrade\nSELECT 1;\n");
    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let count = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn repeatable_on_change_reruns_only_when_content_changes() {
    let db_dir = TempDir::new().unwrap();
    let migrations_dir = TempDir::new().unwrap();
    write(
        migrations_dir.path(),
        "RC__seed_view.sql",
        "-- upgrade\nCREATE VIEW v AS SELECT 1;\n",
    );

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let mut sink = VecSink::default();
    let count = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();
    assert_eq!(count, 1);

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let count = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();
    assert_eq!(count, 0, "unchanged RC file must not rerun");

    write(
        migrations_dir.path(),
        "RC__seed_view.sql",
        "-- upgrade\nDROP VIEW v;\nCREATE VIEW v AS SELECT 2;\n",
    );
    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let count = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap();
    assert_eq!(count, 1, "changed RC file must rerun");
}

#[test]
fn lock_is_released_after_a_failed_migration() {
    let db_dir = TempDir::new().unwrap();
    let migrations_dir = TempDir::new().unwrap();
    write(migrations_dir.path(), "V1__bad.sql", "-- upgrade\nNOT VALID SQL;\n");

    let mut engine = open_file_engine(db_dir.path(), migrations_dir.path());
    let mut sink = VecSink::default();
    let err = engine
        .upgrade(None, None, &ValidationOptions::default(), &mut sink)
        .unwrap_err();
    assert!(err.to_string().contains("database error"));

    let status = engine.lock_status().unwrap();
    assert!(!status.is_locked, "lock must be released even after failure");
    assert!(matches!(sink.0.last(), Some(ProgressEvent::Failed { .. })));
}

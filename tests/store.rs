use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use tabula::engine::{Engine, StoreError};
use tabula::sql::plan_and_exec;
use tempfile::TempDir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn concurrent_inserts_get_distinct_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let tmp = TempDir::new().unwrap();
    let db = Engine::open(tmp.path()).unwrap();
    db.create_table("events", strings(&["worker", "seq"])).unwrap();

    let ids: Vec<i64> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|w| {
                let db = &db;
                s.spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            db.insert("events", vec![w.to_string(), i.to_string()])
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    let total = THREADS * PER_THREAD;
    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), total);

    let records = db.select_all("events").unwrap();
    assert_eq!(records.len(), total);
    let expected: Vec<i64> = (1..=total as i64).collect();
    assert_eq!(records.keys().copied().collect::<Vec<_>>(), expected);
}

#[test]
fn readers_and_writers_on_different_tables() {
    let tmp = TempDir::new().unwrap();
    let db = Arc::new(Engine::open(tmp.path()).unwrap());
    db.create_table("a", strings(&["v"])).unwrap();
    db.create_table("b", strings(&["v"])).unwrap();
    db.insert("b", strings(&["fixed"])).unwrap();

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 0..200 {
                db.insert("a", vec![i.to_string()]).unwrap();
                db.save_table("a").unwrap();
            }
        })
    };
    let reader = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for _ in 0..200 {
                let record = db.select("b", 1).unwrap().unwrap();
                assert_eq!(record.get("v"), Some("fixed"));
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    // the last save saw every insert
    let reopened = Engine::open(tmp.path()).unwrap();
    assert_eq!(reopened.select_all("a").unwrap().len(), 200);
}

#[test]
fn commands_survive_restart() {
    let tmp = TempDir::new().unwrap();
    {
        let db = Engine::open(tmp.path()).unwrap();
        for cmd in [
            "CREATE TABLE users name,email",
            "INSERT users Alice,a@x.com",
            "INSERT users Bob   Jr , b@x.com",
            "INSERT users Carol,c@x.com",
            "UPDATE users 1 Alicia,alicia@x.com",
            "DELETE users 3",
        ] {
            plan_and_exec(&db, cmd).unwrap();
        }
    }

    let db = Engine::open(tmp.path()).unwrap();
    assert_eq!(db.fields("users").unwrap(), strings(&["name", "email"]));

    let records = db.select_all("users").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[&1].get("name"), Some("Alicia"));
    assert_eq!(records[&2].get("name"), Some("Bob Jr"));
    assert_eq!(records[&2].get("email"), Some("b@x.com"));

    let err = db.select("users", 3).unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { id: 3, .. }));
    // the counter is rebuilt from the highest id on disk
    assert_eq!(db.insert("users", strings(&["Dan", "d@x.com"])).unwrap(), 3);
}

#[test]
fn corrupt_rows_are_dropped_on_startup() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("users.csv"),
        "id,name,email\n1,Alice,a@x.com\nnope,Bob,b@x.com\n",
    )
    .unwrap();

    let db = Engine::open(tmp.path()).unwrap();
    let records = db.select_all("users").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[&1].get("email"), Some("a@x.com"));
    assert_eq!(db.insert("users", strings(&["Eve", "e@x.com"])).unwrap(), 2);
}

#[test]
fn independent_engines_do_not_share_tables() {
    let one = TempDir::new().unwrap();
    let two = TempDir::new().unwrap();
    let first = Engine::open(one.path()).unwrap();
    let second = Engine::open(two.path()).unwrap();

    first.create_table("t", strings(&["v"])).unwrap();
    assert!(matches!(second.select_all("t"), Err(StoreError::TableNotFound(_))));
    second.create_table("t", strings(&["v"])).unwrap();
}

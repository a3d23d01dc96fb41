use blockgrid::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;

fn schema() -> Schema {
    Schema::parse("label TEXT, hp INTEGER").unwrap()
}

#[test]
fn test_reopen_restores_points_and_blocks() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("grid.aof");

    let (kept, moved_id) = {
        let mut db = PositionalDB::open(&path, Config::with_schema(schema())).unwrap();
        let kept = PointRecord::new(5.0, 5.0).with_field("label", "kept");
        db.add(kept.clone()).unwrap();

        let gone = db.add(PointRecord::new(25.0, 25.0)).unwrap();
        db.remove(&gone, None).unwrap();

        let moved_id = db.add(PointRecord::new(6.0, 6.0).with_field("hp", 3)).unwrap();
        db.move_point(&moved_id, -45.0, 45.0, None).unwrap();
        db.close().unwrap();
        (kept, moved_id)
    };

    let db = PositionalDB::open(&path, Config::with_schema(schema())).unwrap();
    let stored_kept = db.get(kept.id(), Some((5.0, 5.0))).unwrap();
    assert_eq!(stored_kept.get("label"), kept.get("label"));

    let moved = db.get(&moved_id, None).unwrap();
    assert_eq!(moved.position(), (-45.0, 45.0));
    assert_eq!(moved.get("hp"), Some(&FieldValue::Integer(3)));

    assert_eq!(
        db.blocks_in_rect(-100.0, -100.0, 200.0, 200.0).unwrap(),
        vec![BlockId::new(0, 0), BlockId::new(-3, 2)]
    );
}

#[test]
fn test_block_size_mismatch_on_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("grid.aof");

    {
        let mut db = PositionalDB::open(&path, Config::default()).unwrap();
        db.add(PointRecord::new(1.0, 1.0)).unwrap();
    }

    let result = PositionalDB::open(&path, Config::default().with_block_size(50.0));
    assert!(matches!(result, Err(GridError::ConfigMismatch(_))));

    let result = PositionalDB::open(&path, Config::with_schema(schema()));
    assert!(matches!(result, Err(GridError::ConfigMismatch(_))));
}

#[test]
fn test_torn_tail_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("grid.aof");

    let id = {
        let mut db = PositionalDB::open(&path, Config::default()).unwrap();
        let id = db.add(PointRecord::new(7.0, 7.0)).unwrap();
        db.close().unwrap();
        id
    };

    // A length prefix promising more bytes than follow
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0, 0, 1, 0, 0xAB, 0xCD]).unwrap();
    }
    let torn_len = std::fs::metadata(&path).unwrap().len();

    let mut db = PositionalDB::open(&path, Config::default()).unwrap();
    assert_eq!(db.get(&id, None).unwrap().position(), (7.0, 7.0));
    assert!(std::fs::metadata(&path).unwrap().len() < torn_len);

    // The log stays appendable after truncation
    let second = db.add(PointRecord::new(8.0, 8.0)).unwrap();
    db.close().unwrap();
    drop(db);

    let db = PositionalDB::open(&path, Config::default()).unwrap();
    assert_eq!(db.all().unwrap().len(), 2);
    assert!(db.get(&second, None).is_ok());
}

#[test]
fn test_compaction_keeps_live_state() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("grid.aof");
    let config = Config::default()
        .with_aof_rewrite_threshold(4 * 1024)
        .with_sync_policy(SyncPolicy::Never);

    let id = {
        let mut db = PositionalDB::open(&path, config.clone()).unwrap();
        let id = db.add(PointRecord::new(0.0, 0.0)).unwrap();
        for i in 0..2_000 {
            let x = (i % 50) as f64 * 3.0;
            db.move_point(&id, x, x, None).unwrap();
        }
        db.close().unwrap();
        id
    };

    // 2000 logged moves would be far larger than a few rewrite thresholds
    assert!(std::fs::metadata(&path).unwrap().len() < 64 * 1024);

    let db = PositionalDB::open(&path, config).unwrap();
    let last = (1_999 % 50) as f64 * 3.0;
    assert_eq!(db.get(&id, None).unwrap().position(), (last, last));
    assert_eq!(db.stats().unwrap().unit_count, 1);
}

#[test]
fn test_closed_store_rejects_writes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("grid.aof");

    let mut db = PositionalDB::open(&path, Config::default()).unwrap();
    db.close().unwrap();
    assert!(matches!(
        db.add(PointRecord::new(1.0, 1.0)),
        Err(GridError::DatabaseClosed)
    ));
}

#[test]
fn test_add_succeeds_when_compaction_cannot_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("grid.aof");
    std::fs::create_dir(temp_dir.path().join("grid.aof.rewrite")).unwrap();
    let config = Config::default().with_aof_rewrite_threshold(1);

    let id = {
        let mut db = PositionalDB::open(&path, config.clone()).unwrap();
        let id = db.add(PointRecord::new(5.0, 5.0)).unwrap();
        db.move_point(&id, 45.0, 5.0, None).unwrap();
        assert_eq!(db.get(&id, None).unwrap().position(), (45.0, 5.0));
        db.close().unwrap();
        id
    };

    let db = PositionalDB::open(&path, config).unwrap();
    assert_eq!(db.get(&id, None).unwrap().position(), (45.0, 5.0));
    assert_eq!(db.all().unwrap().len(), 1);
}

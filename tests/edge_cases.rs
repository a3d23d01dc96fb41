use blockgrid::{BlockId, Config, GridError, Patch, PointRecord, PositionalDB, Schema};

/// Test 1: Large dataset stress test
#[test]
fn test_large_dataset_insertion() {
    let mut db = PositionalDB::memory().expect("Failed to create store");

    // 10K points over a 50x50 block area
    for i in 0..10_000 {
        let x = (i % 100) as f64 * 10.0;
        let y = (i / 100) as f64 * 10.0;
        db.add(PointRecord::new(x, y))
            .unwrap_or_else(|_| panic!("Failed to insert point {}", i));
    }

    let results = db.within_radius(500.0, 500.0, 25.0).expect("Query failed");
    assert!(!results.is_empty());
    assert_eq!(db.stats().unwrap().unit_count, 50 * 50);
}

/// Test 2: Negative coordinates floor toward negative infinity
#[test]
fn test_negative_coordinates() {
    let mut db = PositionalDB::memory().unwrap();
    let p = PointRecord::new(-5.0, -0.5);
    db.add(p.clone()).unwrap();

    assert_eq!(db.block_index().find_block(-5.0, -0.5), (-20.0, -20.0));
    assert_eq!(db.within_block_id(BlockId::new(-1, -1)).unwrap(), vec![p.clone()]);
    assert_eq!(db.within_rect(-6.0, -1.0, 2.0, 1.0).unwrap(), vec![p]);
}

/// Test 3: Extreme coordinate values
#[test]
fn test_extreme_coordinates() {
    let mut db = PositionalDB::memory().unwrap();

    let far = PointRecord::new(1e12, -1e12);
    let near = PointRecord::new(0.0, 0.0);
    db.add(far.clone()).unwrap();
    db.add(near.clone()).unwrap();

    assert_eq!(db.within_radius(1e12, -1e12, 1.0).unwrap(), vec![far]);
    assert_eq!(db.within_rect(-1e13, -1e13, 2e13, 2e13).unwrap().len(), 2);
}

/// Test 4: Non-finite input is rejected
#[test]
fn test_non_finite_input() {
    let mut db = PositionalDB::memory().unwrap();

    for (x, y) in [(f64::NAN, 0.0), (0.0, f64::INFINITY)] {
        assert!(matches!(
            db.add(PointRecord::new(x, y)),
            Err(GridError::InvalidInput(_))
        ));
        assert!(matches!(
            db.within_rect(x, y, 1.0, 1.0),
            Err(GridError::InvalidInput(_))
        ));
    }

    let id = db.add(PointRecord::new(1.0, 1.0)).unwrap();
    assert!(matches!(
        db.edit(&id, Patch::new().x(f64::NAN), None),
        Err(GridError::InvalidInput(_))
    ));
    assert_eq!(db.get(&id, None).unwrap().position(), (1.0, 1.0));
}

/// Test 5: Zero-sized rectangle
#[test]
fn test_degenerate_rectangle() {
    let mut db = PositionalDB::memory().unwrap();
    let p = PointRecord::new(20.0, 20.0);
    db.add(p.clone()).unwrap();

    assert_eq!(db.within_rect(20.0, 20.0, 0.0, 0.0).unwrap(), vec![p]);
    assert!(db.within_rect(20.1, 20.0, 0.0, 0.0).unwrap().is_empty());
}

/// Test 6: Fractional block sizes
#[test]
fn test_fractional_block_size() {
    let mut db = PositionalDB::memory_with_config(Config::default().with_block_size(0.1)).unwrap();
    let p = PointRecord::new(0.35, -0.05);
    db.add(p.clone()).unwrap();

    assert_eq!(db.within_block_id(BlockId::new(3, -1)).unwrap(), vec![p]);
}

/// Test 7: Misses with and without hints
#[test]
fn test_not_found_paths() {
    let mut db = PositionalDB::memory().unwrap();
    let id = db.add(PointRecord::new(10.0, 10.0)).unwrap();

    assert!(db.get("nope", None).unwrap_err().is_not_found());
    assert!(db.get(&id, Some((30.0, 30.0))).unwrap_err().is_not_found());
    assert!(db.remove("nope", Some((10.0, 10.0))).unwrap_err().is_not_found());
    assert!(db.move_point("nope", 0.0, 0.0, None).unwrap_err().is_not_found());
    assert!(db.edit("nope", Patch::new(), None).unwrap_err().is_not_found());
}

/// Test 8: Re-adding an id into its own block fails without side effects
#[test]
fn test_duplicate_add_leaves_store_unchanged() {
    let mut db = PositionalDB::memory().unwrap();
    let p = PointRecord::new(3.0, 3.0);
    db.add(p.clone()).unwrap();

    let before = db.stats().unwrap();
    assert!(matches!(
        db.add(p.clone()),
        Err(GridError::DuplicateId { .. })
    ));
    let after = db.stats().unwrap();

    assert_eq!(before.unit_count, after.unit_count);
    assert_eq!(before.record_count, after.record_count);
    assert_eq!(db.all().unwrap(), vec![p]);
}

/// Test 9: Undeclared fields are rejected
#[test]
fn test_schema_violation() {
    let schema = Schema::parse("hp INTEGER").unwrap();
    let mut db = PositionalDB::memory_with_config(Config::with_schema(schema)).unwrap();

    assert!(matches!(
        db.add(PointRecord::new(0.0, 0.0).with_field("mana", 3)),
        Err(GridError::SchemaViolation(_))
    ));
    assert!(matches!(
        db.add(PointRecord::new(0.0, 0.0).with_field("hp", "lots")),
        Err(GridError::SchemaViolation(_))
    ));
    assert!(db.all().unwrap().is_empty());
}

use blockgrid::{Config, Patch, PointRecord, PositionalDB, Schema};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("blockgrid - Getting Started");
    println!("===========================\n");

    let schema = Schema::parse("name TEXT, hp INTEGER")?;
    let mut db = PositionalDB::memory_with_config(Config::with_schema(schema))?;
    println!("Created in-memory store with block size {}", db.block_size());

    let tree = PointRecord::new(25.0, 25.0).with_field("name", "oak");
    let rock = PointRecord::new(5.0, 5.0).with_field("name", "rock");
    let goblin = PointRecord::new(-12.0, 30.0)
        .with_field("name", "goblin")
        .with_field("hp", 7);

    db.add(tree.clone())?;
    db.add(rock)?;
    let goblin_id = db.add(goblin)?;
    println!("Added 3 points across {} blocks", db.stats()?.unit_count);

    let near = db.within_rect(0.0, 0.0, 30.0, 30.0)?;
    println!("\nPoints in [0, 30] x [0, 30]: {}", near.len());
    for p in &near {
        let name = p.get("name").map_or("?".into(), |v| v.to_string());
        println!("  {} at {:?}", name, p.position());
    }

    let around = db.within_radius(0.0, 20.0, 15.0)?;
    println!("Points within 15 of (0, 20): {}", around.len());

    let moved = db.move_point(&goblin_id, 41.0, 41.0, Some((-12.0, 30.0)))?;
    println!("\nGoblin moved to {:?}", moved.position());

    let hurt = db.edit(&goblin_id, Patch::new().set("hp", 2), Some(moved.position()))?;
    let hp = hurt.get("hp").map_or("?".into(), |v| v.to_string());
    println!("Goblin hp is now {}", hp);

    db.remove_record(&tree)?;
    println!(
        "\nRemoved the oak; {} blocks remain occupied",
        db.stats()?.unit_count
    );

    for block in db.blocks_in_rect(-100.0, -100.0, 200.0, 200.0)? {
        let held = db.within_block_id(block)?.len();
        println!("  block {} holds {} point(s)", block, held);
    }

    Ok(())
}

mod common;

use common::{Health, Physics, count_rows, in_memory, load_all, on_disk};
use engine_component::{Entity, EntityId};
use engine_persistence::PersistError;

/// Write a level file holding two entities.
fn write_level(path: &std::path::Path) -> Vec<EntityId> {
    let mut level = on_disk(path);
    let mut world = vec![
        Entity::new().with(Health { current: 250 }),
        Entity::new().with(Physics {
            x: 10.0,
            y: 20.0,
            grounded: true,
        }),
    ];
    level.save(world.iter_mut()).unwrap();
    world.iter().map(Entity::id).collect()
}

#[test]
fn test_import_yields_exactly_the_level_entities() {
    let dir = tempfile::tempdir().unwrap();
    let level_path = dir.path().join("level2.db");
    let level_ids = write_level(&level_path);

    let mut engine = in_memory();
    let mut current: Vec<Entity> = (0..5)
        .map(|i| Entity::new().with(Health { current: i }))
        .collect();
    engine.save(current.iter_mut()).unwrap();

    let report = engine.import_world(&level_path).unwrap();
    assert_eq!(report.entities, 2);

    let loaded = load_all(&mut engine);
    let ids: Vec<_> = loaded.iter().map(Entity::id).collect();
    assert_eq!(ids, level_ids);
    assert_eq!(loaded[0].get_as::<Health>(), Some(&Health { current: 250 }));
    assert!(loaded[1].has("Physics"));
    assert!(!loaded[1].has("Health"));
    assert_eq!(count_rows(&engine, "Health"), 1);
}

#[test]
fn test_save_after_import_continues_ids() {
    let dir = tempfile::tempdir().unwrap();
    let level_path = dir.path().join("level2.db");
    write_level(&level_path);

    let mut engine = in_memory();
    engine.import_world(&level_path).unwrap();

    let mut loaded = load_all(&mut engine);
    loaded.push(Entity::new().with(Health { current: 1 }));
    loaded[1].attach(Box::new(Health { current: 60 }));
    let report = engine.save(loaded.iter_mut()).unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 2);
    assert_eq!(loaded[2].id(), EntityId(3));

    let reloaded = load_all(&mut engine);
    assert_eq!(reloaded.len(), 3);
    assert_eq!(reloaded[1].get_as::<Health>(), Some(&Health { current: 60 }));
}

#[test]
fn test_import_discards_pending_deletions() {
    let dir = tempfile::tempdir().unwrap();
    let level_path = dir.path().join("level2.db");
    write_level(&level_path);

    let mut engine = in_memory();
    engine.recycle(EntityId(1));
    engine.import_world(&level_path).unwrap();
    assert!(engine.pending_deletions().is_empty());

    let mut nothing: Vec<Entity> = Vec::new();
    engine.save(nothing.iter_mut()).unwrap();
    assert_eq!(count_rows(&engine, "Entity"), 2);
}

#[test]
fn test_import_of_missing_file_leaves_world_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = in_memory();
    let mut world = vec![Entity::new().with(Health { current: 7 })];
    engine.save(world.iter_mut()).unwrap();

    let err = engine
        .import_world(dir.path().join("missing.db"))
        .unwrap_err();
    assert!(matches!(err, PersistError::WorldFileNotFound(_)));
    assert_eq!(load_all(&mut engine).len(), 1);
}

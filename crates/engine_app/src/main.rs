//! # engine_app — world host
//!
//! Owns a live [`World`](world::World) and persists it through
//! [`EntityPersistence`].
//!
//! ## Commands
//!
//! - `demo` loads the stored world (spawning a starter world if it is
//!   empty), simulates a few seconds of play and saves.
//! - `list` prints the stored entities as JSON.
//! - `import <file>` replaces the stored world with a level file.
//!
//! The database is `world.db` unless `ENGINE_DB_PATH`, `--config` or `--db`
//! says otherwise.

mod components;
mod world;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine_component::{Component, Entity};
use engine_persistence::{EntityPersistence, PersistenceConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use components::{Health, Nameplate, Physics, Weapon, register_all};
use world::World;

#[derive(Parser)]
#[command(name = "engine_app", about = "Persist an entity world to SQLite")]
struct Args {
    /// Database file (overrides the config file and ENGINE_DB_PATH)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// JSON file with persistence settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, simulate and save the world
    Demo {
        /// Seconds of play to simulate
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f32,
    },
    /// Print the stored entities
    List,
    /// Replace the stored world with the one in a level file
    Import {
        /// Level database to copy from
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("engine_app=info".parse()?)
                .add_directive("engine_persistence=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = resolve_config(args.config.as_deref(), args.db)?;
    info!(db = %config.database_path.display(), "using world database");

    let mut engine = EntityPersistence::new(config);
    register_all(&mut engine)?;
    engine.open()?;

    match args.command {
        Command::Demo { seconds } => run_demo(&mut engine, seconds)?,
        Command::List => list(&mut engine)?,
        Command::Import { file } => {
            let report = engine
                .import_world(&file)
                .with_context(|| format!("importing {}", file.display()))?;
            info!(
                entities = report.entities,
                tables = report.tables_copied,
                "level imported"
            );
        }
    }
    Ok(())
}

fn resolve_config(file: Option<&Path>, db: Option<PathBuf>) -> Result<PersistenceConfig> {
    let mut config = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => PersistenceConfig::from_env(),
    };
    if let Some(db) = db {
        config = config.with_database_path(db);
    }
    Ok(config)
}

fn starter_world() -> World {
    let mut world = World::new();
    world.spawn(
        Entity::new()
            .with(Nameplate {
                label: "Player".into(),
                glyph: '@',
            })
            .with(Physics {
                x: 0.0,
                y: 0.0,
                grounded: true,
            })
            .with(Health::full(100))
            .with(Weapon {
                is_shooting: true,
                ..Weapon::default()
            }),
    );
    for (i, glyph) in ['g', 'o', 'k'].into_iter().enumerate() {
        world.spawn(
            Entity::new()
                .with(Nameplate {
                    label: format!("Grunt {}", i + 1),
                    glyph,
                })
                .with(Physics {
                    x: 5.0 * (i as f32 + 1.0),
                    y: 0.0,
                    grounded: true,
                })
                .with(Health::full(30)),
        );
    }
    world
}

fn run_demo(engine: &mut EntityPersistence, seconds: f32) -> Result<()> {
    let mut world = World::new();
    world.load_from(engine)?;
    if world.is_empty() {
        info!("stored world is empty; spawning starter world");
        world = starter_world();
    }

    let steps = (seconds * 10.0).max(1.0) as usize;
    for _ in 0..steps {
        step(&mut world, 0.1);
    }

    // The first grunt that ran out of health is removed for good.
    let fallen = world.entities().position(|e| {
        e.get_as::<Health>().is_some_and(|h| h.current <= 0) && !e.has("Weapon")
    });
    if let Some(index) = fallen
        && let Some(entity) = world.despawn(index, &mut *engine)
    {
        info!(entity = %entity.id(), "entity fell");
    }

    let report = world.save_to(engine)?;
    if report.components_failed > 0 {
        warn!(failed = report.components_failed, "some components were not saved");
    }
    info!(
        entities = world.len(),
        inserted = report.inserted,
        updated = report.updated,
        deleted = report.deleted,
        "demo finished"
    );
    Ok(())
}

/// Advance every entity by `dt` seconds: weapons heat up and each shot
/// costs the nearest grunt some health.
fn step(world: &mut World, dt: f32) {
    let mut shots = 0;
    for entity in world.entities_mut() {
        if let Some(weapon) = entity.get_as::<Weapon>() {
            let mut weapon = weapon.clone();
            if weapon.is_shooting && weapon.is_ready {
                shots += 1;
            }
            weapon.tick(dt);
            if !weapon.is_shooting && weapon.is_ready {
                weapon.is_shooting = true;
            }
            entity.attach(Box::new(weapon));
        }
    }
    for _ in 0..shots {
        let target = world
            .entities_mut()
            .filter(|e| !e.has("Weapon"))
            .find(|e| e.get_as::<Health>().is_some_and(|h| h.current > 0));
        if let Some(entity) = target
            && let Some(health) = entity.get_as::<Health>()
        {
            let hit = Health {
                current: (health.current - 4).max(0),
                max: health.max,
            };
            entity.attach(Box::new(hit));
        }
    }
}

fn list(engine: &mut EntityPersistence) -> Result<()> {
    let mut world = World::new();
    world.load_from(engine)?;
    let entities: Vec<serde_json::Value> = world
        .entities()
        .map(|entity| {
            let components: Vec<serde_json::Value> = entity
                .components()
                .map(|c| {
                    serde_json::json!({
                        "shape": c.shape_name(),
                        "fields": format!("{:?}", c.field_values()),
                    })
                })
                .collect();
            serde_json::json!({ "id": entity.id().id(), "components": components })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entities)?);
    Ok(())
}

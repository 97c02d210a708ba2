//! Harvesting, construction and production driven through world ticks.

use std::cell::RefCell;
use std::rc::Rc;

use rts_sim::components::{ComponentKind, EntityId, Harvester, HarvesterState, Owner};
use rts_sim::events::{EventKind, GameEvent};
use rts_sim::map::TileCoord;
use rts_sim::orders::build_unit;
use rts_sim::protocol::{CommandType, NetCommand};
use rts_sim::tech::{TechDefinition, TechTree, CONSTRUCTION_YARD};
use rts_sim::world::World;
use rts_test_utils::fixtures::{
    credits, dt, fixed, ore_field, run_ticks, spawn_completed_building, spawn_unit_at,
    two_player_world, world_with_tech, FIXTURE_CREDITS,
};

/// Short build times so every count below is exact at 16 ticks per second.
fn quick_tech() -> TechTree {
    let mut tech = TechTree::new();
    tech.insert(
        TechDefinition::building(CONSTRUCTION_YARD, 3000, fixed(1), 1000)
            .with_footprint(3, 3)
            .with_power(15, 0),
    );
    tech.insert(
        TechDefinition::building("power_plant", 300, fixed(1), 400)
            .with_footprint(2, 2)
            .with_power(100, 0)
            .with_prerequisites(&[CONSTRUCTION_YARD]),
    );
    tech.insert(
        TechDefinition::building("barracks", 400, fixed(1), 500)
            .with_footprint(2, 2)
            .with_power(0, 20)
            .with_prerequisites(&["power_plant"])
            .producing_units(),
    );
    tech.insert(
        TechDefinition::unit("rifleman", 100, fixed(2), 50)
            .with_speed(fixed(1))
            .with_prerequisites(&["barracks"]),
    );
    tech
}

fn units_of(world: &World, player: i32) -> usize {
    world
        .query(&[ComponentKind::Movable, ComponentKind::Owner])
        .into_iter()
        .filter(|&id| world.get::<Owner>(id).is_some_and(|o| o.player_id == player))
        .count()
}

fn harvester_state(world: &World, id: EntityId) -> Option<HarvesterState> {
    world.get::<Harvester>(id).map(|h| h.state)
}

#[test]
fn test_harvester_fills_in_half_a_second_and_pays_500() {
    let mut world = two_player_world();
    spawn_completed_building(&mut world, "refinery", 1, 4, 2);
    spawn_completed_building(&mut world, CONSTRUCTION_YARD, 2, 20, 20);
    ore_field(&mut world, TileCoord::new(4, 4), 1, 1, 1000);
    let harvester = spawn_unit_at(&mut world, "harvester", 1, 4, 4);

    let mut harvesting_ticks = 0;
    let mut ticks = 0;
    while credits(&world, 1) == FIXTURE_CREDITS && ticks < 100 {
        run_ticks(&mut world, 1);
        ticks += 1;
        if harvester_state(&world, harvester) == Some(HarvesterState::Harvesting) {
            harvesting_ticks += 1;
        }
    }

    // 8 ticks at dt = 1/16 is half a second
    assert_eq!(harvesting_ticks, 8);
    assert_eq!(credits(&world, 1), FIXTURE_CREDITS + 500);
    assert_eq!(
        world.grid().tile(TileCoord::new(4, 4)).map(|t| t.ore_amount),
        Some(fixed(980))
    );
    assert_eq!(harvester_state(&world, harvester), Some(HarvesterState::Idle));
    assert_eq!(world.get::<Harvester>(harvester).map(|h| h.current), Some(fixed(0)));
}

#[test]
fn test_production_runs_at_half_speed_without_power() {
    let mut powered = world_with_tech(quick_tech());
    let mut unpowered = world_with_tech(quick_tech());

    for world in [&mut powered, &mut unpowered] {
        spawn_completed_building(world, CONSTRUCTION_YARD, 1, 2, 2);
        spawn_completed_building(world, CONSTRUCTION_YARD, 2, 20, 20);
    }
    // the yard alone cannot cover the barracks' draw
    spawn_completed_building(&mut powered, "power_plant", 1, 6, 2);
    let powered_barracks = spawn_completed_building(&mut powered, "barracks", 1, 9, 2);
    let unpowered_barracks = spawn_completed_building(&mut unpowered, "barracks", 1, 9, 2);

    build_unit(&mut powered, 1, powered_barracks, "rifleman").expect("queued");
    build_unit(&mut unpowered, 1, unpowered_barracks, "rifleman").expect("queued");
    run_ticks(&mut powered, 1);
    run_ticks(&mut unpowered, 1);
    assert!(powered.players().has_power(1));
    assert!(!unpowered.players().has_power(1));

    run_ticks(&mut powered, 31);
    run_ticks(&mut unpowered, 31);
    assert_eq!(units_of(&powered, 1), 1);
    assert_eq!(units_of(&unpowered, 1), 0);

    run_ticks(&mut unpowered, 32);
    assert_eq!(units_of(&unpowered, 1), 1);
}

#[test]
fn test_build_order_through_scheduled_commands() {
    let mut world = world_with_tech(quick_tech());
    spawn_completed_building(&mut world, CONSTRUCTION_YARD, 1, 2, 2);
    spawn_completed_building(&mut world, CONSTRUCTION_YARD, 2, 20, 20);

    let created = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&created);
    world
        .events_mut()
        .subscribe(EventKind::UnitCreated, move |event| {
            if let GameEvent::UnitCreated { key, .. } = event {
                sink.borrow_mut().push(key.clone());
            }
        });

    // barracks before its power plant is rejected and costs nothing
    world.schedule(
        NetCommand::new(0, 1, CommandType::PlaceBuilding, 0)
            .with_target(9, 2)
            .with_param("barracks"),
    );
    world.schedule(
        NetCommand::new(0, 1, CommandType::PlaceBuilding, 0)
            .with_target(6, 2)
            .with_param("power_plant"),
    );
    world.schedule(
        NetCommand::new(16, 1, CommandType::PlaceBuilding, 0)
            .with_target(9, 2)
            .with_param("barracks"),
    );
    world.schedule(NetCommand::new(32, 1, CommandType::BuildUnit, 4).with_param("rifleman"));

    run_ticks(&mut world, 16);
    assert!(world.completed_buildings(1).contains("power_plant"));
    assert_eq!(credits(&world, 1), FIXTURE_CREDITS - 300);

    run_ticks(&mut world, 16);
    assert!(world.completed_buildings(1).contains("barracks"));

    run_ticks(&mut world, 31);
    assert!(created.borrow().is_empty());
    run_ticks(&mut world, 1);
    assert_eq!(created.borrow().as_slice(), &["rifleman".to_string()]);
    assert_eq!(credits(&world, 1), FIXTURE_CREDITS - 300 - 400 - 100);
}

#[test]
fn test_selling_refunds_half_and_frees_the_footprint() {
    let mut world = world_with_tech(quick_tech());
    spawn_completed_building(&mut world, CONSTRUCTION_YARD, 1, 2, 2);
    let plant = spawn_completed_building(&mut world, "power_plant", 1, 6, 2);
    spawn_completed_building(&mut world, CONSTRUCTION_YARD, 2, 20, 20);
    assert!(!world.grid().can_place(TileCoord::new(6, 2), 2, 2));

    world.schedule(NetCommand::new(0, 1, CommandType::SellBuilding, plant));
    world.tick(dt());

    assert!(!world.contains(plant));
    assert_eq!(credits(&world, 1), FIXTURE_CREDITS + 150);
    assert!(world.grid().can_place(TileCoord::new(6, 2), 2, 2));
}

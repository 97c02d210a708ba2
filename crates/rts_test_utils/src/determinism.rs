//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep peers only ever exchange commands, so the simulation must be
//! 100% deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`rts_sim::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entities and players live in `BTreeMap`s and iterate by id.
//!
//! - **Wall-clock time**: Only the game loop reads the clock, and only to
//!   decide how many fixed ticks to run.
//!
//! Worlds are compared by their bincode snapshots, byte for byte, rather
//! than by hash alone, so a failure can point at the first differing byte.

use rts_sim::math::Fixed;
use rts_sim::protocol::NetCommand;
use rts_sim::world::World;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Build two worlds with `setup`, feed both the same command stream and
/// tick them in lockstep, asserting identical snapshots after every tick.
///
/// Commands are scheduled up front, so each must name a tick the world has
/// not reached yet.
///
/// # Panics
///
/// Panics at the first tick where the snapshots differ.
pub fn verify_world_determinism<F>(setup: F, commands: &[NetCommand], ticks: u64, dt: Fixed) -> u64
where
    F: Fn() -> World,
{
    let mut a = setup();
    let mut b = setup();
    for command in commands {
        a.schedule(command.clone());
        b.schedule(command.clone());
    }
    assert_worlds_identical(&a, &b);

    for _ in 0..ticks {
        a.tick(dt);
        b.tick(dt);
        a.dispatch_events();
        b.dispatch_events();
        assert_worlds_identical(&a, &b);
    }
    a.state_hash()
}

/// Assert two worlds have byte-identical snapshots.
///
/// # Panics
///
/// Panics with the tick and first differing byte offset when they differ.
pub fn assert_worlds_identical(a: &World, b: &World) {
    let left = a.snapshot().expect("snapshot of left world");
    let right = b.snapshot().expect("snapshot of right world");
    if left == right {
        return;
    }
    let first_diff = left
        .iter()
        .zip(&right)
        .position(|(l, r)| l != r)
        .unwrap_or_else(|| left.len().min(right.len()));
    panic!(
        "Worlds diverged!\n\
         Ticks: {} vs {}\n\
         Snapshot sizes: {} vs {}\n\
         First differing byte: {}",
        a.tick_count(),
        b.tick_count(),
        left.len(),
        right.len(),
        first_diff
    );
}

/// Tick two copies of a world side by side and report the first tick
/// after which their hashes differ.
///
/// `None` if they never diverge.
pub fn find_first_divergence<F>(setup: F, ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> World,
{
    let mut a = setup();
    let mut b = setup();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        a.tick(dt);
        b.tick(dt);

        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Snapshot a world after `ticks`, restore it into a fresh world from
/// `setup`, and check both continue identically for `ticks` more.
pub fn verify_snapshot_continuation<F>(setup: F, ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> World,
{
    let mut original = setup();
    for _ in 0..ticks {
        original.tick(dt);
    }

    let Ok(bytes) = original.snapshot() else {
        return false;
    };
    let mut restored = setup();
    if restored.restore(&bytes).is_err() {
        return false;
    }

    for _ in 0..ticks {
        original.tick(dt);
        restored.tick(dt);
    }
    original.snapshot().ok() == restored.snapshot().ok()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use proptest::prelude::*;
    use rts_sim::map::TileCoord;
    use rts_sim::math::{Fixed, Vec2Fixed};
    use rts_sim::players::PlayerId;
    use rts_sim::protocol::{CommandType, NetCommand};

    /// Fixed-point number in `[-1000, 1000)` with 1/256 resolution.
    pub fn arb_fixed() -> impl Strategy<Value = Fixed> {
        (-256_000i32..256_000i32).prop_map(|raw| Fixed::from_num(raw) / Fixed::from_num(256))
    }

    /// Point inside a map of the given size.
    pub fn arb_map_position(width: i32, height: i32) -> impl Strategy<Value = Vec2Fixed> {
        (0..width * 16, 0..height * 16).prop_map(|(x, y)| {
            Vec2Fixed::new(
                Fixed::from_num(x) / Fixed::from_num(16),
                Fixed::from_num(y) / Fixed::from_num(16),
            )
        })
    }

    /// Tile inside a map of the given size.
    pub fn arb_tile(width: i32, height: i32) -> impl Strategy<Value = TileCoord> {
        (0..width, 0..height).prop_map(|(x, y)| TileCoord::new(x, y))
    }

    /// Any command type, including ones the world will reject.
    pub fn arb_command_type() -> impl Strategy<Value = CommandType> {
        (0u8..=8).prop_map(|raw| CommandType::try_from(raw).unwrap_or(CommandType::Chat))
    }

    /// Command for `tick` from one of `players`, aimed at entity ids below
    /// `max_entity` and tiles inside the map. Payloads are drawn from real
    /// tech keys plus junk.
    pub fn arb_command(
        tick: u64,
        players: Vec<PlayerId>,
        max_entity: u64,
        width: i32,
        height: i32,
    ) -> impl Strategy<Value = NetCommand> {
        let keys = prop_oneof![
            Just("rifleman".to_string()),
            Just("power_plant".to_string()),
            Just("barracks".to_string()),
            Just("refinery".to_string()),
            "[a-z]{0,12}",
        ];
        (
            proptest::sample::select(players),
            arb_command_type(),
            0..max_entity.max(1),
            arb_tile(width, height),
            keys,
        )
            .prop_map(move |(player, command_type, entity, tile, key)| {
                NetCommand::new(tick, player, command_type, entity)
                    .with_target(tile.x, tile.y)
                    .with_param(key)
            })
    }

    /// Commands spread over ticks `1..max_tick`, sorted by tick.
    pub fn arb_command_stream(
        max_len: usize,
        max_tick: u64,
        players: Vec<PlayerId>,
        max_entity: u64,
        width: i32,
        height: i32,
    ) -> impl Strategy<Value = Vec<NetCommand>> {
        proptest::collection::vec(
            (1..max_tick.max(2)).prop_flat_map(move |tick| {
                arb_command(tick, players.clone(), max_entity, width, height)
            }),
            0..max_len,
        )
        .prop_map(|mut commands| {
            commands.sort_by_key(|c| c.tick);
            commands
        })
    }

    /// Health values (1-1000).
    pub fn arb_health() -> impl Strategy<Value = i32> {
        1i32..1000i32
    }

    /// Damage values (1-200).
    pub fn arb_damage() -> impl Strategy<Value = i32> {
        1i32..200i32
    }

    /// Arbitrary bytes for decoder robustness tests.
    pub fn arb_wire_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{dt, spawn_unit_at, two_player_world};
    use proptest::prelude::*;
    use rts_sim::protocol::CommandType;

    fn skirmish() -> World {
        let mut world = two_player_world();
        spawn_unit_at(&mut world, "rifleman", 1, 4, 4);
        spawn_unit_at(&mut world, "rifleman", 1, 5, 4);
        spawn_unit_at(&mut world, "rifleman", 2, 9, 4);
        spawn_unit_at(&mut world, "rocket_soldier", 2, 10, 6);
        world
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_non_determinism_is_reported() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_empty_world_determinism() {
        verify_world_determinism(two_player_world, &[], 50, dt());
    }

    #[test]
    fn test_skirmish_world_determinism() {
        let commands = [
            NetCommand::new(2, 1, CommandType::MoveUnit, 1).with_target(8, 8),
            NetCommand::new(3, 2, CommandType::AttackUnit, 3).with_target_entity(1),
        ];
        verify_world_determinism(skirmish, &commands, 200, dt());
    }

    #[test]
    fn test_no_divergence_in_combat() {
        assert_eq!(find_first_divergence(skirmish, 150, dt()), None);
    }

    #[test]
    fn test_snapshot_restore_continues_identically() {
        assert!(verify_snapshot_continuation(skirmish, 40, dt()));
    }

    #[test]
    #[should_panic(expected = "Worlds diverged")]
    fn test_assert_worlds_identical_catches_difference() {
        let a = skirmish();
        let mut b = skirmish();
        b.tick(dt());
        assert_worlds_identical(&a, &b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_random_commands_stay_deterministic(
            commands in strategies::arb_command_stream(24, 40, vec![1, 2, 3], 8, 32, 32)
        ) {
            verify_world_determinism(skirmish, &commands, 60, dt());
        }
    }
}

//! Component definitions.
//!
//! Components are plain data records. Every kind is a variant of the closed
//! [`Component`] enum and has a matching [`ComponentKind`] tag, so an entity
//! holds at most one instance of each kind and lookups never downcast.
//!
//! Typed access goes through the [`ComponentData`] trait:
//!
//! ```
//! use rts_sim::components::{Health, Position};
//! use rts_sim::math::{Fixed, Vec2Fixed};
//! use rts_sim::world::World;
//!
//! let mut world = World::default();
//! let unit = world.spawn();
//! world.attach(unit, Health::new(100));
//! world.attach(unit, Position::new(Vec2Fixed::ZERO));
//!
//! assert_eq!(world.get::<Health>(unit).map(|h| h.current), Some(100));
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::map::TileCoord;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::players::{PlayerId, TeamId};

/// Unique identifier for entities in the simulation.
pub type EntityId = u64;

/// Damage types for weapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    /// Bullets and shells.
    #[default]
    Kinetic,
    /// Rockets and bombs.
    Explosive,
    /// Lasers and tesla weapons.
    Energy,
    /// Flamethrowers.
    Fire,
    /// Toxin sprayers.
    Chemical,
}

impl DamageType {
    /// Row index into the damage table.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Armor classes for damage reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArmorType {
    /// Unarmored targets.
    #[default]
    None,
    /// Infantry and scouts.
    Light,
    /// Light vehicles.
    Medium,
    /// Tanks.
    Heavy,
    /// Buildings.
    Structure,
}

impl ArmorType {
    /// Column index into the damage table.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Damage multipliers in percent, rows by [`DamageType`], columns by [`ArmorType`].
const DAMAGE_TABLE: [[u8; 5]; 5] = [
    // None, Light, Medium, Heavy, Structure
    [100, 100, 75, 50, 25],  // Kinetic
    [100, 75, 100, 125, 150], // Explosive
    [100, 125, 100, 75, 50], // Energy
    [150, 125, 75, 50, 100], // Fire
    [125, 150, 100, 50, 25], // Chemical
];

/// Look up the damage multiplier for a damage/armor index pair.
///
/// Out-of-range indices yield `1.0`.
#[must_use]
pub fn damage_multiplier(damage_index: usize, armor_index: usize) -> Fixed {
    DAMAGE_TABLE
        .get(damage_index)
        .and_then(|row| row.get(armor_index))
        .map_or(Fixed::ONE, |percent| {
            Fixed::from_num(*percent) / Fixed::from_num(100)
        })
}

/// World position in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Position vector.
    pub value: Vec2Fixed,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(value: Vec2Fixed) -> Self {
        Self { value }
    }

    /// Tile containing this position.
    #[must_use]
    pub fn tile(&self) -> TileCoord {
        TileCoord::containing(self.value)
    }
}

/// Sprite key and facing consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sprite {
    /// Asset key.
    pub key: String,
    /// Eight-way facing, `0` is north.
    pub facing: u8,
}

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points, always in `[0, max]`.
    pub current: i32,
    /// Maximum hit points.
    pub max: i32,
}

impl Health {
    /// Create health at full hit points.
    #[must_use]
    pub const fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Subtract damage, clamping at zero. Returns true if this hit was lethal.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if self.current <= 0 {
            return false;
        }
        self.current = self.current.saturating_sub(amount.max(0)).clamp(0, self.max.max(0));
        self.current == 0
    }

    /// Restore hit points, clamping at max.
    pub fn heal(&mut self, amount: i32) {
        self.current = self.current.saturating_add(amount.max(0)).min(self.max.max(0));
    }

    /// Whether hit points have reached zero.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current <= 0
    }
}

/// Projectile styles a weapon can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Cannon shell.
    Shell,
    /// Guided rocket.
    Rocket,
    /// Lobbed grenade.
    Grenade,
}

impl ProjectileKind {
    /// Sprite key for the in-flight entity.
    #[must_use]
    pub const fn sprite_key(self) -> &'static str {
        match self {
            Self::Shell => "projectile_shell",
            Self::Rocket => "projectile_rocket",
            Self::Grenade => "projectile_grenade",
        }
    }
}

/// Offensive capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Base damage per shot.
    pub damage: i32,
    /// Engagement range in tiles.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Seconds between shots.
    #[serde(with = "fixed_serde")]
    pub cooldown: Fixed,
    /// Seconds until the next shot.
    #[serde(with = "fixed_serde")]
    pub cooldown_now: Fixed,
    /// Damage type.
    pub damage_type: DamageType,
    /// Projectile fired, `None` for hitscan.
    pub projectile: Option<ProjectileKind>,
    /// Splash radius in tiles, zero for single target.
    #[serde(with = "fixed_serde")]
    pub splash: Fixed,
    /// Target ordered by the owning player.
    pub target: Option<EntityId>,
}

impl Weapon {
    /// Create a hitscan weapon.
    #[must_use]
    pub fn new(damage: i32, range: Fixed, cooldown: Fixed, damage_type: DamageType) -> Self {
        Self {
            damage,
            range,
            cooldown,
            cooldown_now: Fixed::ZERO,
            damage_type,
            projectile: None,
            splash: Fixed::ZERO,
            target: None,
        }
    }

    /// Builder: fire projectiles with the given splash radius.
    #[must_use]
    pub fn with_projectile(mut self, kind: ProjectileKind, splash: Fixed) -> Self {
        self.projectile = Some(kind);
        self.splash = splash;
        self
    }
}

/// Damage reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Armor {
    /// Armor class.
    pub armor_type: ArmorType,
    /// Flat reduction applied before the multiplier.
    pub value: i32,
}

/// Ability to follow a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movable {
    /// Speed in tiles per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Waypoints supplied by the pathfinder.
    pub path: Vec<TileCoord>,
    /// Index of the waypoint being approached.
    pub path_index: usize,
    /// Velocity set by steering this tick.
    pub velocity: Vec2Fixed,
    /// Terrain bits this unit may cross.
    pub pass_mask: u8,
}

impl Movable {
    /// Create an idle mover.
    #[must_use]
    pub fn new(speed: Fixed, pass_mask: u8) -> Self {
        Self {
            speed,
            path: Vec::new(),
            path_index: 0,
            velocity: Vec2Fixed::ZERO,
            pass_mask,
        }
    }

    /// Replace the current path.
    pub fn set_path(&mut self, path: Vec<TileCoord>) {
        self.path = path;
        self.path_index = 0;
    }

    /// Drop the path and stop.
    pub fn stop(&mut self) {
        self.path.clear();
        self.path_index = 0;
        self.velocity = Vec2Fixed::ZERO;
    }

    /// Whether every waypoint has been reached.
    #[must_use]
    pub fn path_finished(&self) -> bool {
        self.path_index >= self.path.len()
    }
}

/// Marker for entities a player can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selectable;

/// Ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Owning player.
    pub player_id: PlayerId,
    /// Alliance group.
    pub team_id: TeamId,
}

/// Unit production queue on a building.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Production {
    /// Unit keys, head first.
    pub queue: VecDeque<String>,
    /// Progress of the head item in `[0, 1)`.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Where finished units appear.
    pub rally: Option<TileCoord>,
}

/// Structure footprint and power figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Power produced.
    pub power_gen: i32,
    /// Power consumed.
    pub power_draw: i32,
    /// Footprint width in tiles.
    pub width: u8,
    /// Footprint height in tiles.
    pub height: u8,
    /// Footprint origin (top-left).
    pub tile: TileCoord,
}

impl Building {
    /// Every tile covered by the footprint, row-major.
    pub fn footprint(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let origin = self.tile;
        (0..i32::from(self.height)).flat_map(move |dy| {
            (0..i32::from(self.width)).map(move |dx| TileCoord::new(origin.x + dx, origin.y + dy))
        })
    }

    /// Tile just below the footprint, where units appear by default.
    #[must_use]
    pub fn exit_tile(&self) -> TileCoord {
        TileCoord::new(self.tile.x, self.tile.y + i32::from(self.height))
    }
}

/// Tech tree key of a structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildingName {
    /// Tech key, e.g. `"refinery"`.
    pub key: String,
}

/// Construction state of a placed structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingConstruction {
    /// Progress in `[0, 1]`.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Seconds to build at full power.
    #[serde(with = "fixed_serde")]
    pub build_time: Fixed,
    /// Set once, never cleared.
    pub complete: bool,
}

impl BuildingConstruction {
    /// Fresh construction site.
    #[must_use]
    pub const fn new(build_time: Fixed) -> Self {
        Self {
            progress: Fixed::ZERO,
            build_time,
            complete: false,
        }
    }

    /// Already finished structure.
    #[must_use]
    pub const fn completed(build_time: Fixed) -> Self {
        Self {
            progress: Fixed::ONE,
            build_time,
            complete: true,
        }
    }
}

/// Marker for the mobile construction vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mcv;

/// Harvester behaviour states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HarvesterState {
    /// Looking for ore.
    #[default]
    Idle,
    /// Travelling to an ore tile.
    MovingToOre,
    /// Extracting ore.
    Harvesting,
    /// Travelling back to a building.
    Returning,
    /// Handing cargo over.
    Unloading,
}

/// Kinds of harvestable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Common ore.
    #[default]
    Ore,
    /// Rare gems.
    Gems,
}

impl ResourceKind {
    /// Credits per unit of cargo.
    #[must_use]
    pub const fn value_per_unit(self) -> i64 {
        match self {
            Self::Ore => 25,
            Self::Gems => 50,
        }
    }
}

/// Resource gatherer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvester {
    /// FSM state.
    pub state: HarvesterState,
    /// Maximum cargo.
    #[serde(with = "fixed_serde")]
    pub capacity: Fixed,
    /// Extraction rate; a tick extracts `rate * dt * 20`.
    #[serde(with = "fixed_serde")]
    pub rate: Fixed,
    /// Cargo carried, in `[0, capacity]`.
    #[serde(with = "fixed_serde")]
    pub current: Fixed,
    /// Kind of the cargo carried.
    pub cargo: ResourceKind,
    /// Ore tile being worked or approached.
    pub target: Option<TileCoord>,
}

impl Harvester {
    /// Empty, idle harvester.
    #[must_use]
    pub const fn new(capacity: Fixed, rate: Fixed) -> Self {
        Self {
            state: HarvesterState::Idle,
            capacity,
            rate,
            current: Fixed::ZERO,
            cargo: ResourceKind::Ore,
            target: None,
        }
    }
}

/// In-flight projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Firing entity.
    pub source: EntityId,
    /// Intended target.
    pub target: EntityId,
    /// Last known target position.
    pub target_pos: Vec2Fixed,
    /// Tiles per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Base damage.
    pub damage: i32,
    /// Splash radius.
    #[serde(with = "fixed_serde")]
    pub splash: Fixed,
    /// Damage type.
    pub damage_type: DamageType,
}

/// Sight radius in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FogVision {
    /// Radius in whole tiles.
    pub radius: i32,
}

/// Sprite animation cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    /// Current frame.
    pub frame: u16,
    /// Frames in the clip.
    pub frame_count: u16,
    /// Seconds per frame.
    #[serde(with = "fixed_serde")]
    pub frame_time: Fixed,
    /// Time spent on the current frame.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
    /// Wrap to frame 0 after the last frame instead of holding.
    pub looping: bool,
}

impl Animation {
    /// Start a clip at frame 0.
    #[must_use]
    pub const fn new(frame_count: u16, frame_time: Fixed, looping: bool) -> Self {
        Self {
            frame: 0,
            frame_count,
            frame_time,
            elapsed: Fixed::ZERO,
            looping,
        }
    }
}

/// Typed view of one [`Component`] variant.
pub trait ComponentData: Sized {
    /// Tag of this component kind.
    const KIND: ComponentKind;

    /// Borrow the payload if `component` is this kind.
    fn from_component(component: &Component) -> Option<&Self>;

    /// Mutably borrow the payload if `component` is this kind.
    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
}

macro_rules! component_set {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        /// Closed set of component records.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum Component {
            $($(#[$meta])* $name($name),)*
        }

        /// Type tag of a [`Component`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum ComponentKind {
            $($(#[$meta])* $name,)*
        }

        impl Component {
            /// Tag of this component.
            #[must_use]
            pub const fn kind(&self) -> ComponentKind {
                match self {
                    $(Self::$name(_) => ComponentKind::$name,)*
                }
            }
        }

        impl ComponentKind {
            /// Human readable name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }
        }

        $(
            impl ComponentData for $name {
                const KIND: ComponentKind = ComponentKind::$name;

                fn from_component(component: &Component) -> Option<&Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        _ => None,
                    }
                }

                fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        _ => None,
                    }
                }
            }

            impl From<$name> for Component {
                fn from(value: $name) -> Self {
                    Self::$name(value)
                }
            }
        )*
    };
}

component_set! {
    /// World position.
    Position,
    /// Render key and facing.
    Sprite,
    /// Hit points.
    Health,
    /// Offensive capability.
    Weapon,
    /// Damage reduction.
    Armor,
    /// Path following.
    Movable,
    /// Selectable marker.
    Selectable,
    /// Ownership.
    Owner,
    /// Unit production queue.
    Production,
    /// Structure footprint and power.
    Building,
    /// Structure tech key.
    BuildingName,
    /// Construction progress.
    BuildingConstruction,
    /// Mobile construction vehicle marker.
    Mcv,
    /// Resource gatherer.
    Harvester,
    /// In-flight projectile.
    Projectile,
    /// Sight radius.
    FogVision,
    /// Animation cursor.
    Animation,
}

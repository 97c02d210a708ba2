//! Tech tree: unit and building definitions keyed by tech key.
//!
//! Definitions are read-only during a match. They can be loaded from RON:
//!
//! ```ron
//! [
//!     (
//!         key: "rifleman",
//!         kind: Unit,
//!         cost: 100,
//!         build_time: 5.0,
//!         hit_points: 50,
//!         speed: 1.5,
//!         damage: 10,
//!         range: 4.0,
//!         cooldown: 1.0,
//!         armor_type: Light,
//!         vision: 5,
//!         prerequisites: ["barracks"],
//!     ),
//! ]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{ArmorType, DamageType, ProjectileKind};
use crate::error::{GameError, Result};
use crate::map::PASS_GROUND;
use crate::math::{fixed_decimal, Fixed};

/// Whether a definition produces a unit or a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TechKind {
    /// Mobile unit.
    #[default]
    Unit,
    /// Structure.
    Building,
}

/// One unit or building definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechDefinition {
    /// Tech key, also the sprite key.
    pub key: String,
    /// Unit or building.
    pub kind: TechKind,
    /// Price in credits.
    pub cost: i64,
    /// Seconds to produce or construct at full power.
    #[serde(with = "fixed_decimal")]
    pub build_time: Fixed,
    /// Maximum hit points.
    pub hit_points: i32,
    /// Tiles per second, units only.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Weapon damage, zero for unarmed.
    pub damage: i32,
    /// Weapon range in tiles.
    #[serde(with = "fixed_decimal")]
    pub range: Fixed,
    /// Seconds between shots.
    #[serde(with = "fixed_decimal")]
    pub cooldown: Fixed,
    /// Weapon damage type.
    pub damage_type: DamageType,
    /// Projectile fired, `None` for hitscan.
    pub projectile: Option<ProjectileKind>,
    /// Splash radius in tiles.
    #[serde(with = "fixed_decimal")]
    pub splash: Fixed,
    /// Armor class.
    pub armor_type: ArmorType,
    /// Flat armor reduction.
    pub armor_value: i32,
    /// Sight radius in tiles.
    pub vision: i32,
    /// Keys of buildings that must be owned and complete.
    pub prerequisites: Vec<String>,
    /// Faction tag.
    pub faction: String,
    /// Terrain pass mask, units only.
    pub pass_mask: u8,
    /// Power produced, buildings only.
    pub power_gen: i32,
    /// Power consumed, buildings only.
    pub power_draw: i32,
    /// Footprint width, buildings only.
    pub width: u8,
    /// Footprint height, buildings only.
    pub height: u8,
    /// Whether the building has a production queue.
    pub produces_units: bool,
    /// Cargo capacity, harvesters only.
    #[serde(with = "fixed_decimal")]
    pub harvest_capacity: Fixed,
    /// Extraction rate, harvesters only.
    #[serde(with = "fixed_decimal")]
    pub harvest_rate: Fixed,
    /// Deploys into a construction yard.
    pub mcv: bool,
}

impl Default for TechDefinition {
    fn default() -> Self {
        Self {
            key: String::new(),
            kind: TechKind::Unit,
            cost: 0,
            build_time: Fixed::ONE,
            hit_points: 1,
            speed: Fixed::ZERO,
            damage: 0,
            range: Fixed::ZERO,
            cooldown: Fixed::ONE,
            damage_type: DamageType::Kinetic,
            projectile: None,
            splash: Fixed::ZERO,
            armor_type: ArmorType::None,
            armor_value: 0,
            vision: 0,
            prerequisites: Vec::new(),
            faction: String::new(),
            pass_mask: PASS_GROUND,
            power_gen: 0,
            power_draw: 0,
            width: 1,
            height: 1,
            produces_units: false,
            harvest_capacity: Fixed::ZERO,
            harvest_rate: Fixed::ZERO,
            mcv: false,
        }
    }
}

impl TechDefinition {
    /// Unit definition with stats left at defaults.
    #[must_use]
    pub fn unit(key: impl Into<String>, cost: i64, build_time: Fixed, hit_points: i32) -> Self {
        Self {
            key: key.into(),
            kind: TechKind::Unit,
            cost,
            build_time,
            hit_points,
            ..Self::default()
        }
    }

    /// Building definition with stats left at defaults.
    #[must_use]
    pub fn building(key: impl Into<String>, cost: i64, build_time: Fixed, hit_points: i32) -> Self {
        Self {
            key: key.into(),
            kind: TechKind::Building,
            cost,
            build_time,
            hit_points,
            armor_type: ArmorType::Structure,
            ..Self::default()
        }
    }

    /// Builder: movement speed.
    #[must_use]
    pub fn with_speed(mut self, speed: Fixed) -> Self {
        self.speed = speed;
        self
    }

    /// Builder: hitscan weapon.
    #[must_use]
    pub fn with_weapon(
        mut self,
        damage: i32,
        range: Fixed,
        cooldown: Fixed,
        damage_type: DamageType,
    ) -> Self {
        self.damage = damage;
        self.range = range;
        self.cooldown = cooldown;
        self.damage_type = damage_type;
        self
    }

    /// Builder: weapon fires projectiles.
    #[must_use]
    pub fn with_projectile(mut self, kind: ProjectileKind, splash: Fixed) -> Self {
        self.projectile = Some(kind);
        self.splash = splash;
        self
    }

    /// Builder: armor.
    #[must_use]
    pub fn with_armor(mut self, armor_type: ArmorType, value: i32) -> Self {
        self.armor_type = armor_type;
        self.armor_value = value;
        self
    }

    /// Builder: sight radius.
    #[must_use]
    pub fn with_vision(mut self, vision: i32) -> Self {
        self.vision = vision;
        self
    }

    /// Builder: prerequisite building keys.
    #[must_use]
    pub fn with_prerequisites(mut self, keys: &[&str]) -> Self {
        self.prerequisites = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Builder: power figures.
    #[must_use]
    pub fn with_power(mut self, power_gen: i32, power_draw: i32) -> Self {
        self.power_gen = power_gen;
        self.power_draw = power_draw;
        self
    }

    /// Builder: footprint size.
    #[must_use]
    pub fn with_footprint(mut self, width: u8, height: u8) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Builder: give the building a production queue.
    #[must_use]
    pub fn producing_units(mut self) -> Self {
        self.produces_units = true;
        self
    }

    /// Builder: harvester cargo.
    #[must_use]
    pub fn with_harvester(mut self, capacity: Fixed, rate: Fixed) -> Self {
        self.harvest_capacity = capacity;
        self.harvest_rate = rate;
        self
    }

    /// Builder: mark as a mobile construction vehicle.
    #[must_use]
    pub fn as_mcv(mut self) -> Self {
        self.mcv = true;
        self
    }

    /// Whether the definition carries a weapon.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.damage > 0 && self.range > Fixed::ZERO
    }

    /// Whether the definition is a harvester.
    #[must_use]
    pub fn is_harvester(&self) -> bool {
        self.harvest_capacity > Fixed::ZERO
    }
}

/// Key of the building every base grows from.
pub const CONSTRUCTION_YARD: &str = "construction_yard";

/// Key of the building that grants a free harvester on completion.
pub const REFINERY: &str = "refinery";

/// Key of the harvester unit.
pub const HARVESTER: &str = "harvester";

/// Read-only mapping from tech key to definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechTree {
    definitions: BTreeMap<String, TechDefinition>,
}

impl TechTree {
    /// Empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: TechDefinition) {
        self.definitions.insert(definition.key.clone(), definition);
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TechDefinition> {
        self.definitions.get(key)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in key order.
    pub fn iter(&self) -> impl Iterator<Item = &TechDefinition> {
        self.definitions.values()
    }

    /// First prerequisite of `key` not in `completed`, if any.
    ///
    /// Unknown keys report themselves as missing.
    #[must_use]
    pub fn missing_prerequisite<'a>(
        &'a self,
        key: &'a str,
        completed: &BTreeSet<String>,
    ) -> Option<&'a str> {
        match self.definitions.get(key) {
            Some(def) => def
                .prerequisites
                .iter()
                .find(|p| !completed.contains(p.as_str()))
                .map(String::as_str),
            None => Some(key),
        }
    }

    /// Parse a RON list of definitions.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Self::parse(text, "<inline>")
    }

    /// Load a RON list of definitions from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let tree = Self::parse(&text, &path.display().to_string())?;
        tracing::info!(path = %path.display(), definitions = tree.len(), "Loaded tech tree");
        Ok(tree)
    }

    fn parse(text: &str, origin: &str) -> Result<Self> {
        let definitions: Vec<TechDefinition> =
            ron::from_str(text).map_err(|e| GameError::DataParseError {
                path: origin.to_string(),
                message: e.to_string(),
            })?;

        let mut tree = Self::new();
        for def in definitions {
            if def.key.is_empty() {
                return Err(GameError::DataParseError {
                    path: origin.to_string(),
                    message: "definition with empty key".to_string(),
                });
            }
            if def.build_time <= Fixed::ZERO {
                return Err(GameError::DataParseError {
                    path: origin.to_string(),
                    message: format!("'{}' has a non-positive build_time", def.key),
                });
            }
            tree.insert(def);
        }
        Ok(tree)
    }

    /// Built-in skirmish data set.
    #[must_use]
    pub fn standard() -> Self {
        let n = Fixed::from_num::<i32>;
        let half = |v: i32| Fixed::from_num(v) / Fixed::from_num(2);

        let mut tree = Self::new();
        tree.insert(
            TechDefinition::building(CONSTRUCTION_YARD, 3000, n(30), 1500)
                .with_footprint(3, 3)
                .with_power(15, 0)
                .with_vision(6),
        );
        tree.insert(
            TechDefinition::building("power_plant", 300, n(8), 400)
                .with_footprint(2, 2)
                .with_power(100, 0)
                .with_prerequisites(&[CONSTRUCTION_YARD])
                .with_vision(4),
        );
        tree.insert(
            TechDefinition::building("barracks", 300, n(10), 500)
                .with_footprint(2, 2)
                .with_power(0, 20)
                .with_prerequisites(&["power_plant"])
                .producing_units()
                .with_vision(4),
        );
        tree.insert(
            TechDefinition::building(REFINERY, 2000, n(20), 900)
                .with_footprint(3, 2)
                .with_power(0, 30)
                .with_prerequisites(&["power_plant"])
                .with_vision(4),
        );
        tree.insert(
            TechDefinition::building("war_factory", 2000, n(25), 1000)
                .with_footprint(3, 3)
                .with_power(0, 40)
                .with_prerequisites(&[REFINERY])
                .producing_units()
                .with_vision(4),
        );
        tree.insert(
            TechDefinition::unit("rifleman", 100, n(5), 50)
                .with_speed(half(3))
                .with_weapon(15, n(4), n(1), DamageType::Kinetic)
                .with_armor(ArmorType::Light, 0)
                .with_prerequisites(&["barracks"])
                .with_vision(5),
        );
        tree.insert(
            TechDefinition::unit("rocket_soldier", 300, n(8), 45)
                .with_speed(n(1))
                .with_weapon(50, n(6), n(2), DamageType::Explosive)
                .with_projectile(ProjectileKind::Rocket, Fixed::ZERO)
                .with_armor(ArmorType::Light, 0)
                .with_prerequisites(&["barracks"])
                .with_vision(6),
        );
        tree.insert(
            TechDefinition::unit("light_tank", 700, n(12), 300)
                .with_speed(n(2))
                .with_weapon(40, n(5), half(3), DamageType::Kinetic)
                .with_projectile(ProjectileKind::Shell, half(1))
                .with_armor(ArmorType::Heavy, 5)
                .with_prerequisites(&["war_factory"])
                .with_vision(6),
        );
        tree.insert(
            TechDefinition::unit(HARVESTER, 1400, n(15), 600)
                .with_speed(n(1))
                .with_armor(ArmorType::Heavy, 5)
                .with_harvester(n(20), n(2))
                .with_prerequisites(&["war_factory"])
                .with_vision(3),
        );
        tree.insert(
            TechDefinition::unit("mcv", 3000, n(30), 1000)
                .with_speed(n(1))
                .with_armor(ArmorType::Heavy, 5)
                .with_prerequisites(&["war_factory"])
                .as_mcv()
                .with_vision(4),
        );
        tree
    }
}

//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Positions and distances are measured in tiles, time in seconds.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for human-authored fixed-point values in data files.
///
/// Tech definitions are written by designers in RON, so they are read as
/// decimal numbers and converted once at load time.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as a decimal number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize from a decimal number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Step from `self` toward `target` by at most `max_step`, never past it.
    #[must_use]
    pub fn move_towards(self, target: Self, max_step: Fixed) -> Self {
        let dist = self.distance(target);
        if dist <= max_step || dist == Fixed::ZERO {
            return target;
        }
        self + (target - self).normalize().scale(max_step)
    }

    /// Eight-way facing for a direction, `0` pointing north and increasing
    /// clockwise. Returns `None` for the zero vector.
    #[must_use]
    pub fn facing(self) -> Option<u8> {
        if self == Self::ZERO {
            return None;
        }

        let ax = self.x.abs();
        let ay = self.y.abs();
        let two = Fixed::from_num(2);
        let five = Fixed::from_num(5);

        // |minor| / |major| < 0.4 counts as a cardinal direction
        let horizontal = ay * five < ax * two;
        let vertical = ax * five < ay * two;
        let east = self.x > Fixed::ZERO;
        let south = self.y > Fixed::ZERO;

        let facing = if horizontal {
            if east {
                2
            } else {
                6
            }
        } else if vertical {
            if south {
                4
            } else {
                0
            }
        } else {
            match (east, south) {
                (true, false) => 1,
                (true, true) => 3,
                (false, true) => 5,
                (false, false) => 7,
            }
        };
        Some(facing)
    }
}

/// Square root of a fixed-point number.
///
/// Works on the raw bits with an integer Newton iteration, so perfect squares
/// such as `2.25` come back exact and the result is identical everywhere.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    // sqrt(bits / 2^32) * 2^32 == isqrt(bits * 2^32)
    let scaled = (value.to_bits() as u128) << 32;
    let root = isqrt(scaled);
    Fixed::from_bits(i64::try_from(root).unwrap_or(i64::MAX))
}

fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }

    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = v(3.0, 0.0);
        let b = v(0.0, 4.0);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
        assert_eq!(a.distance(b), Fixed::from_num(5));
    }

    #[test]
    fn test_sqrt_exact_on_squares() {
        assert_eq!(fixed_sqrt(Fixed::from_num(2.25)), Fixed::from_num(1.5));
        assert_eq!(fixed_sqrt(Fixed::from_num(0.0625)), Fixed::from_num(0.25));
        assert_eq!(fixed_sqrt(Fixed::from_num(10_000)), Fixed::from_num(100));
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_sqrt_floor_on_non_squares() {
        // compare in 64.64 bits, fixed multiplication would truncate
        let root = u128::try_from(fixed_sqrt(Fixed::from_num(2)).to_bits()).expect("positive");
        let two = 2u128 << 64;
        assert!(root * root <= two);
        assert!((root + 1) * (root + 1) > two);
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = v(3.0, 4.0).normalize();
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10_000);
        assert!((norm.x - Fixed::from_num(0.6)).abs() < epsilon);
        assert!((norm.y - Fixed::from_num(0.8)).abs() < epsilon);
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_move_towards_never_overshoots() {
        let start = v(0.0, 0.0);
        let target = v(1.0, 0.0);
        assert_eq!(start.move_towards(target, Fixed::from_num(0.25)), v(0.25, 0.0));
        assert_eq!(start.move_towards(target, Fixed::from_num(5)), target);
    }

    #[test]
    fn test_facing_octants() {
        assert_eq!(v(0.0, -1.0).facing(), Some(0));
        assert_eq!(v(1.0, -1.0).facing(), Some(1));
        assert_eq!(v(1.0, 0.1).facing(), Some(2));
        assert_eq!(v(1.0, 1.0).facing(), Some(3));
        assert_eq!(v(0.0, 2.0).facing(), Some(4));
        assert_eq!(v(-1.0, 1.0).facing(), Some(5));
        assert_eq!(v(-3.0, 0.0).facing(), Some(6));
        assert_eq!(v(-1.0, -1.0).facing(), Some(7));
        assert_eq!(Vec2Fixed::ZERO.facing(), None);
    }
}

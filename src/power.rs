use crate::config::{validate_variance, ConfigError};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of power axes per cell
pub const AXES: usize = 3;

/// Upper bound of a single axis (lower bound is 1)
pub const MAX_POWER: u8 = 9;

/// Value of every axis in a perfectly balanced cell
pub const BASELINE_POWER: u8 = 5;

/// Sum of all axes for every legal cell
pub const CONSERVED_TOTAL: u16 = AXES as u16 * BASELINE_POWER as u16;

/// Fixed-size power profile of a cell.
///
/// `PowerVector` is `Copy`, so handing one to another cell always copies the
/// components; two grid positions can never share storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PowerVector([u8; AXES]);

impl PowerVector {
    /// All axes at the baseline
    pub const BALANCED: Self = Self([BASELINE_POWER; AXES]);

    /// Wrap raw components. No bounds checking happens here, use
    /// [`PowerVector::is_valid`] when legality matters.
    pub const fn new(components: [u8; AXES]) -> Self {
        Self(components)
    }

    pub fn components(&self) -> [u8; AXES] {
        self.0
    }

    pub fn axis(&self, index: usize) -> u8 {
        self.0[index]
    }

    pub fn total(&self) -> u16 {
        self.0.iter().map(|&v| u16::from(v)).sum()
    }

    /// Every axis lies within `1..=MAX_POWER`
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|v| (1..=MAX_POWER).contains(v))
    }

    /// Axes sum to the conserved total
    pub fn is_conserved(&self) -> bool {
        self.total() == CONSERVED_TOTAL
    }

    /// Move one unit of power from axis `down` to axis `up`.
    ///
    /// Returns `None` when any component of the candidate would leave
    /// `1..=MAX_POWER`; the receiver is never modified.
    pub fn transfer(&self, up: usize, down: usize) -> Option<Self> {
        let mut candidate = self.0.map(i16::from);
        candidate[up] += 1;
        candidate[down] -= 1;

        let in_bounds = candidate
            .iter()
            .all(|&v| (1..=i16::from(MAX_POWER)).contains(&v));
        if !in_bounds {
            return None;
        }

        // All components are within 1..=9 here, so the narrowing is lossless
        Some(Self(candidate.map(|v| v as u8)))
    }

    /// Count the axes where `self` is strictly stronger and strictly weaker
    /// than `other`. Equal axes count for neither side.
    pub fn advantages(&self, other: &PowerVector) -> (u8, u8) {
        let mut ours = 0;
        let mut theirs = 0;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            if a > b {
                ours += 1;
            }
            if a < b {
                theirs += 1;
            }
        }
        (ours, theirs)
    }

    /// Build a randomized starting profile.
    ///
    /// Every axis starts at `BASELINE_POWER - variance`; the missing
    /// `3 * variance` units are then handed out one at a time to uniformly
    /// chosen axes that are still below `MAX_POWER`. Fails unless
    /// `variance < BASELINE_POWER`.
    pub fn random<R: Rng + ?Sized>(variance: u8, rng: &mut R) -> Result<Self, ConfigError> {
        validate_variance(variance)?;

        let start = BASELINE_POWER - variance;
        let mut power = [start; AXES];
        let mut remaining = AXES * variance as usize;

        while remaining > 0 {
            let index = rng.gen_range(0..AXES);
            if power[index] < MAX_POWER {
                power[index] += 1;
                remaining -= 1;
            }
        }

        Ok(Self(power))
    }

    /// Every legal profile (axes in `1..=MAX_POWER`, conserved total), in
    /// lexicographic order
    pub fn balanced_profiles() -> Vec<Self> {
        let mut profiles = Vec::new();
        for a in 1..=MAX_POWER {
            for b in 1..=MAX_POWER {
                for c in 1..=MAX_POWER {
                    let candidate = Self([a, b, c]);
                    if candidate.is_conserved() {
                        profiles.push(candidate);
                    }
                }
            }
        }
        profiles
    }

    /// Display color: each axis maps linearly onto one RGB channel
    pub fn to_rgb(&self) -> [u8; 3] {
        self.0
            .map(|v| (u16::from(v) * 255 / u16::from(MAX_POWER)) as u8)
    }
}

impl Default for PowerVector {
    fn default() -> Self {
        Self::BALANCED
    }
}

impl From<[u8; AXES]> for PowerVector {
    fn from(components: [u8; AXES]) -> Self {
        Self(components)
    }
}

impl std::fmt::Display for PowerVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.0[0], self.0[1], self.0[2])
    }
}

/// A single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub power: PowerVector,
}

impl Cell {
    pub fn new(power: PowerVector) -> Self {
        Self { power }
    }

    /// Cell with a randomized profile, see [`PowerVector::random`]
    pub fn random<R: Rng + ?Sized>(variance: u8, rng: &mut R) -> Result<Self, ConfigError> {
        PowerVector::random(variance, rng).map(Self::new)
    }
}

impl From<[u8; AXES]> for Cell {
    fn from(components: [u8; AXES]) -> Self {
        Self::new(PowerVector::new(components))
    }
}

//! Shared types used across tierscale crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three worker capacity classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Guaranteed capacity. Read but never resized by the calculator.
    Base,
    /// On-demand burst capacity.
    Fast,
    /// Preemptible, cheap capacity.
    Spot,
}

impl Tier {
    /// All tiers in the order changes are applied.
    pub const ALL: [Tier; 3] = [Tier::Base, Tier::Fast, Tier::Spot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Base => "base",
            Tier::Fast => "fast",
            Tier::Spot => "spot",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker counts for each tier.
///
/// Used by value everywhere: a `TierCounts` handed to another component is
/// a copy, so history kept by the hysteresis buffer can never be aliased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierCounts {
    #[serde(default)]
    pub base: u32,
    #[serde(default)]
    pub fast: u32,
    #[serde(default)]
    pub spot: u32,
}

impl TierCounts {
    pub const ZERO: TierCounts = TierCounts::new(0, 0, 0);

    pub const fn new(base: u32, fast: u32, spot: u32) -> Self {
        Self { base, fast, spot }
    }

    /// Count for a single tier.
    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Base => self.base,
            Tier::Fast => self.fast,
            Tier::Spot => self.spot,
        }
    }

    /// Returns a copy with `tier` set to `count`.
    pub fn with(mut self, tier: Tier, count: u32) -> Self {
        self.set(tier, count);
        self
    }

    pub fn set(&mut self, tier: Tier, count: u32) {
        match tier {
            Tier::Base => self.base = count,
            Tier::Fast => self.fast = count,
            Tier::Spot => self.spot = count,
        }
    }

    /// Total workers across all tiers.
    pub fn total(&self) -> u64 {
        self.base as u64 + self.fast as u64 + self.spot as u64
    }
}

impl fmt::Display for TierCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "base={} fast={} spot={}", self.base, self.fast, self.spot)
    }
}

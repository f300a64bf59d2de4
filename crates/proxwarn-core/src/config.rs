//! Immutable category and tier records plus engine settings.
//!
//! The engine never mutates these. Loading and validation live outside the
//! core; here the only contract is that each category's tiers are sorted by
//! ascending range.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHANNEL_COUNT, DEFAULT_CLUSTER_THRESHOLD, DEFAULT_INITIAL_COOLDOWN_FACTOR,
    DEFAULT_REFRESH_INTERVAL_MS,
};

/// Index of a category inside its [`CategorySet`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CategoryId(pub usize);

/// Identifier of an audio cue (clip) the audio collaborator knows how to play.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CueId(pub Arc<str>);

impl CueId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One control point of an attenuation curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub distance: f64,
    pub gain: f64,
}

/// Distance → gain curve handed to the audio collaborator as custom rolloff.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttenuationCurve {
    pub points: Vec<CurvePoint>,
}

impl AttenuationCurve {
    pub fn new(points: Vec<CurvePoint>) -> Self {
        Self { points }
    }

    /// `(min_distance, max_distance)` taken from the first and last control
    /// points. None for an empty curve.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some((first.distance, last.distance))
    }
}

/// A severity tier: active while the obstacle is closer than `range`.
#[derive(Clone, Debug, PartialEq)]
pub struct TierConfig {
    pub range: f64,
    pub cue: CueId,
    /// Seconds between repeats of the cue.
    pub cue_frequency: f64,
    /// Lower is more severe.
    pub priority: i32,
    pub rolloff: AttenuationCurve,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryConfig {
    pub name: String,
    /// Bit `n` set means objects on layer `n` belong to this category.
    pub layer_mask: u32,
    /// Sorted by ascending `range`.
    pub tiers: Vec<TierConfig>,
}

impl CategoryConfig {
    pub fn contains_layer(&self, layer: u8) -> bool {
        layer < 32 && self.layer_mask & (1u32 << layer) != 0
    }
}

/// All categories known to the engine, addressed by [`CategoryId`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategorySet {
    categories: Vec<CategoryConfig>,
}

impl CategorySet {
    pub fn new(categories: Vec<CategoryConfig>) -> Self {
        Self { categories }
    }

    /// First category whose mask contains `layer`, in declaration order.
    pub fn resolve_layer(&self, layer: u8) -> Option<CategoryId> {
        self.categories
            .iter()
            .position(|c| c.contains_layer(layer))
            .map(CategoryId)
    }

    pub fn by_name(&self, name: &str) -> Option<CategoryId> {
        self.categories
            .iter()
            .position(|c| c.name == name)
            .map(CategoryId)
    }

    pub fn get(&self, id: CategoryId) -> Option<&CategoryConfig> {
        self.categories.get(id.0)
    }

    /// Tier list of a category; empty for an unknown id.
    pub fn tiers(&self, id: CategoryId) -> &[TierConfig] {
        self.get(id).map(|c| c.tiers.as_slice()).unwrap_or(&[])
    }

    pub fn tier(&self, id: CategoryId, index: usize) -> Option<&TierConfig> {
        self.tiers(id).get(index)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &CategoryConfig)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(i, c)| (CategoryId(i), c))
    }
}

/// Tunables of the engine and its refresh loop.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub channels: usize,
    pub refresh_interval: Duration,
    pub cluster_threshold: f64,
    /// Also measure from the floor-projected position and keep the nearer result.
    pub use_floor_projection: bool,
    pub initial_cooldown_factor: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNEL_COUNT,
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            use_floor_projection: true,
            initial_cooldown_factor: DEFAULT_INITIAL_COOLDOWN_FACTOR,
        }
    }
}

//! Spatial clustering of same-category obstacles into warning units.
//!
//! Clusters are rebuilt from scratch every refresh cycle but keep their
//! identity: a new cluster inherits the cooldown (and, if still playing, the
//! channel) of the previous cluster whose main obstacle it contains. Slots
//! are pooled in an arena so a steady scene allocates nothing per cycle.

use crate::channel::ChannelId;
use crate::config::{CategoryId, CategorySet};
use crate::geometry::ResolvedObstacle;
use crate::registry::ObstacleId;
use crate::tier::classify;
use crate::vector::Vec3;

#[derive(Clone, Debug, Default)]
pub struct WarningCluster {
    /// Nearest member; its closest point represents the cluster.
    pub main: ObstacleId,
    pub children: Vec<ObstacleId>,
    pub point: Vec3,
    pub distance: f64,
    pub category: CategoryId,
    /// Index into the category's tier list. None = no warning.
    pub tier: Option<usize>,
    pub priority: Option<i32>,
    /// Seconds until the cue may play again.
    pub cooldown: f64,
    pub channel: Option<ChannelId>,
}

impl WarningCluster {
    fn reset(&mut self, main: &ResolvedObstacle) {
        self.main = main.id;
        self.children.clear();
        self.point = main.closest_point;
        self.distance = main.distance;
        self.category = main.category;
        self.tier = None;
        self.priority = None;
        self.cooldown = 0.0;
        self.channel = None;
    }

    fn clear(&mut self) {
        self.children.clear();
        self.tier = None;
        self.priority = None;
        self.channel = None;
    }

    pub fn contains(&self, id: ObstacleId) -> bool {
        self.main == id || self.children.contains(&id)
    }

    /// Main obstacle followed by the children.
    pub fn members(&self) -> impl Iterator<Item = ObstacleId> + '_ {
        std::iter::once(self.main).chain(self.children.iter().copied())
    }
}

/// Parameters of one clustering pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterParams {
    pub threshold: f64,
    pub initial_cooldown_factor: f64,
}

/// Counts from one [`ClusterArena::rebuild`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub clusters: usize,
    /// New clusters matched to a previous one.
    pub continued: usize,
    /// Playing channels carried over.
    pub carried_channels: usize,
}

/// Slot arena holding the current clusters in priority order.
#[derive(Clone, Debug, Default)]
pub struct ClusterArena {
    slots: Vec<WarningCluster>,
    free: Vec<usize>,
    active: Vec<usize>,
}

impl ClusterArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live clusters.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Slots ever allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live clusters, most severe first.
    pub fn iter(&self) -> impl Iterator<Item = &WarningCluster> {
        self.active.iter().map(|&i| &self.slots[i])
    }

    /// Live clusters in slot order, not priority order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WarningCluster> {
        let active = &self.active;
        self.slots
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| active.contains(i))
            .map(|(_, c)| c)
    }

    /// The cluster at position `rank` in priority order.
    pub fn ranked_mut(&mut self, rank: usize) -> Option<&mut WarningCluster> {
        let idx = *self.active.get(rank)?;
        self.slots.get_mut(idx)
    }

    /// The cluster containing `id`, if any.
    pub fn find(&self, id: ObstacleId) -> Option<&WarningCluster> {
        self.iter().find(|c| c.contains(id))
    }

    fn acquire(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(WarningCluster::default());
                self.slots.len() - 1
            }
        }
    }

    /// Replace the live clusters with a fresh clustering of `resolved`.
    ///
    /// `resolved` must be sorted ascending by distance. `is_playing` reports
    /// whether a channel is mid-cue; only those are carried over.
    pub fn rebuild(
        &mut self,
        resolved: &[ResolvedObstacle],
        categories: &CategorySet,
        params: ClusterParams,
        is_playing: impl Fn(ChannelId) -> bool,
    ) -> RebuildStats {
        let previous = std::mem::take(&mut self.active);
        let mut stats = RebuildStats::default();
        let mut taken = vec![false; resolved.len()];

        for i in 0..resolved.len() {
            if taken[i] {
                continue;
            }
            taken[i] = true;
            let main = &resolved[i];

            let slot = self.acquire();
            let mut children = std::mem::take(&mut self.slots[slot].children);
            children.clear();

            for (j, candidate) in resolved.iter().enumerate().skip(i + 1) {
                if taken[j] || candidate.category != main.category {
                    continue;
                }
                // Sorted by distance: nothing further out can be close enough.
                if candidate.distance - main.distance > params.threshold {
                    break;
                }
                if candidate.closest_point.distance(main.closest_point) < params.threshold {
                    taken[j] = true;
                    children.push(candidate.id);
                }
            }

            let tiers = categories.tiers(main.category);
            let tier = classify(tiers, main.distance);

            let matched = previous.iter().map(|&old| &self.slots[old]).find(|old| {
                old.main == main.id || children.contains(&old.main)
            });
            let (cooldown, channel) = match matched {
                Some(old) => {
                    stats.continued += 1;
                    let already_held =
                        |ch| self.active.iter().any(|&a| self.slots[a].channel == Some(ch));
                    let channel = old
                        .channel
                        .filter(|&ch| tier.is_some() && is_playing(ch) && !already_held(ch));
                    (old.cooldown, channel)
                }
                None => {
                    let cooldown = tier
                        .map(|t| tiers[t].cue_frequency * params.initial_cooldown_factor)
                        .unwrap_or(0.0);
                    (cooldown, None)
                }
            };
            if channel.is_some() {
                stats.carried_channels += 1;
            }

            let cluster = &mut self.slots[slot];
            cluster.reset(main);
            cluster.children = children;
            cluster.tier = tier;
            cluster.priority = tier.map(|t| tiers[t].priority);
            cluster.cooldown = cooldown;
            cluster.channel = channel;
            self.active.push(slot);

            tracing::trace!(
                main = %main.id,
                children = cluster.children.len(),
                distance = main.distance,
                tier = ?tier,
                "clustered"
            );
        }

        for old in previous {
            self.slots[old].clear();
            self.free.push(old);
        }

        // Most severe first, untiered last; stable among equals.
        let slots = &self.slots;
        self.active.sort_by_key(|&i| {
            let priority = slots[i].priority;
            (priority.is_none(), priority.unwrap_or(0))
        });

        stats.clusters = self.active.len();
        stats
    }

    /// Detach `channel` from whichever live cluster holds it.
    pub fn detach_channel(&mut self, channel: ChannelId) {
        for &i in &self.active {
            if self.slots[i].channel == Some(channel) {
                self.slots[i].channel = None;
            }
        }
    }

    /// Return every live cluster to the pool.
    pub fn clear(&mut self) {
        for i in std::mem::take(&mut self.active) {
            self.slots[i].clear();
            self.free.push(i);
        }
    }
}

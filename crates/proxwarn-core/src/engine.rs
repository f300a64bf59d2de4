//! The synchronous warning engine: one refresh step and one frame step over
//! owned state. Scheduling the two cadences is the runtime's job.

use std::sync::Arc;

use serde::Serialize;

use crate::allocator::{Allocation, allocate};
use crate::channel::{AudioChannel, ChannelId, ChannelPool};
use crate::cluster::{ClusterArena, ClusterParams, RebuildStats, WarningCluster};
use crate::config::{CategoryId, CategorySet, EngineSettings};
use crate::geometry::{Geometry, resolve};
use crate::playback::drive;
use crate::registry::{ObstacleId, TrackedObstacle};
use crate::vector::Vec3;

/// Summary of one refresh cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Obstacles whose object disappeared; the caller should untrack them.
    pub stale: Vec<ObstacleId>,
    pub rebuild: RebuildStats,
    pub allocation: Allocation,
}

/// Read-only copy of a cluster for observers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterView {
    pub main: ObstacleId,
    pub children: Vec<ObstacleId>,
    pub category: CategoryId,
    pub tier: Option<usize>,
    pub priority: Option<i32>,
    pub distance: f64,
    pub point: Vec3,
    pub cooldown: f64,
    pub channel: Option<ChannelId>,
}

impl From<&WarningCluster> for ClusterView {
    fn from(c: &WarningCluster) -> Self {
        Self {
            main: c.main,
            children: c.children.clone(),
            category: c.category,
            tier: c.tier,
            priority: c.priority,
            distance: c.distance,
            point: c.point,
            cooldown: c.cooldown,
            channel: c.channel,
        }
    }
}

pub struct WarningEngine<G, C> {
    categories: Arc<CategorySet>,
    settings: EngineSettings,
    geometry: G,
    pool: ChannelPool<C>,
    clusters: ClusterArena,
    position: Vec3,
}

impl<G: Geometry, C: AudioChannel> WarningEngine<G, C> {
    /// The pool size is `channels.len()`; `settings.channels` is only a hint
    /// for whoever builds the channels.
    pub fn new(
        categories: Arc<CategorySet>,
        settings: EngineSettings,
        geometry: G,
        channels: Vec<C>,
    ) -> Self {
        Self {
            categories,
            settings,
            geometry,
            pool: ChannelPool::new(channels),
            clusters: ClusterArena::new(),
            position: Vec3::ZERO,
        }
    }

    pub fn categories(&self) -> &Arc<CategorySet> {
        &self.categories
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn geometry_mut(&mut self) -> &mut G {
        &mut self.geometry
    }

    pub fn channels(&self) -> &ChannelPool<C> {
        &self.pool
    }

    pub fn channels_mut(&mut self) -> &mut ChannelPool<C> {
        &mut self.pool
    }

    pub fn clusters(&self) -> &ClusterArena {
        &self.clusters
    }

    /// Snapshot of the live clusters, most severe first.
    pub fn cluster_views(&self) -> Vec<ClusterView> {
        self.clusters.iter().map(ClusterView::from).collect()
    }

    /// User reference (head) position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Resolve, classify, cluster and allocate over a snapshot of the
    /// tracked obstacles.
    pub fn refresh(&mut self, snapshot: &[TrackedObstacle]) -> RefreshReport {
        let floor = if self.settings.use_floor_projection {
            self.geometry.floor_projection(self.position)
        } else {
            None
        };
        let resolution = resolve(&self.geometry, snapshot, self.position, floor);
        self.purge_stale(&resolution.stale);

        let params = ClusterParams {
            threshold: self.settings.cluster_threshold,
            initial_cooldown_factor: self.settings.initial_cooldown_factor,
        };
        let pool = &self.pool;
        let rebuild = self.clusters.rebuild(
            &resolution.resolved,
            &self.categories,
            params,
            |ch| pool.is_playing(ch),
        );
        let allocation = allocate(&mut self.clusters, &mut self.pool);

        tracing::debug!(
            obstacles = resolution.resolved.len(),
            stale = resolution.stale.len(),
            clusters = rebuild.clusters,
            carried = rebuild.carried_channels,
            assigned = allocation.assigned,
            unserved = allocation.unserved,
            "refresh"
        );

        RefreshReport {
            stale: resolution.stale,
            rebuild,
            allocation,
        }
    }

    /// Advance channels by `dt` seconds and start any due cues.
    pub fn tick(&mut self, dt: f64) -> usize {
        self.pool.advance(dt);
        drive(&mut self.clusters, &mut self.pool, &self.categories, dt)
    }

    /// Stop every channel and drop all clusters.
    pub fn release(&mut self) {
        self.pool.stop_all();
        self.clusters.clear();
    }

    /// Silence channels of clusters whose main obstacle vanished.
    fn purge_stale(&mut self, stale: &[ObstacleId]) {
        if stale.is_empty() {
            return;
        }
        let orphaned: Vec<ChannelId> = self
            .clusters
            .iter()
            .filter(|c| stale.contains(&c.main))
            .filter_map(|c| c.channel)
            .collect();
        for channel in orphaned {
            if let Some(ch) = self.pool.get_mut(channel) {
                ch.stop();
            }
            self.clusters.detach_channel(channel);
        }
        tracing::warn!(count = stale.len(), "purged stale obstacles");
    }
}

//! Proximity-warning engine for wearable navigation aids.
//!
//! Turns a changing set of nearby obstacles into a handful of audible,
//! spatialised warnings: same-category obstacles are merged into clusters,
//! each cluster gets a severity tier from its distance, and a fixed pool of
//! audio channels is shared out by severity without ever cutting off a cue
//! that is already playing.
//!
//! The decision logic ([`WarningEngine`]) is synchronous and owns no I/O.
//! [`Radar`] wraps it with sensor entry points, a cancellable refresh loop
//! and the per-frame tick.

pub mod allocator;
pub mod channel;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod engine;
pub mod geometry;
pub mod playback;
pub mod radar;
pub mod registry;
pub mod scene;
pub mod tier;
pub mod vector;

pub use allocator::{Allocation, allocate};
pub use channel::{AudioChannel, ChannelId, ChannelPool, PlayEvent, SimulatedChannel};
pub use cluster::{ClusterArena, ClusterParams, RebuildStats, WarningCluster};
pub use config::{
    AttenuationCurve, CategoryConfig, CategoryId, CategorySet, CueId, CurvePoint, EngineSettings,
    TierConfig,
};
pub use constants::{
    DEFAULT_CHANNEL_COUNT, DEFAULT_CLUSTER_THRESHOLD, DEFAULT_INITIAL_COOLDOWN_FACTOR,
    DEFAULT_REFRESH_INTERVAL_MS,
};
pub use engine::{ClusterView, RefreshReport, WarningEngine};
pub use geometry::{Geometry, Resolution, ResolvedObstacle, resolve};
pub use playback::drive;
pub use radar::{Radar, RefreshHandle};
pub use registry::{ObstacleId, ObstacleRegistry, TrackedObstacle};
pub use scene::{Shape, StaticScene};
pub use tier::classify;
pub use vector::Vec3;

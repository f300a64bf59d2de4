//! Async runtime around [`WarningEngine`]: sensor entry points, the periodic
//! refresh loop and the per-frame tick.
//!
//! The engine sits behind one async mutex, so a refresh cycle and a frame
//! tick never interleave. The registry has its own lock: sensor events only
//! contend with the brief snapshot copy at the start of each cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::channel::AudioChannel;
use crate::config::{CategoryId, CategorySet};
use crate::engine::{ClusterView, RefreshReport, WarningEngine};
use crate::geometry::Geometry;
use crate::registry::{ObstacleId, ObstacleRegistry};
use crate::vector::Vec3;

/// Shortest refresh period the loop will run at.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Returned by [`Radar::start`]; pass it to [`Radar::stop`].
///
/// Dropping the handle cancels the loop without releasing the channels.
pub struct RefreshHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl RefreshHandle {
    /// Token that stops the loop at its next tick boundary when cancelled.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

pub struct Radar<G, C> {
    engine: Arc<Mutex<WarningEngine<G, C>>>,
    registry: Arc<Mutex<ObstacleRegistry>>,
    categories: Arc<CategorySet>,
    interval: Duration,
}

impl<G, C> Clone for Radar<G, C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            registry: Arc::clone(&self.registry),
            categories: Arc::clone(&self.categories),
            interval: self.interval,
        }
    }
}

impl<G, C> Radar<G, C>
where
    G: Geometry + Send + 'static,
    C: AudioChannel + Send + 'static,
{
    pub fn new(engine: WarningEngine<G, C>) -> Self {
        let categories = Arc::clone(engine.categories());
        let mut interval = engine.settings().refresh_interval;
        if interval < MIN_REFRESH_INTERVAL {
            tracing::warn!(?interval, min = ?MIN_REFRESH_INTERVAL, "refresh interval too short");
            interval = MIN_REFRESH_INTERVAL;
        }
        Self {
            engine: Arc::new(Mutex::new(engine)),
            registry: Arc::new(Mutex::new(ObstacleRegistry::new())),
            categories,
            interval,
        }
    }

    /// Sensor-enter event. Objects on layers no category claims are ignored.
    pub async fn obstacle_entered(&self, id: ObstacleId, layer: u8) -> Option<CategoryId> {
        let Some(category) = self.categories.resolve_layer(layer) else {
            tracing::trace!(%id, layer, "ignoring object on unclaimed layer");
            return None;
        };
        if self.registry.lock().await.insert(id, category) {
            tracing::debug!(%id, category = category.0, "obstacle entered");
        }
        Some(category)
    }

    /// Sensor-exit event. Returns false if the obstacle was not tracked.
    pub async fn obstacle_exited(&self, id: ObstacleId) -> bool {
        let removed = self.registry.lock().await.remove(id);
        if removed {
            tracing::debug!(%id, "obstacle exited");
        }
        removed
    }

    pub async fn tracked(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// One frame: update the user position and run the playback driver.
    pub async fn frame(&self, dt: f64, position: Vec3) -> usize {
        let mut engine = self.engine.lock().await;
        engine.set_position(position);
        engine.tick(dt)
    }

    /// Run one refresh cycle immediately, outside the loop's cadence.
    pub async fn refresh_now(&self) -> RefreshReport {
        let snapshot = self.registry.lock().await.snapshot();
        let report = self.engine.lock().await.refresh(&snapshot);
        if !report.stale.is_empty() {
            self.registry.lock().await.purge(&report.stale);
        }
        report
    }

    pub async fn clusters(&self) -> Vec<ClusterView> {
        self.engine.lock().await.cluster_views()
    }

    /// Run `f` with exclusive access to the engine.
    pub async fn with_engine<R>(&self, f: impl FnOnce(&mut WarningEngine<G, C>) -> R) -> R {
        let mut engine = self.engine.lock().await;
        f(&mut engine)
    }

    /// Launch the refresh loop. The first cycle runs immediately.
    pub fn start(&self) -> RefreshHandle {
        let token = CancellationToken::new();
        let radar = self.clone();
        let task = tokio::spawn(radar.run(token.clone()));
        tracing::info!(interval = ?self.interval, "refresh loop started");
        RefreshHandle {
            _guard: token.clone().drop_guard(),
            token,
            task,
        }
    }

    /// Cancel the loop, wait for it to finish, then silence every channel.
    pub async fn stop(&self, handle: RefreshHandle) {
        let RefreshHandle { token, task, _guard } = handle;
        token.cancel();
        if let Err(e) = task.await {
            tracing::warn!("refresh loop ended abnormally: {e}");
        }
        self.engine.lock().await.release();
        tracing::info!("refresh loop stopped");
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Cancellation is only observed here, between whole cycles.
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.refresh_now().await;
                }
            }
        }
    }
}

//! JSON scenario files for `proxwarn simulate`.

use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use proxwarn_core::{ObstacleId, Shape, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Scatter radius beyond which obstacles would never be in sensor range anyway.
const MAX_SCATTER_RADIUS: f64 = 10_000.0;

fn default_frame_ms() -> u64 {
    20
}

fn default_clip_s() -> f64 {
    0.3
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Simulated seconds to run.
    pub duration_s: f64,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    /// Length of every cue clip on the simulated channels.
    #[serde(default = "default_clip_s")]
    pub clip_s: f64,
    pub floor_height: Option<f64>,
    #[serde(default)]
    pub path: Vec<Waypoint>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
    pub scatter: Option<Scatter>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Waypoint {
    pub t: f64,
    pub at: Vec3,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObstacleSpec {
    pub id: u64,
    pub layer: u8,
    pub shape: Shape,
    #[serde(default)]
    pub enter_at: f64,
    /// Sensor-exit event time.
    pub exit_at: Option<f64>,
    /// Time the object is destroyed without an exit event.
    pub vanish_at: Option<f64>,
}

/// Random point obstacles around the origin.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scatter {
    pub count: usize,
    pub radius: f64,
    pub seed: u64,
    pub layer: u8,
    #[serde(default)]
    pub enter_at: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Enter { layer: u8 },
    Exit,
    Vanish,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedEvent {
    pub at: f64,
    pub id: ObstacleId,
    pub action: Action,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        scenario.check()?;
        Ok(scenario)
    }

    fn check(&self) -> Result<()> {
        ensure!(
            self.duration_s.is_finite() && self.duration_s > 0.0,
            "duration_s must be positive"
        );
        ensure!(self.frame_ms > 0, "frame_ms must be at least 1");
        ensure!(
            self.clip_s.is_finite() && self.clip_s >= 0.0,
            "clip_s must be non-negative"
        );
        if self.path.windows(2).any(|w| w[1].t < w[0].t) {
            bail!("path waypoints must be in time order");
        }
        if let Some(scatter) = &self.scatter {
            ensure!(
                (0.0..=MAX_SCATTER_RADIUS).contains(&scatter.radius),
                "scatter.radius must be between 0 and {MAX_SCATTER_RADIUS}"
            );
        }
        let mut ids: Vec<u64> = self.obstacles.iter().map(|o| o.id).collect();
        ids.sort_unstable();
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            bail!("obstacle id {} appears twice", w[0]);
        }
        Ok(())
    }

    /// Every obstacle in the world, scattered ones included.
    pub fn world(&self) -> Vec<ObstacleSpec> {
        let mut world: Vec<ObstacleSpec> = self
            .obstacles
            .iter()
            .map(|o| ObstacleSpec {
                id: o.id,
                layer: o.layer,
                shape: o.shape,
                enter_at: o.enter_at,
                exit_at: o.exit_at,
                vanish_at: o.vanish_at,
            })
            .collect();

        if let Some(scatter) = &self.scatter {
            let first = self.obstacles.iter().map(|o| o.id + 1).max().unwrap_or(0);
            let mut rng = SmallRng::seed_from_u64(scatter.seed);
            for i in 0..scatter.count as u64 {
                let r = scatter.radius;
                let at = Vec3::new(
                    rng.random_range(-r..=r),
                    rng.random_range(0.0..=2.0),
                    rng.random_range(-r..=r),
                );
                world.push(ObstacleSpec {
                    id: first + i,
                    layer: scatter.layer,
                    shape: Shape::Point(at),
                    enter_at: scatter.enter_at,
                    exit_at: None,
                    vanish_at: None,
                });
            }
        }
        world
    }

    /// Sensor and scene events in time order.
    pub fn timeline(world: &[ObstacleSpec]) -> Vec<TimedEvent> {
        let mut events = Vec::new();
        for o in world {
            let id = ObstacleId(o.id);
            events.push(TimedEvent {
                at: o.enter_at,
                id,
                action: Action::Enter { layer: o.layer },
            });
            if let Some(at) = o.exit_at {
                events.push(TimedEvent {
                    at,
                    id,
                    action: Action::Exit,
                });
            }
            if let Some(at) = o.vanish_at {
                events.push(TimedEvent {
                    at,
                    id,
                    action: Action::Vanish,
                });
            }
        }
        events.sort_by(|a, b| a.at.total_cmp(&b.at));
        events
    }

    /// User position at `t`, linear between waypoints and clamped at the ends.
    pub fn position_at(&self, t: f64) -> Vec3 {
        let Some(first) = self.path.first() else {
            return Vec3::ZERO;
        };
        if t <= first.t {
            return first.at;
        }
        for w in self.path.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= 0.0 {
                    return b.at;
                }
                return a.at.lerp(b.at, (t - a.t) / span);
            }
        }
        self.path.last().map_or(first.at, |w| w.at)
    }
}

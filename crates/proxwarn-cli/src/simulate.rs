//! Runs a scenario through the real refresh loop and frame tick.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use proxwarn_config::LoadedConfig;
use proxwarn_core::{
    ChannelId, ObstacleId, Radar, SimulatedChannel, StaticScene, Vec3, WarningEngine,
};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};

use crate::scenario::{Action, Scenario};

/// One cue heard during the simulation.
#[derive(Debug, Serialize)]
pub struct CueRecord {
    pub t: f64,
    pub channel: usize,
    pub cue: String,
    pub position: Vec3,
    pub min_distance: f64,
    pub max_distance: f64,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub cues: Vec<CueRecord>,
    pub frames: u64,
    /// Obstacles still tracked when the run ended.
    pub tracked: usize,
}

type SimRadar = Radar<StaticScene, SimulatedChannel>;

pub async fn run(config: LoadedConfig, scenario: &Scenario, realtime: bool) -> Result<Summary> {
    if !realtime {
        tokio::time::pause();
    }

    let world = scenario.world();
    let mut scene = match scenario.floor_height {
        Some(height) => StaticScene::with_floor(height),
        None => StaticScene::new(),
    };
    for o in &world {
        scene.insert(ObstacleId(o.id), o.shape);
    }

    let channels = (0..config.settings.channels)
        .map(|_| SimulatedChannel::new(scenario.clip_s))
        .collect();
    let engine = WarningEngine::new(
        Arc::new(config.categories),
        config.settings,
        scene,
        channels,
    );
    let radar = Radar::new(engine);
    let events = Scenario::timeline(&world);
    tracing::info!(
        obstacles = world.len(),
        events = events.len(),
        "starting simulation"
    );

    let handle = radar.start();
    let mut summary = Summary::default();
    let mut pending = events.into_iter().peekable();
    let mut ticker = tokio::time::interval(Duration::from_millis(scenario.frame_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let start = Instant::now();
    let mut last = start;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if realtime => {
                tracing::info!("interrupted");
                break;
            }
            now = ticker.tick() => {
                let t = now.duration_since(start).as_secs_f64();
                if t > scenario.duration_s {
                    break;
                }
                while let Some(event) = pending.next_if(|e| e.at <= t) {
                    apply(&radar, event.id, event.action).await;
                }
                let dt = now.duration_since(last).as_secs_f64();
                last = now;
                radar.frame(dt, scenario.position_at(t)).await;
                summary.frames += 1;
                collect(&radar, t, &mut summary.cues).await;
            }
        }
    }

    radar.stop(handle).await;
    summary.tracked = radar.tracked().await;
    Ok(summary)
}

async fn apply(radar: &SimRadar, id: ObstacleId, action: Action) {
    match action {
        Action::Enter { layer } => {
            if radar.obstacle_entered(id, layer).await.is_none() {
                tracing::warn!(%id, layer, "no category claims this layer");
            }
        }
        Action::Exit => {
            radar.obstacle_exited(id).await;
        }
        Action::Vanish => {
            radar
                .with_engine(|engine| engine.geometry_mut().remove(id))
                .await;
        }
    }
}

async fn collect(radar: &SimRadar, t: f64, out: &mut Vec<CueRecord>) {
    radar
        .with_engine(|engine| {
            let pool = engine.channels_mut();
            for index in 0..pool.len() {
                let Some(channel) = pool.get_mut(ChannelId(index)) else {
                    continue;
                };
                for event in channel.take_events() {
                    out.push(CueRecord {
                        t,
                        channel: index,
                        cue: event.cue.to_string(),
                        position: event.position,
                        min_distance: event.min_distance,
                        max_distance: event.max_distance,
                    });
                }
            }
        })
        .await;
}

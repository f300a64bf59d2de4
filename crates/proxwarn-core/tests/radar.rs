//! Refresh loop lifecycle under tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use proxwarn_core::{
    AttenuationCurve, AudioChannel, CategoryConfig, CategorySet, CueId, EngineSettings,
    ObstacleId, Radar, Shape, SimulatedChannel, StaticScene, TierConfig, Vec3, WarningEngine,
};

const WALL_LAYER: u8 = 3;

fn radar(scene: StaticScene) -> Radar<StaticScene, SimulatedChannel> {
    radar_every(scene, Duration::from_millis(500))
}

fn radar_every(scene: StaticScene, interval: Duration) -> Radar<StaticScene, SimulatedChannel> {
    let categories = CategorySet::new(vec![CategoryConfig {
        name: "wall".into(),
        layer_mask: 1 << WALL_LAYER,
        tiers: vec![TierConfig {
            range: 3.0,
            cue: CueId::new("wall"),
            cue_frequency: 1.0,
            priority: 1,
            rolloff: AttenuationCurve::default(),
        }],
    }]);
    let settings = EngineSettings {
        channels: 2,
        refresh_interval: interval,
        initial_cooldown_factor: 0.0,
        ..EngineSettings::default()
    };
    let channels = (0..2).map(|_| SimulatedChannel::new(0.4)).collect();
    Radar::new(WarningEngine::new(
        Arc::new(categories),
        settings,
        scene,
        channels,
    ))
}

fn scene_with(ids: &[(u64, f64)]) -> StaticScene {
    let mut scene = StaticScene::new();
    for &(id, x) in ids {
        scene.insert(ObstacleId(id), Shape::Point(Vec3::new(x, 0.0, 0.0)));
    }
    scene
}

#[tokio::test(start_paused = true)]
async fn first_cycle_runs_immediately() {
    let radar = radar(scene_with(&[(1, 1.0)]));
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;

    let handle = radar.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let clusters = radar.clusters().await;
    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].channel.is_some());
    radar.stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn exit_event_takes_effect_next_cycle() {
    let radar = radar(scene_with(&[(1, 1.0), (2, -2.5)]));
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;
    radar.obstacle_entered(ObstacleId(2), WALL_LAYER).await;

    let handle = radar.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(radar.clusters().await.len(), 2);

    assert!(radar.obstacle_exited(ObstacleId(2)).await);
    // Still the old picture until the loop comes round again.
    assert_eq!(radar.clusters().await.len(), 2);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(radar.clusters().await.len(), 1);

    radar.stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn unclaimed_layer_is_ignored() {
    let radar = radar(scene_with(&[(1, 1.0)]));
    assert!(radar.obstacle_entered(ObstacleId(1), 0).await.is_none());
    assert_eq!(radar.tracked().await, 0);
    assert!(!radar.obstacle_exited(ObstacleId(1)).await);
}

#[tokio::test(start_paused = true)]
async fn vanished_object_leaves_registry() {
    let radar = radar(scene_with(&[(1, 1.0)]));
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;
    // Entered the sensor but is already gone from the scene.
    radar.obstacle_entered(ObstacleId(9), WALL_LAYER).await;
    assert_eq!(radar.tracked().await, 2);

    let report = radar.refresh_now().await;
    assert_eq!(report.stale, vec![ObstacleId(9)]);
    assert_eq!(radar.tracked().await, 1);
}

#[tokio::test(start_paused = true)]
async fn frames_play_cues_between_refreshes() {
    let radar = radar(scene_with(&[(1, 1.0)]));
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;
    let handle = radar.start();
    tokio::time::sleep(Duration::from_millis(1)).await;

    let mut started = 0;
    for _ in 0..150 {
        started += radar.frame(1.0 / 60.0, Vec3::ZERO).await;
        tokio::time::sleep(Duration::from_millis(16)).await;
    }
    // 2.5s of frames at one cue per second.
    assert!((2..=3).contains(&started), "started {started} cues");

    radar.stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_loop_and_releases_channels() {
    let radar = radar(scene_with(&[(1, 1.0)]));
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;
    let handle = radar.start();
    let token = handle.token().clone();
    tokio::time::sleep(Duration::from_millis(10)).await;
    radar.frame(0.02, Vec3::ZERO).await;

    radar.stop(handle).await;
    assert!(token.is_cancelled());
    assert!(radar.clusters().await.is_empty());
    let silent = radar
        .with_engine(|e| e.channels().iter().all(|(_, c)| !c.is_playing()))
        .await;
    assert!(silent);

    // No further cycles once stopped.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(radar.clusters().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_interval_still_refreshes() {
    let radar = radar_every(scene_with(&[(1, 1.0)]), Duration::ZERO);
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;
    let handle = radar.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(radar.clusters().await.len(), 1);

    // The loop is alive and keeps picking up changes.
    radar.obstacle_exited(ObstacleId(1)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(radar.clusters().await.is_empty());
    assert!(!handle.token().is_cancelled());

    radar.stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_cancels_loop() {
    let radar = radar(scene_with(&[(1, 1.0), (2, -2.5)]));
    radar.obstacle_entered(ObstacleId(1), WALL_LAYER).await;
    let handle = radar.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(radar.clusters().await.len(), 1);

    let token = handle.token().clone();
    drop(handle);
    assert!(token.is_cancelled());

    // Nothing rebuilds the clusters any more.
    radar.obstacle_entered(ObstacleId(2), WALL_LAYER).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(radar.clusters().await.len(), 1);
}

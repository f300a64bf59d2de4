use crate::channel::{AudioChannel, ChannelPool};
use crate::cluster::ClusterArena;
use crate::config::CategorySet;

/// Per-frame cue scheduling. Returns how many cues were started.
///
/// A cluster's cue (re)starts only when its cooldown has dropped below zero
/// *and* its channel is idle; either alone is not enough. Clusters without a
/// channel or tier are left untouched.
pub fn drive<C: AudioChannel>(
    clusters: &mut ClusterArena,
    pool: &mut ChannelPool<C>,
    categories: &CategorySet,
    dt: f64,
) -> usize {
    let mut started = 0;

    for cluster in clusters.iter_mut() {
        let (Some(channel_id), Some(tier_idx)) = (cluster.channel, cluster.tier) else {
            continue;
        };
        let Some(tier) = categories.tier(cluster.category, tier_idx) else {
            continue;
        };

        cluster.cooldown -= dt;
        if cluster.cooldown >= 0.0 {
            continue;
        }
        let Some(channel) = pool.get_mut(channel_id) else {
            continue;
        };
        if channel.is_playing() {
            continue;
        }

        cluster.cooldown = tier.cue_frequency;
        let (min_distance, max_distance) = tier.rolloff.bounds().unwrap_or((0.0, tier.range));
        channel.set_clip(&tier.cue);
        channel.set_position(cluster.point);
        channel.set_rolloff(min_distance, max_distance, &tier.rolloff);
        channel.play();
        started += 1;

        tracing::debug!(
            main = %cluster.main,
            channel = channel_id.0,
            cue = %tier.cue,
            distance = cluster.distance,
            "cue started"
        );
    }

    started
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelId, SimulatedChannel};
    use crate::cluster::ClusterParams;
    use crate::config::{
        AttenuationCurve, CategoryConfig, CategoryId, CueId, CurvePoint, TierConfig,
    };
    use crate::geometry::ResolvedObstacle;
    use crate::registry::ObstacleId;
    use crate::vector::Vec3;
    use approx::assert_relative_eq;

    fn categories() -> CategorySet {
        CategorySet::new(vec![CategoryConfig {
            name: "wall".into(),
            layer_mask: 1,
            tiers: vec![TierConfig {
                range: 3.0,
                cue: CueId::new("wall_near"),
                cue_frequency: 2.0,
                priority: 1,
                rolloff: AttenuationCurve::new(vec![
                    CurvePoint {
                        distance: 0.5,
                        gain: 1.0,
                    },
                    CurvePoint {
                        distance: 4.0,
                        gain: 0.0,
                    },
                ]),
            }],
        }])
    }

    fn setup() -> (ClusterArena, ChannelPool<SimulatedChannel>, CategorySet) {
        let cats = categories();
        let mut arena = ClusterArena::new();
        let mut pool = ChannelPool::new(vec![SimulatedChannel::new(0.5)]);
        let obstacle = ResolvedObstacle {
            id: ObstacleId(1),
            category: CategoryId(0),
            closest_point: Vec3::new(1.0, 0.0, 0.0),
            distance: 1.0,
        };
        let params = ClusterParams {
            threshold: 1.5,
            initial_cooldown_factor: 0.0,
        };
        arena.rebuild(&[obstacle], &cats, params, |_| false);
        crate::allocator::allocate(&mut arena, &mut pool);
        (arena, pool, cats)
    }

    fn frame(
        arena: &mut ClusterArena,
        pool: &mut ChannelPool<SimulatedChannel>,
        cats: &CategorySet,
        dt: f64,
    ) -> usize {
        pool.advance(dt);
        drive(arena, pool, cats, dt)
    }

    #[test]
    fn test_first_cue_configures_channel() {
        let (mut arena, mut pool, cats) = setup();
        assert_eq!(frame(&mut arena, &mut pool, &cats, 0.016), 1);

        let ch = pool.get(ChannelId(0)).unwrap();
        let event = &ch.events()[0];
        assert_eq!(event.cue.as_str(), "wall_near");
        assert_eq!(event.position, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(event.min_distance, 0.5);
        assert_relative_eq!(event.max_distance, 4.0);
        assert_relative_eq!(arena.iter().next().unwrap().cooldown, 2.0);
    }

    #[test]
    fn test_cooldown_gates_replay_even_when_idle() {
        let (mut arena, mut pool, cats) = setup();
        frame(&mut arena, &mut pool, &cats, 0.1);
        // Clip (0.5s) ends long before the 2s cooldown.
        let mut started = 0;
        for _ in 0..19 {
            started += frame(&mut arena, &mut pool, &cats, 0.1);
        }
        assert_eq!(started, 0);
        assert!(!pool.is_playing(ChannelId(0)));

        // Cooldown crosses below zero on the next couple of frames.
        started += frame(&mut arena, &mut pool, &cats, 0.1);
        started += frame(&mut arena, &mut pool, &cats, 0.1);
        assert_eq!(started, 1);
    }

    #[test]
    fn test_interrupted_clip_still_waits_for_cooldown() {
        let (mut arena, mut pool, cats) = setup();
        frame(&mut arena, &mut pool, &cats, 0.1);
        pool.get_mut(ChannelId(0)).unwrap().interrupt();
        assert_eq!(frame(&mut arena, &mut pool, &cats, 0.1), 0);
    }

    #[test]
    fn test_busy_channel_blocks_lapsed_cooldown() {
        let (mut arena, mut pool, cats) = setup();
        frame(&mut arena, &mut pool, &cats, 0.1);
        arena.iter_mut().next().unwrap().cooldown = -1.0;
        // Channel still playing its 0.5s clip.
        assert_eq!(frame(&mut arena, &mut pool, &cats, 0.1), 0);
        assert_eq!(frame(&mut arena, &mut pool, &cats, 0.5), 1);
    }

    #[test]
    fn test_cluster_without_channel_untouched() {
        let (mut arena, mut pool, cats) = setup();
        arena.iter_mut().next().unwrap().channel = None;
        assert_eq!(frame(&mut arena, &mut pool, &cats, 1.0), 0);
        assert_relative_eq!(arena.iter().next().unwrap().cooldown, 0.0);
    }
}

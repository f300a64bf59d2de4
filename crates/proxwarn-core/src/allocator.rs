use crate::channel::{AudioChannel, ChannelPool};
use crate::cluster::ClusterArena;

/// Outcome of one allocation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Clusters holding a channel after the pass, carried ones included.
    pub assigned: usize,
    /// Tiered clusters in the served range that found no free channel.
    pub unserved: usize,
}

/// Hand out channels to the most severe clusters.
///
/// Only the first `min(channels, clusters)` clusters in priority order are
/// considered. A carried channel stays put; otherwise the first channel in
/// pool order that is neither taken this cycle nor playing is used. A
/// playing channel is never taken from the cluster holding it, even for a
/// more severe newcomer.
pub fn allocate<C: AudioChannel>(
    clusters: &mut ClusterArena,
    pool: &mut ChannelPool<C>,
) -> Allocation {
    pool.clear_assignments();
    for cluster in clusters.iter() {
        if let Some(channel) = cluster.channel {
            pool.mark_assigned(channel);
        }
    }

    let mut unserved = 0;
    let limit = pool.len().min(clusters.len());
    for rank in 0..limit {
        let Some(cluster) = clusters.ranked_mut(rank) else {
            break;
        };
        if cluster.tier.is_none() || cluster.channel.is_some() {
            continue;
        }
        match pool.acquire_idle() {
            Some(channel) => cluster.channel = Some(channel),
            None => {
                unserved += 1;
                tracing::debug!(main = %cluster.main, rank, "no channel available");
            }
        }
    }

    Allocation {
        assigned: clusters.iter().filter(|c| c.channel.is_some()).count(),
        unserved,
    }
}

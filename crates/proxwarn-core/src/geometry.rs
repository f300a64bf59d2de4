//! Closest-point resolution against the user's reference positions.

use crate::config::CategoryId;
use crate::registry::{ObstacleId, TrackedObstacle};
use crate::vector::Vec3;

/// Spatial queries supplied by the physics environment.
pub trait Geometry {
    /// Closest point on the object's surface to `query`.
    /// None when the object no longer exists.
    fn closest_point(&self, id: ObstacleId, query: Vec3) -> Option<Vec3>;

    /// Point on the floor below `position`, if there is one.
    fn floor_projection(&self, position: Vec3) -> Option<Vec3>;
}

impl<G: Geometry + ?Sized> Geometry for &G {
    fn closest_point(&self, id: ObstacleId, query: Vec3) -> Option<Vec3> {
        (**self).closest_point(id, query)
    }

    fn floor_projection(&self, position: Vec3) -> Option<Vec3> {
        (**self).floor_projection(position)
    }
}

/// An obstacle annotated with its closest point for one refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedObstacle {
    pub id: ObstacleId,
    pub category: CategoryId,
    pub closest_point: Vec3,
    pub distance: f64,
}

/// Output of [`resolve`]: live obstacles nearest first, plus the ones whose
/// object has disappeared.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub resolved: Vec<ResolvedObstacle>,
    pub stale: Vec<ObstacleId>,
}

/// Compute closest points from `reference` (and `floor`, when given, keeping
/// whichever is nearer) and sort ascending by distance.
///
/// The sort is stable: equal distances keep snapshot order.
pub fn resolve<G: Geometry>(
    geometry: &G,
    obstacles: &[TrackedObstacle],
    reference: Vec3,
    floor: Option<Vec3>,
) -> Resolution {
    let mut out = Resolution {
        resolved: Vec::with_capacity(obstacles.len()),
        stale: Vec::new(),
    };

    for obstacle in obstacles {
        let Some(point) = geometry.closest_point(obstacle.id, reference) else {
            out.stale.push(obstacle.id);
            continue;
        };
        let mut closest_point = point;
        let mut distance = reference.distance(point);

        if let Some(feet) = floor
            && let Some(floor_point) = geometry.closest_point(obstacle.id, feet)
        {
            let floor_distance = feet.distance(floor_point);
            if floor_distance < distance {
                closest_point = floor_point;
                distance = floor_distance;
            }
        }

        out.resolved.push(ResolvedObstacle {
            id: obstacle.id,
            category: obstacle.category,
            closest_point,
            distance,
        });
    }

    out.resolved.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    out
}

//! In-memory geometry: a static set of primitive shapes and a flat floor.
//! Stands in for the physics environment in simulations and tests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::registry::ObstacleId;
use crate::vector::Vec3;

/// Solid primitive. Queries from inside a solid return the query point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Point(Vec3),
    Sphere { center: Vec3, radius: f64 },
    /// Axis-aligned box.
    Box { min: Vec3, max: Vec3 },
}

impl Shape {
    pub fn closest_point(&self, query: Vec3) -> Vec3 {
        match *self {
            Shape::Point(p) => p,
            Shape::Sphere { center, radius } => {
                let offset = query - center;
                let len = offset.length();
                if len <= radius {
                    query
                } else {
                    center + offset * (radius / len)
                }
            }
            Shape::Box { min, max } => query.clamp(min, max),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticScene {
    shapes: HashMap<ObstacleId, Shape>,
    floor_height: Option<f64>,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene with a horizontal floor at `height`.
    pub fn with_floor(height: f64) -> Self {
        Self {
            shapes: HashMap::new(),
            floor_height: Some(height),
        }
    }

    pub fn insert(&mut self, id: ObstacleId, shape: Shape) {
        self.shapes.insert(id, shape);
    }

    /// Remove an object; later queries about it report it as gone.
    pub fn remove(&mut self, id: ObstacleId) -> Option<Shape> {
        self.shapes.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl Geometry for StaticScene {
    fn closest_point(&self, id: ObstacleId, query: Vec3) -> Option<Vec3> {
        self.shapes.get(&id).map(|s| s.closest_point(query))
    }

    fn floor_projection(&self, position: Vec3) -> Option<Vec3> {
        // Only when standing above the floor, like a downward raycast.
        let height = self.floor_height?;
        (position.y >= height).then(|| position.with_y(height))
    }
}

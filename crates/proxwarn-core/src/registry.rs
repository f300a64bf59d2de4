use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CategoryId;

/// Stable identity of an external object (collider) reported by the sensor.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObstacleId(pub u64);

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An obstacle currently inside the sensing volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackedObstacle {
    pub id: ObstacleId,
    pub category: CategoryId,
}

/// Obstacles inside the sensing volume, in order of arrival.
///
/// Arrival order is the tie-break for equal distances downstream, so
/// removal preserves the relative order of the rest.
#[derive(Clone, Debug, Default)]
pub struct ObstacleRegistry {
    entries: Vec<TrackedObstacle>,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an obstacle. Returns false if it is already tracked.
    pub fn insert(&mut self, id: ObstacleId, category: CategoryId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push(TrackedObstacle { id, category });
        true
    }

    /// Stop tracking an obstacle. Returns false if it was not tracked.
    pub fn remove(&mut self, id: ObstacleId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every listed obstacle. Returns how many were tracked.
    pub fn purge(&mut self, ids: &[ObstacleId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !ids.contains(&e.id));
        before - self.entries.len()
    }

    pub fn contains(&self, id: ObstacleId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Point-in-time copy for a refresh cycle.
    pub fn snapshot(&self) -> Vec<TrackedObstacle> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use jiff::civil::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::Location;

/// A set of closed intersections over the half-open interval `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockage {
    pub start: DateTime,
    pub end: DateTime,
    points: HashSet<Location>,
}

impl Blockage {
    pub fn new(start: DateTime, end: DateTime, points: impl IntoIterator<Item = Location>) -> Self {
        Blockage {
            start,
            end,
            points: points.into_iter().collect(),
        }
    }

    /// Build a blockage from the vertices of an axis-aligned polyline.
    ///
    /// Every intersection on the segments between consecutive vertices is closed.
    /// Diagonal segments are walked as an L, x first.
    pub fn from_polyline(start: DateTime, end: DateTime, vertices: &[Location]) -> Self {
        let mut points = HashSet::new();

        if let Some(first) = vertices.first() {
            points.insert(*first);
        }

        for pair in vertices.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let mut cursor = from;
            while cursor.x != to.x {
                cursor.x += (to.x - cursor.x).signum();
                points.insert(cursor);
            }
            while cursor.y != to.y {
                cursor.y += (to.y - cursor.y).signum();
                points.insert(cursor);
            }
        }

        Blockage { start, end, points }
    }

    pub fn is_active(&self, at: DateTime) -> bool {
        self.start <= at && at < self.end
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.points.contains(location)
    }

    pub fn points(&self) -> impl Iterator<Item = &Location> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

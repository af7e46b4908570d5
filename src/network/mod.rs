//! City grid, depots and time-varying blockages.
//!
//! The road network is an integer grid with 4-connected movement where every
//! edge is one kilometre long. Blockages close individual intersections for a
//! half-open time interval.

mod blockage;
mod pathfinding;

pub use blockage::Blockage;

use jiff::civil::DateTime;
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default city width in kilometres.
pub const DEFAULT_WIDTH: i32 = 70;
/// Default city height in kilometres.
pub const DEFAULT_HEIGHT: i32 = 50;

/// An intersection on the city grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Location { x, y }
    }

    /// Manhattan distance, which is the grid distance when nothing is blocked.
    pub fn manhattan(&self, other: &Location) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The four axis-aligned neighbours, whether or not they are on the grid.
    pub fn neighbors(&self) -> [Location; 4] {
        [
            Location::new(self.x + 1, self.y),
            Location::new(self.x - 1, self.y),
            Location::new(self.x, self.y + 1),
            Location::new(self.x, self.y - 1),
        ]
    }

    pub fn is_adjacent(&self, other: &Location) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepotKind {
    /// The plant: unlimited GLP.
    Main,
    /// A satellite tank with a fixed capacity.
    Intermediate,
}

/// A supply point where trucks reload GLP and refuel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub id: String,
    pub location: Location,
    pub kind: DepotKind,
    /// Tank capacity in m³, ignored for the main depot.
    pub capacity: f64,
    /// Current stock in m³, ignored for the main depot.
    pub stock: f64,
}

impl Depot {
    pub fn main(id: impl Into<String>, location: Location) -> Self {
        Depot {
            id: id.into(),
            location,
            kind: DepotKind::Main,
            capacity: 0.0,
            stock: 0.0,
        }
    }

    pub fn intermediate(id: impl Into<String>, location: Location, capacity: f64) -> Self {
        Depot {
            id: id.into(),
            location,
            kind: DepotKind::Intermediate,
            capacity,
            stock: capacity,
        }
    }

    pub fn is_main(&self) -> bool {
        self.kind == DepotKind::Main
    }

    /// Volume that can still be drawn from this depot.
    pub fn available(&self) -> f64 {
        match self.kind {
            DepotKind::Main => f64::INFINITY,
            DepotKind::Intermediate => self.stock,
        }
    }

    /// Draw `volume` m³ from the depot. Fails without change when the stock is short.
    pub fn withdraw(&mut self, volume: f64) -> bool {
        if volume < 0.0 {
            return false;
        }
        match self.kind {
            DepotKind::Main => true,
            DepotKind::Intermediate => {
                if volume > self.stock {
                    return false;
                }
                self.stock -= volume;
                true
            }
        }
    }

    /// Restore the stock to full capacity (daily replenishment).
    pub fn refill(&mut self) {
        self.stock = self.capacity;
    }
}

/// The road network: grid bounds, depots and blockages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub width: i32,
    pub height: i32,
    pub depots: Vec<Depot>,
    pub blockages: Vec<Blockage>,
}

impl Network {
    /// Create a network spanning `[0, width] x [0, height]`.
    ///
    /// Exactly one main depot is expected among `depots`; without one no
    /// route can be planned.
    pub fn new(width: i32, height: i32, depots: Vec<Depot>) -> Self {
        let mains = depots.iter().filter(|d| d.is_main()).count();
        if mains != 1 {
            log::warn!("network declares {} main depots, expected exactly one", mains);
        }
        Network {
            width,
            height,
            depots,
            blockages: Vec::new(),
        }
    }

    pub fn with_blockages(mut self, blockages: Vec<Blockage>) -> Self {
        self.blockages = blockages;
        self
    }

    pub fn add_blockage(&mut self, blockage: Blockage) {
        self.blockages.push(blockage);
    }

    /// Bounds check.
    pub fn is_valid(&self, location: &Location) -> bool {
        (0..=self.width).contains(&location.x) && (0..=self.height).contains(&location.y)
    }

    /// Whether any blockage active at `at` closes `location`.
    pub fn is_blocked(&self, location: &Location, at: DateTime) -> bool {
        self.blockages
            .iter()
            .any(|b| b.is_active(at) && b.contains(location))
    }

    /// Whether the street between two adjacent intersections is closed at `at`.
    ///
    /// Blockages enumerate points rather than edges, so a street counts as closed
    /// as soon as any active blockage lists either of its endpoints. Segments
    /// between non-adjacent points are not streets and are never reported
    /// blocked.
    pub fn segment_blocked(&self, a: &Location, b: &Location, at: DateTime) -> bool {
        if !a.is_adjacent(b) {
            return false;
        }
        self.blockages
            .iter()
            .filter(|blockage| blockage.is_active(at))
            .any(|blockage| blockage.contains(a) || blockage.contains(b))
    }

    /// The main depot, where every route normally ends.
    pub fn main_depot(&self) -> Option<&Depot> {
        self.depots.iter().find(|d| d.is_main())
    }

    /// The depot closest to `location`; ties go to the first in declaration order.
    pub fn nearest_depot(&self, location: &Location) -> Option<&Depot> {
        self.depots
            .iter()
            .min_by_key(|d| d.location.manhattan(location))
    }

    pub fn depot(&self, id: &str) -> Option<&Depot> {
        self.depots.iter().find(|d| d.id == id)
    }

    pub fn depot_at(&self, location: &Location) -> Option<&Depot> {
        self.depots.iter().find(|d| d.location == *location)
    }

    /// Time needed to cover `distance_km` at `speed_kmh`. Saturates at
    /// [`SignedDuration::MAX`] when the truck cannot move or the trip is unbounded.
    pub fn travel_time(distance_km: f64, speed_kmh: f64) -> SignedDuration {
        if !(speed_kmh > 0.0) || !distance_km.is_finite() {
            return SignedDuration::MAX;
        }
        SignedDuration::try_from_secs_f64(distance_km / speed_kmh * 3600.0)
            .unwrap_or(SignedDuration::MAX)
    }
}

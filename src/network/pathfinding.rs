//! A* search over the 4-connected grid.
//!
//! Both variants share one search loop and differ only in the instant at which
//! blockages are evaluated. An empty path means "unreachable".

use jiff::civil::DateTime;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use super::{Location, Network};

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
struct HeapItem {
    location: Location,

    /// Number of one-kilometre edges from the origin.
    g_score: u32,

    /// g_score plus the Manhattan distance to the destination.
    f_score: u32,
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &HeapItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip f to make this a min-heap; deeper nodes win ties
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
            .then_with(|| other.location.cmp(&self.location))
    }
}

impl Network {
    /// Shortest path with every blockage evaluated at the single instant `at`.
    ///
    /// Returns `[origin]` when origin and destination coincide and an empty
    /// path when either endpoint is blocked or no path exists.
    pub fn find_path(&self, origin: Location, destination: Location, at: DateTime) -> Vec<Location> {
        if self.is_blocked(&origin, at) || self.is_blocked(&destination, at) {
            return Vec::new();
        }
        self.search(origin, destination, |from, to, _| {
            self.is_blocked(to, at) || self.segment_blocked(from, to, at)
        })
    }

    /// Shortest path for a truck leaving `origin` at `departure` and driving at
    /// `speed_kmh`.
    ///
    /// Each cell is tested against the blockages at the moment the truck would
    /// actually reach it, so a closure that lifts before the truck arrives does
    /// not stop it.
    pub fn find_path_timed(
        &self,
        origin: Location,
        destination: Location,
        departure: DateTime,
        speed_kmh: f64,
    ) -> Vec<Location> {
        if !(speed_kmh > 0.0) || self.is_blocked(&origin, departure) {
            return Vec::new();
        }
        self.search(origin, destination, |from, to, steps| {
            let arrival = departure.saturating_add(Network::travel_time(steps as f64, speed_kmh));
            self.is_blocked(to, arrival) || self.segment_blocked(from, to, arrival)
        })
    }

    /// Driving distance in kilometres, `None` when unreachable.
    pub fn path_distance(&self, origin: Location, destination: Location, at: DateTime) -> Option<u32> {
        let path = self.find_path(origin, destination, at);
        if path.is_empty() {
            None
        } else {
            Some(path.len() as u32 - 1)
        }
    }

    /// `closed(from, to, steps)` tells whether moving from `from` onto `to`,
    /// reaching it after `steps` edges, is forbidden.
    fn search<F>(&self, origin: Location, destination: Location, closed: F) -> Vec<Location>
    where
        F: Fn(&Location, &Location, u32) -> bool,
    {
        if !self.is_valid(&origin) || !self.is_valid(&destination) {
            return Vec::new();
        }
        if origin == destination {
            return vec![origin];
        }

        let mut open = BinaryHeap::new();
        let mut g_scores: HashMap<Location, u32> = HashMap::new();
        let mut came_from: HashMap<Location, Location> = HashMap::new();
        let mut settled: HashSet<Location> = HashSet::new();

        g_scores.insert(origin, 0);
        open.push(HeapItem {
            location: origin,
            g_score: 0,
            f_score: origin.manhattan(&destination),
        });

        while let Some(current) = open.pop() {
            if current.location == destination {
                return Self::reconstruct(&came_from, destination);
            }
            if !settled.insert(current.location) {
                continue;
            }

            let next_g = current.g_score + 1;
            for neighbor in current.location.neighbors() {
                if !self.is_valid(&neighbor) || settled.contains(&neighbor) {
                    continue;
                }
                if g_scores.get(&neighbor).is_some_and(|&g| g <= next_g) {
                    continue;
                }
                if closed(&current.location, &neighbor, next_g) {
                    continue;
                }

                g_scores.insert(neighbor, next_g);
                came_from.insert(neighbor, current.location);
                open.push(HeapItem {
                    location: neighbor,
                    g_score: next_g,
                    f_score: next_g + neighbor.manhattan(&destination),
                });
            }
        }

        Vec::new()
    }

    fn reconstruct(came_from: &HashMap<Location, Location>, destination: Location) -> Vec<Location> {
        let mut path = vec![destination];
        let mut cursor = destination;
        while let Some(&previous) = came_from.get(&cursor) {
            path.push(previous);
            cursor = previous;
        }
        path.reverse();
        path
    }
}

//! Routes: one truck's ordered visits plus derived distance, fuel and event log.

use itertools::Itertools;
use jiff::civil::DateTime;
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::network::{Depot, Location, Network};
use crate::order::Order;
use crate::truck::{fuel_for, TruckTier, GLP_TONNES_PER_M3};

/// Time spent at a client unloading GLP.
pub const SERVICE_TIME: SignedDuration = SignedDuration::from_mins(15);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VisitKind {
    Delivery { order_id: String, volume: f64 },
    /// Reload GLP and refuel.
    Depot { depot_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub location: Location,
    pub kind: VisitKind,
}

impl Visit {
    pub fn delivery(order: &Order) -> Self {
        Visit {
            location: order.location,
            kind: VisitKind::Delivery {
                order_id: order.id.clone(),
                volume: order.volume,
            },
        }
    }

    pub fn depot(depot: &Depot) -> Self {
        Visit {
            location: depot.location,
            kind: VisitKind::Depot {
                depot_id: depot.id.clone(),
            },
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match &self.kind {
            VisitKind::Delivery { order_id, .. } => Some(order_id),
            VisitKind::Depot { .. } => None,
        }
    }

    pub fn volume(&self) -> f64 {
        match &self.kind {
            VisitKind::Delivery { volume, .. } => *volume,
            VisitKind::Depot { .. } => 0.0,
        }
    }

    pub fn is_depot(&self) -> bool {
        matches!(self.kind, VisitKind::Depot { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    Delivery,
    Refuel,
    Breakdown,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEvent {
    pub kind: EventKind,
    pub at: DateTime,
    pub location: Location,
    pub note: String,
}

/// Arrival time at each visit of a route, as projected by [`Route::walk`].
#[derive(Debug, Clone)]
pub struct RouteWalk {
    /// One entry per visit, in visit order.
    pub arrivals: Vec<DateTime>,
    /// Arrival at the destination.
    pub finished_at: DateTime,
    /// Gallons burnt over the whole route.
    pub fuel: f64,
}

/// The plan for one truck: leave `origin`, perform `visits` in order, end at
/// `destination` (normally the main depot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub truck_id: String,
    pub origin: Location,
    pub destination: Location,
    pub visits: Vec<Visit>,
    /// Length in km of each leg: origin to first visit, between visits, last visit to destination.
    pub legs: Vec<f64>,
    /// Total distance in km.
    pub distance: f64,
    /// Total fuel in gallons, filled in by evaluation or simulation.
    pub fuel_consumed: f64,
    /// Full grid path once traced with [`Route::trace_path`].
    pub path: Vec<Location>,
    pub events: Vec<RouteEvent>,
    pub completed_at: Option<DateTime>,
}

impl Route {
    pub fn new(truck_id: impl Into<String>, origin: Location, destination: Location) -> Self {
        let mut route = Route {
            truck_id: truck_id.into(),
            origin,
            destination,
            visits: Vec::new(),
            legs: Vec::new(),
            distance: 0.0,
            fuel_consumed: 0.0,
            path: Vec::new(),
            events: Vec::new(),
            completed_at: None,
        };
        route.recalculate_distance();
        route
    }

    pub fn push_delivery(&mut self, order: &Order) {
        self.visits.push(Visit::delivery(order));
        self.recalculate_distance();
    }

    pub fn push_depot(&mut self, depot: &Depot) {
        self.visits.push(Visit::depot(depot));
        self.recalculate_distance();
    }

    pub fn set_visits(&mut self, visits: Vec<Visit>) {
        self.visits = visits;
        self.recalculate_distance();
    }

    /// True when the route delivers nothing.
    pub fn is_empty(&self) -> bool {
        !self.visits.iter().any(|v| !v.is_depot())
    }

    pub fn order_ids(&self) -> impl Iterator<Item = &str> {
        self.visits.iter().filter_map(|v| v.order_id())
    }

    pub fn delivery_count(&self) -> usize {
        self.order_ids().count()
    }

    /// Total GLP delivered over the whole route.
    pub fn assigned_volume(&self) -> f64 {
        self.visits.iter().map(|v| v.volume()).sum()
    }

    /// Volume carried on each trip, a trip ending at every depot visit.
    pub fn trip_loads(&self) -> Vec<f64> {
        let mut loads = vec![0.0];
        for visit in &self.visits {
            if visit.is_depot() {
                loads.push(0.0);
            } else if let Some(last) = loads.last_mut() {
                *last += visit.volume();
            }
        }
        loads
    }

    /// Number of depot visits that are followed by at least one delivery.
    pub fn reload_count(&self) -> usize {
        self.trip_loads().iter().skip(1).filter(|&&load| load > 0.0).count()
    }

    /// Every stop in driving order, including origin and destination.
    pub fn waypoints(&self) -> Vec<Location> {
        std::iter::once(self.origin)
            .chain(self.visits.iter().map(|v| v.location))
            .chain(std::iter::once(self.destination))
            .collect()
    }

    /// Recompute legs and total distance from Manhattan distances.
    ///
    /// Any previously traced grid path is discarded since it no longer matches
    /// the visit sequence.
    pub fn recalculate_distance(&mut self) {
        self.legs = self
            .waypoints()
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.manhattan(b) as f64)
            .collect();
        self.distance = self.legs.iter().sum();
        self.path.clear();
    }

    /// Trace every leg with the time-aware A*, leaving at `departure`.
    ///
    /// On success the legs hold the real driving distances and `path` the full
    /// grid path. Returns false, keeping the Manhattan legs, when any leg is
    /// unreachable.
    pub fn trace_path(&mut self, network: &Network, departure: DateTime, speed_kmh: f64) -> bool {
        let waypoints = self.waypoints();
        let mut path = vec![self.origin];
        let mut legs = Vec::with_capacity(waypoints.len().saturating_sub(1));
        let mut clock = departure;

        for (i, (from, to)) in waypoints.iter().tuple_windows().enumerate() {
            let leg = network.find_path_timed(*from, *to, clock, speed_kmh);
            if leg.is_empty() {
                return false;
            }
            let length = (leg.len() - 1) as f64;
            clock = clock.saturating_add(Network::travel_time(length, speed_kmh));
            if self.visits.get(i).is_some_and(|v| !v.is_depot()) {
                clock = clock.saturating_add(SERVICE_TIME);
            }
            legs.push(length);
            path.extend(leg.into_iter().skip(1));
        }

        self.distance = legs.iter().sum();
        self.legs = legs;
        self.path = path;
        true
    }

    /// Project arrival times and fuel use for a truck of `tier` leaving at `departure`.
    ///
    /// The truck leaves carrying the first trip's volume, drops each delivery's
    /// weight on arrival and takes on the next trip's volume at every depot.
    pub fn walk(&self, tier: TruckTier, departure: DateTime, speed_kmh: f64) -> RouteWalk {
        let trips = self.trip_loads();
        let mut trip = 0;
        let mut load = trips[0].min(tier.glp_capacity());
        let mut clock = departure;
        let mut fuel = 0.0;
        let mut arrivals = Vec::with_capacity(self.visits.len());

        for (leg, visit) in self.legs.iter().zip(self.visits.iter()) {
            let weight = tier.tare() + load * GLP_TONNES_PER_M3;
            fuel += fuel_for(*leg, weight);
            clock = clock.saturating_add(Network::travel_time(*leg, speed_kmh));
            arrivals.push(clock);

            if visit.is_depot() {
                trip += 1;
                load = trips.get(trip).copied().unwrap_or(0.0).min(tier.glp_capacity());
            } else {
                load = (load - visit.volume()).max(0.0);
                clock = clock.saturating_add(SERVICE_TIME);
            }
        }

        if let Some(last) = self.legs.get(self.visits.len()) {
            fuel += fuel_for(*last, tier.tare() + load * GLP_TONNES_PER_M3);
            clock = clock.saturating_add(Network::travel_time(*last, speed_kmh));
        }

        RouteWalk {
            arrivals,
            finished_at: clock,
            fuel,
        }
    }

    /// Reorder deliveries within each trip with 2-opt, scoring legs by the
    /// static shortest-path distance at `at`. Returns true if the sequence changed.
    pub fn resequence(&mut self, network: &Network, at: DateTime) -> bool {
        let mut changed = false;
        let mut start = 0;

        while start < self.visits.len() {
            if self.visits[start].is_depot() {
                start += 1;
                continue;
            }
            let end = self.visits[start..]
                .iter()
                .position(|v| v.is_depot())
                .map_or(self.visits.len(), |offset| start + offset);

            if end - start >= 3 {
                let before = if start == 0 {
                    self.origin
                } else {
                    self.visits[start - 1].location
                };
                let after = self
                    .visits
                    .get(end)
                    .map_or(self.destination, |v| v.location);
                changed |= self.two_opt(network, at, start, end, before, after);
            }
            start = end;
        }

        if changed {
            self.recalculate_distance();
        }
        changed
    }

    fn two_opt(
        &mut self,
        network: &Network,
        at: DateTime,
        start: usize,
        end: usize,
        before: Location,
        after: Location,
    ) -> bool {
        // Points: anchor, the trip's deliveries, anchor
        let mut points = vec![before];
        points.extend(self.visits[start..end].iter().map(|v| v.location));
        points.push(after);

        let n = points.len();
        let mut dist = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = network
                    .path_distance(points[i], points[j], at)
                    .map_or(f64::from(u16::MAX), f64::from);
                dist[i][j] = d;
                dist[j][i] = d;
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut improved = true;
        let mut changed = false;

        while improved {
            improved = false;
            for i in 1..n - 2 {
                for j in (i + 1)..n - 1 {
                    let delta = dist[order[i - 1]][order[j]] + dist[order[i]][order[j + 1]]
                        - dist[order[i - 1]][order[i]]
                        - dist[order[j]][order[j + 1]];
                    if delta < -1e-9 {
                        order[i..=j].reverse();
                        improved = true;
                        changed = true;
                    }
                }
            }
        }

        if changed {
            let trip: Vec<Visit> = self.visits[start..end].to_vec();
            for (slot, &idx) in order[1..n - 1].iter().enumerate() {
                self.visits[start + slot] = trip[idx - 1].clone();
            }
        }
        changed
    }

    pub fn log(&mut self, kind: EventKind, at: DateTime, location: Location, note: impl Into<String>) {
        self.events.push(RouteEvent {
            kind,
            at,
            location,
            note: note.into(),
        });
    }
}

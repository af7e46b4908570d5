//! Forward simulation of finalized routes.
//!
//! The simulator is the only component that mutates live truck and order
//! state. It walks every route from its start time, stamps delivery times and
//! the event log, and can inject breakdowns registered per shift and truck.
//! When a truck breaks down mid-route, it stays where the incident happened
//! and every order it had not delivered yet is released for the next planning
//! cycle.

use jiff::civil::DateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::network::{Location, Network};
use crate::order::Order;
use crate::route::{EventKind, Route, VisitKind, SERVICE_TIME};
use crate::truck::{BreakdownKind, Truck};

/// The three eight-hour shifts of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftTurn {
    /// 00:00 to 08:00
    T1,
    /// 08:00 to 16:00
    T2,
    /// 16:00 to 24:00
    T3,
}

impl ShiftTurn {
    pub fn of(at: DateTime) -> Self {
        match at.hour() {
            0..=7 => ShiftTurn::T1,
            8..=15 => ShiftTurn::T2,
            _ => ShiftTurn::T3,
        }
    }
}

/// Incidents planned ahead of time, keyed by shift and truck.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakdownSchedule {
    incidents: HashMap<ShiftTurn, HashMap<String, BreakdownKind>>,
}

impl BreakdownSchedule {
    pub fn new() -> Self {
        BreakdownSchedule::default()
    }

    pub fn register(&mut self, turn: ShiftTurn, truck_id: impl Into<String>, kind: BreakdownKind) {
        self.incidents
            .entry(turn)
            .or_default()
            .insert(truck_id.into(), kind);
    }

    pub fn incident(&self, turn: ShiftTurn, truck_id: &str) -> Option<BreakdownKind> {
        self.incidents.get(&turn)?.get(truck_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.values().all(|m| m.is_empty())
    }
}

/// Outcome of a simulation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Ids of orders delivered during the pass.
    pub delivered: Vec<String>,
    /// Ids of orders released after a breakdown or a failed delivery.
    pub requeued: Vec<String>,
    pub breakdowns: Vec<(String, BreakdownKind, DateTime)>,
    /// Trucks that could not cover a leg with the fuel on board. Such a truck
    /// stops where it stands and its remaining orders are re-queued.
    pub fuel_shortfalls: Vec<String>,
}

pub struct DeliverySimulator<'a> {
    network: &'a Network,
    schedule: Option<&'a BreakdownSchedule>,
    breakdown_fraction: f64,
}

impl<'a> DeliverySimulator<'a> {
    pub fn new(network: &'a Network) -> Self {
        DeliverySimulator {
            network,
            schedule: None,
            breakdown_fraction: 0.5,
        }
    }

    pub fn with_schedule(mut self, schedule: &'a BreakdownSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Share of a route's distance after which a scheduled breakdown strikes.
    pub fn with_breakdown_fraction(mut self, fraction: f64) -> Self {
        self.breakdown_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Run every route from `start`, updating trucks and orders in place.
    pub fn simulate(
        &self,
        routes: &mut [Route],
        trucks: &mut [Truck],
        orders: &mut [Order],
        start: DateTime,
    ) -> SimulationReport {
        let mut report = SimulationReport::default();
        let order_index: HashMap<String, usize> = orders
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id.clone(), i))
            .collect();

        for route in routes.iter_mut() {
            let Some(truck) = trucks.iter_mut().find(|t| t.id == route.truck_id) else {
                warn!("no truck {} for route, skipping", route.truck_id);
                continue;
            };
            self.run_route(route, truck, orders, &order_index, start, &mut report);
        }

        report
    }

    fn run_route(
        &self,
        route: &mut Route,
        truck: &mut Truck,
        orders: &mut [Order],
        order_index: &HashMap<String, usize>,
        start: DateTime,
        report: &mut SimulationReport,
    ) {
        let trips = route.trip_loads();
        let mut trip = 0;

        if self.network.depot_at(&truck.location).is_some() {
            let wanted = (trips[0] - truck.glp_level()).clamp(0.0, truck.glp_capacity() - truck.glp_level());
            truck.load_glp(wanted);
            truck.refuel_full();
        }

        let mut clock = start;
        route.log(
            EventKind::Start,
            clock,
            route.origin,
            format!("truck {} leaves with {:.1} m3", truck.id, truck.glp_level()),
        );

        let incident = self
            .schedule
            .and_then(|s| s.incident(ShiftTurn::of(start), &truck.id));
        let breakdown_km = incident.map(|_| route.distance * self.breakdown_fraction);

        let mut travelled = 0.0;
        let mut fuel_used = 0.0;
        let targets: Vec<Location> = route.waypoints().into_iter().skip(1).collect();

        for (leg_idx, leg) in route.legs.clone().into_iter().enumerate() {
            if let (Some(kind), Some(at_km)) = (incident, breakdown_km) {
                if travelled + leg >= at_km {
                    let partial = (at_km - travelled).max(0.0);
                    let before = truck.fuel_level();
                    truck.consume_fuel(partial);
                    fuel_used += before - truck.fuel_level();
                    clock = clock.saturating_add(Network::travel_time(partial, truck.speed()));

                    let location = self.breakdown_location(route, leg_idx, at_km);
                    truck.location = location;
                    truck.register_breakdown(kind, clock);
                    route.log(
                        EventKind::Breakdown,
                        clock,
                        location,
                        format!("{} breakdown, back in service at {}", kind, kind.resume_at(clock)),
                    );
                    report.breakdowns.push((truck.id.clone(), kind, clock));
                    debug!("truck {} broke down ({}) at {}", truck.id, kind, location);

                    self.release_remaining(route, leg_idx, orders, order_index, report);
                    route.fuel_consumed = fuel_used;
                    return;
                }
            }

            let before = truck.fuel_level();
            if !truck.consume_fuel(leg) {
                // Stranded before the leg: treated like a breakdown without an incident kind
                report.fuel_shortfalls.push(truck.id.clone());
                warn!("truck {} lacks fuel for a {:.0} km leg, stopping at {}", truck.id, leg, truck.location);
                self.release_remaining(route, leg_idx, orders, order_index, report);
                route.fuel_consumed = fuel_used;
                return;
            }
            fuel_used += before - truck.fuel_level();
            travelled += leg;
            clock = clock.saturating_add(Network::travel_time(leg, truck.speed()));
            truck.location = targets[leg_idx];

            let Some(visit) = route.visits.get(leg_idx).cloned() else {
                break;
            };
            match &visit.kind {
                VisitKind::Delivery { order_id, volume } => {
                    let Some(&idx) = order_index.get(order_id.as_str()) else {
                        warn!("route delivers unknown order {}", order_id);
                        continue;
                    };
                    if truck.unload_glp(*volume) {
                        orders[idx].mark_delivered(clock);
                        orders[idx].assigned_truck = Some(truck.id.clone());
                        report.delivered.push(order_id.clone());
                        route.log(
                            EventKind::Delivery,
                            clock,
                            visit.location,
                            format!("{} receives {:.1} m3", order_id, volume),
                        );
                    } else {
                        orders[idx].assigned_truck = None;
                        report.requeued.push(order_id.clone());
                        warn!("truck {} cannot cover order {}", truck.id, order_id);
                    }
                    clock = clock.saturating_add(SERVICE_TIME);
                }
                VisitKind::Depot { depot_id } => {
                    trip += 1;
                    let wanted = trips.get(trip).copied().unwrap_or(0.0);
                    let room = truck.glp_capacity() - truck.glp_level();
                    truck.load_glp(wanted.min(room).max(0.0));
                    truck.refuel_full();
                    route.log(
                        EventKind::Refuel,
                        clock,
                        visit.location,
                        format!("reload at {}, {:.1} m3 on board", depot_id, truck.glp_level()),
                    );
                }
            }
        }

        route.fuel_consumed = fuel_used;
        route.completed_at = Some(clock);
        route.log(EventKind::End, clock, route.destination, format!("truck {} done", truck.id));
        if self.network.depot_at(&route.destination).is_some() {
            truck.refuel_full();
        }
    }

    /// Where the truck stands after `at_km` kilometres of `route`.
    fn breakdown_location(&self, route: &Route, leg_idx: usize, at_km: f64) -> Location {
        let km = at_km.floor() as usize;
        if let Some(location) = route.path.get(km) {
            return *location;
        }
        route.waypoints()[leg_idx]
    }

    fn release_remaining(
        &self,
        route: &Route,
        from_visit: usize,
        orders: &mut [Order],
        order_index: &HashMap<String, usize>,
        report: &mut SimulationReport,
    ) {
        for visit in route.visits.iter().skip(from_visit) {
            if let Some(&idx) = visit.order_id().and_then(|id| order_index.get(id)) {
                if !orders[idx].delivered {
                    orders[idx].assigned_truck = None;
                    report.requeued.push(orders[idx].id.clone());
                }
            }
        }
    }
}

//! Scalar objective shared by all optimizers. Lower is better.

use jiff::civil::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{ensure_non_negative, ConfigError};
use crate::order::Order;
use crate::route::Route;
use crate::truck::Truck;

/// Weight of each fitness term.
///
/// Each optimizer is tuned with its own vector; the relative order of
/// magnitude is the same everywhere: leaving an order unserved dominates,
/// overloading a tank comes next, then lateness, distance and fuel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    /// Per km driven.
    pub distance: f64,
    /// Per gallon burnt.
    pub fuel: f64,
    /// Per minute late, summed over orders.
    pub delay: f64,
    /// Per original order none of whose parts is planned.
    pub unassigned_orders: f64,
    /// Per m³ left unplanned.
    pub unassigned_volume: f64,
    /// Per m³ carried beyond a tank's capacity on a trip.
    pub overload: f64,
    /// Subtracted per reload at a depot that keeps a long route within capacity.
    pub refill_bonus: f64,
}

impl FitnessWeights {
    pub const ANT_COLONY: FitnessWeights = FitnessWeights {
        distance: 1.0,
        fuel: 0.5,
        delay: 2.0,
        unassigned_orders: 10_000.0,
        unassigned_volume: 50.0,
        overload: 500.0,
        refill_bonus: 5.0,
    };

    pub const GENETIC: FitnessWeights = FitnessWeights {
        distance: 1.0,
        fuel: 1.0,
        delay: 1.0,
        unassigned_orders: 5_000.0,
        unassigned_volume: 50.0,
        overload: 1_000.0,
        refill_bonus: 0.0,
    };

    pub const PARTICLE_SWARM: FitnessWeights = FitnessWeights {
        distance: 1.0,
        fuel: 0.8,
        delay: 1.5,
        unassigned_orders: 5_000.0,
        unassigned_volume: 50.0,
        overload: 1_000.0,
        refill_bonus: 0.0,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("weights.distance", self.distance)?;
        ensure_non_negative("weights.fuel", self.fuel)?;
        ensure_non_negative("weights.delay", self.delay)?;
        ensure_non_negative("weights.unassigned_orders", self.unassigned_orders)?;
        ensure_non_negative("weights.unassigned_volume", self.unassigned_volume)?;
        ensure_non_negative("weights.overload", self.overload)?;
        ensure_non_negative("weights.refill_bonus", self.refill_bonus)?;
        Ok(())
    }
}

impl Default for FitnessWeights {
    fn default() -> Self {
        FitnessWeights::GENETIC
    }
}

/// The individual terms of a fitness evaluation and their weighted total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessReport {
    pub distance: f64,
    pub fuel: f64,
    pub delay_minutes: f64,
    /// Distinct original orders with no planned part.
    pub unassigned_orders: usize,
    pub unassigned_volume: f64,
    pub overload: f64,
    pub refills: usize,
    pub total: f64,
}

/// Evaluates route sets against a fixed snapshot of trucks and orders.
pub struct FitnessEvaluator<'a> {
    weights: FitnessWeights,
    orders: &'a [Order],
    order_index: HashMap<&'a str, &'a Order>,
    trucks: HashMap<&'a str, &'a Truck>,
    departure: DateTime,
}

impl<'a> FitnessEvaluator<'a> {
    /// `orders` are the orders the plan is expected to serve, already split.
    pub fn new(
        weights: FitnessWeights,
        trucks: &'a [Truck],
        orders: &'a [Order],
        departure: DateTime,
    ) -> Self {
        FitnessEvaluator {
            weights,
            orders,
            order_index: orders.iter().map(|o| (o.id.as_str(), o)).collect(),
            trucks: trucks.iter().map(|t| (t.id.as_str(), t)).collect(),
            departure,
        }
    }

    pub fn weights(&self) -> &FitnessWeights {
        &self.weights
    }

    pub fn evaluate(&self, routes: &[Route]) -> FitnessReport {
        let mut report = FitnessReport::default();
        let mut planned: HashSet<&str> = HashSet::new();

        for route in routes {
            report.distance += route.distance;
            planned.extend(route.order_ids());

            let Some(truck) = self.trucks.get(route.truck_id.as_str()) else {
                continue;
            };

            let walk = route.walk(truck.tier, self.departure, truck.speed());
            report.fuel += walk.fuel;

            for (visit, arrival) in route.visits.iter().zip(walk.arrivals.iter()) {
                if let Some(order) = visit.order_id().and_then(|id| self.order_index.get(id)) {
                    report.delay_minutes += order.delay_minutes(*arrival);
                }
            }

            let capacity = truck.glp_capacity();
            let trips = route.trip_loads();
            let overload: f64 = trips.iter().map(|load| (load - capacity).max(0.0)).sum();
            report.overload += overload;

            if overload <= 0.0 && route.assigned_volume() > capacity {
                report.refills += route.reload_count();
            }
        }

        let mut served_bases: HashSet<&str> = HashSet::new();
        for order in self.orders {
            if planned.contains(order.id.as_str()) {
                served_bases.insert(order.base_id.as_str());
            } else {
                report.unassigned_volume += order.volume;
            }
        }
        let all_bases: HashSet<&str> = self.orders.iter().map(|o| o.base_id.as_str()).collect();
        report.unassigned_orders = all_bases.difference(&served_bases).count();

        let w = &self.weights;
        report.total = w.distance * report.distance
            + w.fuel * report.fuel
            + w.delay * report.delay_minutes
            + w.unassigned_orders * report.unassigned_orders as f64
            + w.unassigned_volume * report.unassigned_volume
            + w.overload * report.overload
            - w.refill_bonus * report.refills as f64;

        report
    }

    /// Shorthand for `evaluate(routes).total`.
    pub fn fitness(&self, routes: &[Route]) -> f64 {
        self.evaluate(routes).total
    }

    /// Store each route's projected fuel consumption on the route itself.
    pub fn stamp_fuel(&self, routes: &mut [Route]) {
        for route in routes.iter_mut() {
            if let Some(truck) = self.trucks.get(route.truck_id.as_str()) {
                route.fuel_consumed = route.walk(truck.tier, self.departure, truck.speed()).fuel;
            }
        }
    }
}

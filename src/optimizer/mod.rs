//! The optimizer contract and the pieces the three metaheuristics share.
//!
//! Each optimizer takes a snapshot of trucks, orders and network and returns
//! the best route set it found together with its fitness. Runs never mutate
//! the snapshot; infeasibility shows up as unassigned orders in the fitness.

pub mod ant_colony;
pub mod genetic;
pub mod particle_swarm;

pub use ant_colony::AntColony;
pub use genetic::GeneticOptimizer;
pub use particle_swarm::ParticleSwarm;

use jiff::civil::DateTime;
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::OptimizerConfig;
use crate::error::ConfigError;
use crate::fitness::{FitnessEvaluator, FitnessReport, FitnessWeights};
use crate::network::{Location, Network};
use crate::order::Order;
use crate::route::{Route, SERVICE_TIME};
use crate::split::{Split, SplitPolicy};
use crate::truck::Truck;
use crate::utils::SearchStatistics;

/// Cooperative cancellation flag, polled between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Non-empty routes, one per truck that got work.
    pub routes: Vec<Route>,
    pub fitness: f64,
    pub report: FitnessReport,
    /// The orders the plan was built for, after splitting, with
    /// `assigned_truck` filled in for planned ones.
    pub orders: Vec<Order>,
    pub statistics: SearchStatistics,
}

impl Plan {
    pub fn unassigned_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.assigned_truck.is_none())
    }

    pub fn route_for(&self, truck_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.truck_id == truck_id)
    }

    /// A network without a main depot cannot host any route.
    pub(crate) fn without_main_depot(orders: &[Order], statistics: SearchStatistics) -> Plan {
        log::warn!("network has no main depot, nothing can be planned");
        Plan {
            routes: Vec::new(),
            fitness: f64::INFINITY,
            report: FitnessReport {
                total: f64::INFINITY,
                ..FitnessReport::default()
            },
            orders: orders.to_vec(),
            statistics,
        }
    }
}

/// Common interface of the ant-colony, genetic and particle-swarm optimizers.
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn optimize(
        &self,
        trucks: &[Truck],
        orders: &[Order],
        network: &Network,
        now: DateTime,
        cancel: &CancellationToken,
    ) -> Plan;
}

/// Build the optimizer selected by `config`, rejecting invalid parameters.
pub fn build_optimizer(config: &OptimizerConfig) -> Result<Box<dyn Optimizer>, ConfigError> {
    let optimizer: Box<dyn Optimizer> = match config {
        OptimizerConfig::AntColony(c) => Box::new(AntColony::new(c.clone())?),
        OptimizerConfig::Genetic(c) => Box::new(GeneticOptimizer::new(c.clone())?),
        OptimizerConfig::ParticleSwarm(c) => Box::new(ParticleSwarm::new(c.clone())?),
    };
    Ok(optimizer)
}

pub(crate) fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// The snapshot one run works on: eligible trucks, pending split orders.
pub(crate) struct PlanningContext<'a> {
    pub trucks: Vec<Truck>,
    pub orders: Vec<Order>,
    pub network: &'a Network,
    pub now: DateTime,
    pub main_depot: Location,
}

impl<'a> PlanningContext<'a> {
    pub fn new(
        trucks: &[Truck],
        orders: &[Order],
        network: &'a Network,
        now: DateTime,
        split: SplitPolicy,
    ) -> Option<Self> {
        let main_depot = network.main_depot()?.location;

        let trucks: Vec<Truck> = trucks
            .iter()
            .cloned()
            .map(|mut truck| {
                truck.advance(now);
                truck
            })
            .filter(|truck| truck.is_eligible(now))
            .collect();

        let pending: Vec<Order> = orders
            .iter()
            .filter(|o| o.is_pending(now))
            .cloned()
            .collect();
        let orders = Split::split_all(&pending, split);

        debug!(
            "planning {} orders ({} after split) on {} eligible trucks",
            pending.len(),
            orders.len(),
            trucks.len()
        );

        Some(PlanningContext {
            trucks,
            orders,
            network,
            now,
            main_depot,
        })
    }

    pub fn evaluator(&self, weights: FitnessWeights) -> FitnessEvaluator<'_> {
        FitnessEvaluator::new(weights, &self.trucks, &self.orders, self.now)
    }

    /// Nothing to plan: no truck or no order.
    pub fn is_trivial(&self) -> bool {
        self.trucks.is_empty() || self.orders.is_empty()
    }

    /// Decode an order-to-truck assignment. `genes[i]` is a truck index or a
    /// negative value for "unassigned".
    ///
    /// Each truck visits its orders in nearest-neighbour order from its current
    /// location and returns to the main depot. Orders that cannot be reached
    /// given the blockages at the projected driving time are dropped.
    pub fn decode_assignment(&self, genes: &[i32]) -> Vec<Route> {
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); self.trucks.len()];
        for (order_idx, &gene) in genes.iter().enumerate() {
            if gene >= 0 && (gene as usize) < self.trucks.len() {
                buckets[gene as usize].push(order_idx);
            }
        }

        self.trucks
            .iter()
            .zip(buckets)
            .map(|(truck, bucket)| self.nearest_neighbor_route(truck, bucket))
            .collect()
    }

    fn nearest_neighbor_route(&self, truck: &Truck, mut remaining: Vec<usize>) -> Route {
        let mut route = Route::new(truck.id.clone(), truck.location, self.main_depot);
        let mut position = truck.location;
        let mut clock = self.now;

        while let Some(slot) = (0..remaining.len())
            .min_by_key(|&s| self.orders[remaining[s]].location.manhattan(&position))
        {
            let order_idx = remaining.swap_remove(slot);
            let order = &self.orders[order_idx];
            let path = self
                .network
                .find_path_timed(position, order.location, clock, truck.speed());
            if path.is_empty() {
                continue;
            }

            let length = (path.len() - 1) as f64;
            clock = clock
                .saturating_add(Network::travel_time(length, truck.speed()))
                .saturating_add(SERVICE_TIME);
            position = order.location;
            route.push_delivery(order);
        }

        route
    }

    /// Turn the best route set into a [`Plan`]: trace real grid paths, drop
    /// routes without deliveries and record the truck assignment on each order.
    pub fn finish(
        &self,
        mut routes: Vec<Route>,
        weights: FitnessWeights,
        mut statistics: SearchStatistics,
    ) -> Plan {
        let speeds: HashMap<&str, f64> = self
            .trucks
            .iter()
            .map(|t| (t.id.as_str(), t.speed()))
            .collect();

        routes.retain(|r| !r.is_empty());
        for route in routes.iter_mut() {
            let speed = speeds.get(route.truck_id.as_str()).copied().unwrap_or(0.0);
            if !route.trace_path(self.network, self.now, speed) {
                debug!("route of truck {} has an unreachable leg", route.truck_id);
            }
        }

        let evaluator = self.evaluator(weights);
        evaluator.stamp_fuel(&mut routes);
        let report = evaluator.evaluate(&routes);

        let mut orders = self.orders.clone();
        let assignment: HashMap<&str, &str> = routes
            .iter()
            .flat_map(|r| r.order_ids().map(move |id| (id, r.truck_id.as_str())))
            .collect();
        for order in orders.iter_mut() {
            order.assigned_truck = assignment.get(order.id.as_str()).map(|t| t.to_string());
        }

        statistics.best_fitness = report.total;

        Plan {
            routes,
            fitness: report.total,
            report,
            orders,
            statistics,
        }
    }
}

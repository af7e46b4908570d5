//! Max-Min Ant System over depots, order locations and truck start points.
//!
//! Every ant builds a complete route set: trucks take turns extending their
//! route with a feasible next stop chosen by the pseudo-random-proportional
//! rule, detouring to a depot whenever the fuel would not cover the next hop.
//! Ants of one iteration are built in parallel against a frozen pheromone
//! matrix, which is updated once they are all done.

use jiff::civil::DateTime;
use log::{debug, info, trace};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::config::AntColonyConfig;
use crate::error::ConfigError;
use crate::fitness::FitnessEvaluator;
use crate::network::{Depot, Location, Network};
use crate::order::Order;
use crate::route::{Route, SERVICE_TIME};
use crate::truck::{fuel_for, Truck, GLP_TONNES_PER_M3};
use crate::utils::SearchStatistics;

use super::{make_rng, CancellationToken, Optimizer, Plan, PlanningContext};

/// Exploitation probability reached at the end of the run.
const Q0_CEILING: f64 = 0.95;
/// Steepness of the logistic q0 schedule.
const Q0_STEEPNESS: f64 = 10.0;
/// A pheromone row is dominant when its runner-up is below this share of its maximum.
const DOMINANCE_RATIO: f64 = 0.95;
/// Share of dominant rows needed to call the matrix converged.
const CONVERGED_ROWS: f64 = 0.85;
/// Number of recorded improvements inspected for stagnation.
const STAGNATION_WINDOW: usize = 10;
/// Relative spread of those improvements below which the search has stalled.
const STAGNATION_SPREAD: f64 = 0.001;

pub struct AntColony {
    config: AntColonyConfig,
}

/// Nodes of the construction graph and their static desirability.
struct Graph {
    nodes: Vec<Location>,
    index: HashMap<Location, usize>,
    /// η(i,j) = 1 / (d(i,j) + 0.1), zero on the diagonal
    heuristic: Vec<Vec<f64>>,
    /// Orders waiting at each location
    orders_at: HashMap<Location, Vec<usize>>,
}

impl Graph {
    fn new(ctx: &PlanningContext<'_>) -> Self {
        let mut nodes: Vec<Location> = Vec::new();
        let mut index = HashMap::new();
        let locations = ctx
            .network
            .depots
            .iter()
            .map(|d| d.location)
            .chain(ctx.orders.iter().map(|o| o.location))
            .chain(ctx.trucks.iter().map(|t| t.location));
        for location in locations {
            index.entry(location).or_insert_with(|| {
                nodes.push(location);
                nodes.len() - 1
            });
        }

        let n = nodes.len();
        let mut heuristic = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    heuristic[i][j] = 1.0 / (nodes[i].manhattan(&nodes[j]) as f64 + 0.1);
                }
            }
        }

        let mut orders_at: HashMap<Location, Vec<usize>> = HashMap::new();
        for (i, order) in ctx.orders.iter().enumerate() {
            orders_at.entry(order.location).or_default().push(i);
        }

        Graph {
            nodes,
            index,
            heuristic,
            orders_at,
        }
    }

    fn node(&self, location: &Location) -> usize {
        self.index[location]
    }
}

/// Pheromone matrix with Max-Min bounds.
struct Pheromones {
    tau: Vec<Vec<f64>>,
    min: f64,
    max: f64,
}

impl Pheromones {
    fn new(n: usize, initial: f64) -> Self {
        let max = 1.0 / initial;
        Pheromones {
            tau: vec![vec![initial; n]; n],
            min: 0.1 * max,
            max,
        }
    }

    fn update(&mut self, ants: &[AntSolution], best: Option<&AntSolution>, evaporation: f64) {
        for row in self.tau.iter_mut() {
            for value in row.iter_mut() {
                *value *= 1.0 - evaporation;
            }
        }

        for ant in ants {
            self.deposit(&ant.edges, Self::reward(ant.fitness));
        }
        if let Some(best) = best {
            self.deposit(&best.edges, 2.0 * Self::reward(best.fitness));
        }

        for row in self.tau.iter_mut() {
            for value in row.iter_mut() {
                *value = value.clamp(self.min, self.max);
            }
        }
    }

    fn reward(fitness: f64) -> f64 {
        1.0 / (fitness.max(0.0) + 0.1)
    }

    fn deposit(&mut self, edges: &[(usize, usize)], amount: f64) {
        for &(i, j) in edges {
            self.tau[i][j] += amount;
            self.tau[j][i] += amount;
        }
    }

    /// Share of rows whose strongest edge clearly dominates the runner-up.
    fn dominant_share(&self) -> f64 {
        let rows = self.tau.len();
        if rows < 2 {
            return 1.0;
        }
        let dominant = self
            .tau
            .iter()
            .filter(|row| {
                let (mut first, mut second) = (f64::MIN, f64::MIN);
                for &v in row.iter() {
                    if v > first {
                        second = first;
                        first = v;
                    } else if v > second {
                        second = v;
                    }
                }
                second < DOMINANCE_RATIO * first
            })
            .count();
        dominant as f64 / rows as f64
    }
}

/// One ant's route set.
#[derive(Clone)]
struct AntSolution {
    routes: Vec<Route>,
    edges: Vec<(usize, usize)>,
    fitness: f64,
}

#[derive(Debug, Clone, Copy)]
enum Stop {
    Order(usize),
    Depot(usize),
}

/// Position and resources of the truck an ant is currently routing.
struct TruckWalk {
    position: Location,
    clock: DateTime,
    glp: f64,
    fuel: f64,
    at_depot: bool,
}

/// Read-only state shared by all ants of an iteration.
struct Colony<'c, 'n> {
    config: &'c AntColonyConfig,
    ctx: &'c PlanningContext<'n>,
    graph: &'c Graph,
    pheromones: &'c Pheromones,
    evaluator: &'c FitnessEvaluator<'c>,
    q0: f64,
}

impl Colony<'_, '_> {
    fn build_ant(&self, seed: u64) -> AntSolution {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut served = vec![false; self.ctx.orders.len()];
        let mut depots = self.ctx.network.depots.clone();
        let mut edges = Vec::new();

        let mut truck_order: Vec<usize> = (0..self.ctx.trucks.len()).collect();
        truck_order.shuffle(&mut rng);

        let mut routes: Vec<Route> = truck_order
            .into_iter()
            .map(|t| {
                let truck = &self.ctx.trucks[t];
                self.build_route(truck, &mut served, &mut depots, &mut edges, &mut rng)
            })
            .collect();
        routes.sort_by(|a, b| a.truck_id.cmp(&b.truck_id));

        let fitness = self.evaluator.fitness(&routes);
        AntSolution {
            routes,
            edges,
            fitness,
        }
    }

    fn build_route<R: Rng>(
        &self,
        truck: &Truck,
        served: &mut [bool],
        depots: &mut [Depot],
        edges: &mut Vec<(usize, usize)>,
        rng: &mut R,
    ) -> Route {
        let ctx = self.ctx;
        let mut route = Route::new(truck.id.clone(), truck.location, ctx.main_depot);
        let mut walk = TruckWalk {
            position: truck.location,
            clock: ctx.now,
            glp: truck.glp_level(),
            fuel: truck.fuel_level(),
            at_depot: false,
        };

        // A truck parked at a depot leaves with a full tank
        if let Some(depot) = depots.iter_mut().find(|d| d.location == truck.location) {
            let wanted = truck.glp_capacity() - walk.glp;
            let drawn = wanted.min(depot.available()).max(0.0);
            if depot.withdraw(drawn) {
                walk.glp += drawn;
            }
            walk.at_depot = true;
        }

        let mut unreachable: HashSet<Location> = HashSet::new();
        let max_steps = 2 * ctx.orders.len() + depots.len() + 4;

        for _ in 0..max_steps {
            // Parts waiting at the current location are served on the spot
            if let Some(order_idx) = self.order_here(&walk, served) {
                self.deliver(&mut walk, &mut route, order_idx, served);
                continue;
            }

            let candidates = self.candidates(truck, &walk, served, depots, &unreachable);
            if candidates.is_empty() {
                break;
            }

            let stop = self.choose(&walk, &candidates, rng);
            let target = self.stop_location(stop, depots);
            let weight = truck.tier.tare() + walk.glp * GLP_TONNES_PER_M3;
            let hop = walk.position.manhattan(&target) as f64;

            if walk.fuel < fuel_for(hop, weight) && !matches!(stop, Stop::Depot(_)) {
                match self.nearest_depot_index(&walk.position, depots) {
                    Some(depot_idx) if depots[depot_idx].location != walk.position => {
                        trace!("truck {} detours to refuel", truck.id);
                        if !self.travel(truck, &mut walk, depots[depot_idx].location, edges) {
                            unreachable.insert(depots[depot_idx].location);
                            continue;
                        }
                        self.restock(truck, &mut walk, &mut route, depot_idx, depots);
                    }
                    _ => {
                        unreachable.insert(target);
                    }
                }
                continue;
            }

            if !self.travel(truck, &mut walk, target, edges) {
                unreachable.insert(target);
                continue;
            }

            match stop {
                Stop::Order(order_idx) => self.deliver(&mut walk, &mut route, order_idx, served),
                Stop::Depot(depot_idx) => self.restock(truck, &mut walk, &mut route, depot_idx, depots),
            }
        }

        let from = self.graph.node(&walk.position);
        let to = self.graph.node(&ctx.main_depot);
        if from != to {
            edges.push((from, to));
        }
        route
    }

    fn order_here(&self, walk: &TruckWalk, served: &[bool]) -> Option<usize> {
        self.best_part_at(&walk.position, walk, served, walk.clock)
    }

    /// The largest unserved part at `location` that fits the tank and can be
    /// reached by its deadline when arriving at `arrival`.
    fn best_part_at(
        &self,
        location: &Location,
        walk: &TruckWalk,
        served: &[bool],
        arrival: DateTime,
    ) -> Option<usize> {
        self.graph
            .orders_at
            .get(location)?
            .iter()
            .copied()
            .filter(|&i| !served[i])
            .filter(|&i| {
                let order: &Order = &self.ctx.orders[i];
                order.volume <= walk.glp + 1e-9 && arrival <= order.deadline
            })
            .max_by(|&a, &b| {
                self.ctx.orders[a]
                    .volume
                    .total_cmp(&self.ctx.orders[b].volume)
            })
    }

    fn candidates(
        &self,
        truck: &Truck,
        walk: &TruckWalk,
        served: &[bool],
        depots: &[Depot],
        unreachable: &HashSet<Location>,
    ) -> Vec<Stop> {
        let mut stops = Vec::new();

        for location in self.graph.orders_at.keys() {
            if *location == walk.position || unreachable.contains(location) {
                continue;
            }
            let hop = walk.position.manhattan(location) as f64;
            let arrival = walk.clock.saturating_add(Network::travel_time(hop, truck.speed()));
            if let Some(order_idx) = self.best_part_at(location, walk, served, arrival) {
                stops.push(Stop::Order(order_idx));
            }
        }

        let work_left = served
            .iter()
            .zip(self.ctx.orders.iter())
            .any(|(s, order)| !s && !unreachable.contains(&order.location));
        if work_left && !walk.at_depot {
            for (i, depot) in depots.iter().enumerate() {
                if depot.location != walk.position && !unreachable.contains(&depot.location) {
                    stops.push(Stop::Depot(i));
                }
            }
        }

        // Deterministic candidate order keeps seeded runs reproducible
        stops.sort_by_key(|stop| match *stop {
            Stop::Order(i) => (0, i),
            Stop::Depot(i) => (1, i),
        });
        stops
    }

    /// Pseudo-random-proportional rule over τ^α·η^β.
    fn choose<R: Rng>(&self, walk: &TruckWalk, candidates: &[Stop], rng: &mut R) -> Stop {
        let from = self.graph.node(&walk.position);
        let scores: Vec<f64> = candidates
            .iter()
            .map(|stop| {
                let to = self.graph.node(&self.stop_location_static(*stop));
                self.pheromones.tau[from][to].powf(self.config.alpha)
                    * self.graph.heuristic[from][to].powf(self.config.beta)
            })
            .collect();

        if rng.gen::<f64>() < self.q0 {
            let best = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0, |(i, _)| i);
            return candidates[best];
        }

        let total: f64 = scores.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return candidates[rng.gen_range(0..candidates.len())];
        }
        let mut threshold = rng.gen::<f64>() * total;
        for (stop, score) in candidates.iter().zip(scores.iter()) {
            threshold -= score;
            if threshold <= 0.0 {
                return *stop;
            }
        }
        candidates[candidates.len() - 1]
    }

    fn stop_location(&self, stop: Stop, depots: &[Depot]) -> Location {
        match stop {
            Stop::Order(i) => self.ctx.orders[i].location,
            Stop::Depot(i) => depots[i].location,
        }
    }

    fn stop_location_static(&self, stop: Stop) -> Location {
        self.stop_location(stop, &self.ctx.network.depots)
    }

    fn nearest_depot_index(&self, location: &Location, depots: &[Depot]) -> Option<usize> {
        depots
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| d.location.manhattan(location))
            .map(|(i, _)| i)
    }

    /// Drive to `target` along the time-aware shortest path. Fails when the
    /// target is unreachable or the fuel would run out on the way.
    fn travel(
        &self,
        truck: &Truck,
        walk: &mut TruckWalk,
        target: Location,
        edges: &mut Vec<(usize, usize)>,
    ) -> bool {
        let path = self
            .ctx
            .network
            .find_path_timed(walk.position, target, walk.clock, truck.speed());
        if path.is_empty() {
            return false;
        }

        let length = (path.len() - 1) as f64;
        let burn = fuel_for(length, truck.tier.tare() + walk.glp * GLP_TONNES_PER_M3);
        if burn > walk.fuel {
            return false;
        }

        edges.push((self.graph.node(&walk.position), self.graph.node(&target)));
        walk.fuel -= burn;
        walk.clock = walk.clock.saturating_add(Network::travel_time(length, truck.speed()));
        walk.position = target;
        walk.at_depot = false;
        true
    }

    fn deliver(&self, walk: &mut TruckWalk, route: &mut Route, order_idx: usize, served: &mut [bool]) {
        let order = &self.ctx.orders[order_idx];
        served[order_idx] = true;
        walk.glp = (walk.glp - order.volume).max(0.0);
        walk.clock = walk.clock.saturating_add(SERVICE_TIME);
        walk.at_depot = false;
        route.push_delivery(order);
    }

    fn restock(
        &self,
        truck: &Truck,
        walk: &mut TruckWalk,
        route: &mut Route,
        depot_idx: usize,
        depots: &mut [Depot],
    ) {
        let depot = &mut depots[depot_idx];
        let wanted = truck.glp_capacity() - walk.glp;
        let drawn = wanted.min(depot.available()).max(0.0);
        if depot.withdraw(drawn) {
            walk.glp += drawn;
        }
        walk.fuel = truck.fuel_capacity();
        walk.at_depot = true;
        route.push_depot(depot);
    }
}

impl AntColony {
    pub fn new(config: AntColonyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(AntColony { config })
    }

    pub fn config(&self) -> &AntColonyConfig {
        &self.config
    }

    /// Exploitation probability at `iteration`: a logistic rise from the
    /// configured q0 towards 0.95 over the iteration budget.
    pub fn q0_at(&self, iteration: usize) -> f64 {
        let base = self.config.q0;
        if base >= Q0_CEILING {
            return base;
        }
        let span = self.config.num_iterations.saturating_sub(1).max(1) as f64;
        let progress = iteration as f64 / span;
        base + (Q0_CEILING - base) / (1.0 + (-Q0_STEEPNESS * (progress - 0.5)).exp())
    }

    fn has_stagnated(history: &[f64]) -> bool {
        if history.len() < STAGNATION_WINDOW {
            return false;
        }
        let recent = &history[history.len() - STAGNATION_WINDOW..];
        let (min, max) = recent
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        (max - min) / max.abs().max(f64::EPSILON) < STAGNATION_SPREAD
    }

    /// Apply 2-opt to each route of the best set, keeping the result only if
    /// the whole set gets better.
    fn polish(ctx: &PlanningContext<'_>, evaluator: &FitnessEvaluator<'_>, best: &mut AntSolution) {
        let mut candidate = best.routes.clone();
        let mut changed = false;
        for route in candidate.iter_mut() {
            changed |= route.resequence(ctx.network, ctx.now);
        }
        if changed {
            let fitness = evaluator.fitness(&candidate);
            if fitness < best.fitness {
                debug!("2-opt improved best from {:.2} to {:.2}", best.fitness, fitness);
                best.routes = candidate;
                best.fitness = fitness;
            }
        }
    }
}

impl Optimizer for AntColony {
    fn name(&self) -> &'static str {
        "ant_colony"
    }

    fn optimize(
        &self,
        trucks: &[Truck],
        orders: &[Order],
        network: &Network,
        now: DateTime,
        cancel: &CancellationToken,
    ) -> Plan {
        let start = Instant::now();
        let mut statistics = SearchStatistics::new(self.name());

        let Some(ctx) = PlanningContext::new(trucks, orders, network, now, self.config.split) else {
            return Plan::without_main_depot(orders, statistics);
        };
        if ctx.is_trivial() {
            statistics.runtime = start.elapsed();
            return ctx.finish(Vec::new(), self.config.weights, statistics);
        }

        let mut rng = make_rng(self.config.seed);
        let graph = Graph::new(&ctx);
        let mut pheromones = Pheromones::new(graph.nodes.len(), self.config.initial_pheromone);
        let evaluator = ctx.evaluator(self.config.weights);

        let mut best: Option<AntSolution> = None;
        let mut history: Vec<f64> = Vec::new();

        for iteration in 0..self.config.num_iterations {
            if cancel.is_cancelled() {
                statistics.cancelled = true;
                break;
            }

            let colony = Colony {
                config: &self.config,
                ctx: &ctx,
                graph: &graph,
                pheromones: &pheromones,
                evaluator: &evaluator,
                q0: self.q0_at(iteration),
            };
            let seeds: Vec<u64> = (0..self.config.num_ants).map(|_| rng.gen()).collect();
            let ants: Vec<AntSolution> = seeds.par_iter().map(|&s| colony.build_ant(s)).collect();
            statistics.iterations = iteration + 1;

            let iteration_best = ants
                .iter()
                .min_by(|a, b| a.fitness.total_cmp(&b.fitness));
            if let Some(candidate) = iteration_best {
                if best.as_ref().map_or(true, |b| candidate.fitness < b.fitness) {
                    debug!(
                        "iteration {}: new best fitness {:.2}",
                        iteration, candidate.fitness
                    );
                    best = Some(candidate.clone());
                    history.push(candidate.fitness);
                    statistics.improvements += 1;
                }
            }

            pheromones.update(&ants, best.as_ref(), self.config.evaporation);

            if iteration + 1 >= self.config.min_iterations
                && pheromones.dominant_share() >= CONVERGED_ROWS
                && Self::has_stagnated(&history)
            {
                info!("ant colony converged after {} iterations", iteration + 1);
                statistics.stopped_early = true;
                break;
            }
        }

        let routes = match best {
            Some(mut best) => {
                Self::polish(&ctx, &evaluator, &mut best);
                best.routes
            }
            None => Vec::new(),
        };

        statistics.runtime = start.elapsed();
        let plan = ctx.finish(routes, self.config.weights, statistics);
        info!(
            "ant colony finished: fitness {:.2}, {} routes, {} iterations",
            plan.fitness,
            plan.routes.len(),
            plan.statistics.iterations
        );
        plan
    }
}

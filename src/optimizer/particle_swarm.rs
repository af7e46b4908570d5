//! Particle-swarm optimizer over a continuous relaxation of the assignment.
//!
//! Each particle holds one real coordinate per order. Rounding a coordinate
//! and clamping it into `[-1, trucks - 1]` gives the truck index, negative
//! meaning unassigned; the rounded vector is decoded exactly like a genetic
//! chromosome.

use jiff::civil::DateTime;
use log::{debug, info};
use rand::Rng;
use rayon::prelude::*;
use std::time::Instant;

use crate::config::ParticleSwarmConfig;
use crate::error::ConfigError;
use crate::network::Network;
use crate::order::Order;
use crate::route::Route;
use crate::truck::Truck;
use crate::utils::SearchStatistics;

use super::{make_rng, CancellationToken, Optimizer, Plan, PlanningContext};

/// Inertia weight reached at the last iteration.
const FINAL_INERTIA: f64 = 0.4;
/// Velocity bound per coordinate.
const MAX_VELOCITY: f64 = 1.0;
/// Smallest global-best improvement that counts as progress.
const MIN_IMPROVEMENT: f64 = 0.001;

#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: f64,
    routes: Vec<Route>,
    fitness: f64,
}

pub struct ParticleSwarm {
    config: ParticleSwarmConfig,
}

impl ParticleSwarm {
    pub fn new(config: ParticleSwarmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ParticleSwarm { config })
    }

    pub fn config(&self) -> &ParticleSwarmConfig {
        &self.config
    }

    /// Round each coordinate to a truck index; anything negative is unassigned.
    pub fn decode_position(position: &[f64], num_trucks: usize) -> Vec<i32> {
        let upper = num_trucks as f64 - 1.0;
        position
            .iter()
            .map(|&x| {
                let rounded = x.round().clamp(-1.0, upper.max(-1.0));
                if rounded < 0.0 {
                    -1
                } else {
                    rounded as i32
                }
            })
            .collect()
    }

    /// Inertia weight at `iteration`, decaying linearly to 0.4.
    pub fn inertia_at(&self, iteration: usize) -> f64 {
        let span = self.config.max_iterations.saturating_sub(1).max(1) as f64;
        let progress = (iteration as f64 / span).min(1.0);
        self.config.inertia - (self.config.inertia - FINAL_INERTIA) * progress
    }

    fn step<R: Rng>(
        &self,
        particle: &mut Particle,
        global_best: &[f64],
        inertia: f64,
        num_trucks: usize,
        rng: &mut R,
    ) {
        let upper = num_trucks as f64 + 0.5;
        for d in 0..particle.position.len() {
            let r1: f64 = rng.gen();
            let r2: f64 = rng.gen();
            let cognitive =
                self.config.cognitive * r1 * (particle.best_position[d] - particle.position[d]);
            let social = self.config.social * r2 * (global_best[d] - particle.position[d]);

            let velocity = (inertia * particle.velocity[d] + cognitive + social)
                .clamp(-MAX_VELOCITY, MAX_VELOCITY);
            particle.velocity[d] = velocity;
            particle.position[d] = (particle.position[d] + velocity).clamp(-0.5, upper);
        }
    }
}

impl Optimizer for ParticleSwarm {
    fn name(&self) -> &'static str {
        "particle_swarm"
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
        let evaluator = ctx.evaluator(self.config.weights);
        let num_trucks = ctx.trucks.len();
        let dimensions = ctx.orders.len();
        let upper = num_trucks as f64 + 0.5;

        let evaluate = |particle: &mut Particle| {
            let genes = Self::decode_position(&particle.position, num_trucks);
            particle.routes = ctx.decode_assignment(&genes);
            particle.fitness = evaluator.fitness(&particle.routes);
            if particle.fitness < particle.best_fitness {
                particle.best_fitness = particle.fitness;
                particle.best_position = particle.position.clone();
            }
        };

        let mut swarm: Vec<Particle> = (0..self.config.num_particles)
            .map(|_| {
                let position: Vec<f64> = (0..dimensions).map(|_| rng.gen_range(-0.5..upper)).collect();
                let velocity = (0..dimensions)
                    .map(|_| rng.gen_range(-MAX_VELOCITY..MAX_VELOCITY))
                    .collect();
                Particle {
                    best_position: position.clone(),
                    position,
                    velocity,
                    best_fitness: f64::INFINITY,
                    routes: Vec::new(),
                    fitness: f64::INFINITY,
                }
            })
            .collect();
        swarm.par_iter_mut().for_each(|p| evaluate(p));

        let Some(leader) = swarm
            .iter()
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
            .cloned()
        else {
            return ctx.finish(Vec::new(), self.config.weights, statistics);
        };
        let mut global_position = leader.position;
        let mut global_routes = leader.routes;
        let mut global_fitness = leader.fitness;
        let mut stagnant = 0;

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                statistics.cancelled = true;
                break;
            }

            let inertia = self.inertia_at(iteration);
            for particle in swarm.iter_mut() {
                self.step(particle, &global_position, inertia, num_trucks, &mut rng);
            }
            swarm.par_iter_mut().for_each(|p| evaluate(p));
            statistics.iterations = iteration + 1;

            let iteration_best = swarm.iter().min_by(|a, b| a.fitness.total_cmp(&b.fitness));
            let mut improvement = 0.0;
            if let Some(best) = iteration_best {
                if best.fitness < global_fitness {
                    improvement = global_fitness - best.fitness;
                    debug!("iteration {}: new global best {:.2}", iteration, best.fitness);
                    global_fitness = best.fitness;
                    global_position = best.position.clone();
                    global_routes = best.routes.clone();
                    statistics.improvements += 1;
                }
            }

            if improvement > MIN_IMPROVEMENT {
                stagnant = 0;
            } else {
                stagnant += 1;
            }

            if iteration + 1 >= self.config.min_iterations && stagnant >= self.config.stagnation_window
            {
                info!("swarm stagnated after {} iterations", iteration + 1);
                statistics.stopped_early = true;
                break;
            }
        }

        statistics.runtime = start.elapsed();
        let plan = ctx.finish(global_routes, self.config.weights, statistics);
        info!(
            "particle swarm finished: fitness {:.2}, {} routes, {} iterations",
            plan.fitness,
            plan.routes.len(),
            plan.statistics.iterations
        );
        plan
    }
}

//! Genetic optimizer over order-to-truck assignments.
//!
//! A chromosome holds one gene per order: the index of the truck serving it,
//! or -1 for "unassigned". Decoding groups orders by truck and sequences each
//! group by nearest neighbour from the truck's position to the main depot.

pub mod individual;
pub mod operators;
pub mod population;

use jiff::civil::DateTime;
use log::{debug, info};
use std::time::Instant;

use crate::config::GeneticConfig;
use crate::error::ConfigError;
use crate::network::Network;
use crate::order::Order;
use crate::truck::Truck;
use crate::utils::SearchStatistics;

use self::individual::UNASSIGNED;
use self::operators::Genetic;
use self::population::Population;
use super::{make_rng, CancellationToken, Optimizer, Plan, PlanningContext};

pub struct GeneticOptimizer {
    config: GeneticConfig,
    genetic: Genetic,
}

impl GeneticOptimizer {
    pub fn new(config: GeneticConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(GeneticOptimizer {
            config,
            genetic: Genetic,
        })
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// A constructive chromosome: orders by deadline, each given to the
    /// closest truck that still has room for it.
    fn greedy_genes(ctx: &PlanningContext<'_>) -> Vec<i32> {
        let mut room: Vec<f64> = ctx.trucks.iter().map(|t| t.glp_capacity()).collect();
        let mut genes = vec![UNASSIGNED; ctx.orders.len()];

        let mut by_deadline: Vec<usize> = (0..ctx.orders.len()).collect();
        by_deadline.sort_by_key(|&i| ctx.orders[i].deadline);

        for order_idx in by_deadline {
            let order = &ctx.orders[order_idx];
            let chosen = ctx
                .trucks
                .iter()
                .enumerate()
                .filter(|(t, _)| room[*t] >= order.volume)
                .min_by_key(|(_, truck)| truck.location.manhattan(&order.location))
                .map(|(t, _)| t);
            if let Some(t) = chosen {
                room[t] -= order.volume;
                genes[order_idx] = t as i32;
            }
        }
        genes
    }
}

impl Optimizer for GeneticOptimizer {
    fn name(&self) -> &'static str {
        "genetic"
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
        let decode = |genes: &[i32]| {
            let routes = ctx.decode_assignment(genes);
            let fitness = evaluator.fitness(&routes);
            (routes, fitness)
        };

        let num_trucks = ctx.trucks.len();
        let mut population = Population::new(&self.config);
        population.initialize(
            ctx.orders.len(),
            num_trucks,
            vec![Self::greedy_genes(&ctx)],
            &mut rng,
        );
        population.evaluate(&decode);

        let mut best_fitness = population.best().map_or(f64::INFINITY, |b| b.fitness);

        for generation in 0..self.config.max_generations {
            if cancel.is_cancelled() {
                statistics.cancelled = true;
                break;
            }

            population.next_generation(&self.genetic, num_trucks, &mut rng);
            population.evaluate(&decode);
            statistics.iterations = generation + 1;

            if let Some(best) = population.best() {
                if best.fitness < best_fitness {
                    debug!(
                        "generation {}: new best fitness {:.2} ({} of {} orders assigned)",
                        generation,
                        best.fitness,
                        best.assigned_count(),
                        best.genes.len()
                    );
                    best_fitness = best.fitness;
                    statistics.improvements += 1;
                }
            }

            if generation + 1 >= self.config.min_generations
                && population.relative_fitness_variance() < self.config.convergence_epsilon
            {
                info!("population converged after {} generations", generation + 1);
                statistics.stopped_early = true;
                break;
            }
        }

        let routes = population
            .best()
            .map(|best| best.routes.clone())
            .unwrap_or_default();

        statistics.runtime = start.elapsed();
        let plan = ctx.finish(routes, self.config.weights, statistics);
        info!(
            "genetic search finished: fitness {:.2}, {} routes, {} generations",
            plan.fitness,
            plan.routes.len(),
            plan.statistics.iterations
        );
        plan
    }
}

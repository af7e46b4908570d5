//! # GLP Routing
//!
//! Route planning for a fleet of GLP tank trucks on a city grid.
//!
//! The engine plans which truck serves which order and in what order, under
//! tank capacity, fuel range, delivery deadlines, time-dependent road
//! blockages and truck unavailability (breakdowns, scheduled maintenance).
//!
//! Three interchangeable metaheuristics search the space of assignments and
//! visiting orders: an ant colony (Max-Min Ant System), a genetic algorithm
//! and a particle swarm. They share the [`optimizer::Optimizer`] trait and the
//! fitness function in [`fitness`]. Finished plans can be walked forward in
//! time by the [`simulation::DeliverySimulator`], and independent runs can be
//! queued on a bounded worker pool through the [`runner::RunManager`].

pub mod config;
pub mod error;
pub mod fitness;
pub mod network;
pub mod optimizer;
pub mod order;
pub mod route;
pub mod runner;
pub mod simulation;
pub mod split;
pub mod truck;
pub mod utils;

pub use crate::config::{AntColonyConfig, GeneticConfig, OptimizerConfig, ParticleSwarmConfig};
pub use crate::error::{ConfigError, RunError};
pub use crate::network::{Location, Network};
pub use crate::optimizer::{build_optimizer, CancellationToken, Optimizer, Plan};
pub use crate::order::Order;
pub use crate::route::Route;
pub use crate::truck::Truck;

use jiff::civil::DateTime;

/// Run the optimizer selected by `config` once, to completion.
///
/// Invalid parameters are rejected before any work is done. An infeasible
/// instance is not an error: it yields a plan whose fitness carries the
/// penalties for whatever could not be served.
pub fn optimize(
    config: &OptimizerConfig,
    trucks: &[Truck],
    orders: &[Order],
    network: &Network,
    now: DateTime,
) -> Result<Plan, ConfigError> {
    let optimizer = build_optimizer(config)?;
    Ok(optimizer.optimize(trucks, orders, network, now, &CancellationToken::new()))
}

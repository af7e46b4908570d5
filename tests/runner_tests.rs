//! Tests for background runs on the run manager.

use glp_routing::error::RunError;
use glp_routing::network::{Depot, Location, Network};
use glp_routing::optimizer::{CancellationToken, Optimizer, Plan};
use glp_routing::runner::{PlanningRequest, RunManager, RunStatus};
use glp_routing::truck::{Truck, TruckTier};
use glp_routing::{AntColonyConfig, GeneticConfig, OptimizerConfig, Order};
use jiff::civil::{self, DateTime};
use uuid::Uuid;

fn create_test_request() -> PlanningRequest {
    let now = civil::date(2025, 1, 1).at(8, 0, 0, 0);
    let depot = Location::new(12, 8);
    PlanningRequest {
        trucks: vec![Truck::new("TA01", TruckTier::TA, depot)],
        orders: vec![Order::new("o1", "c1", Location::new(17, 8), 10.0, now, 4)],
        network: Network::new(70, 50, vec![Depot::main("central", depot)]),
        now,
    }
}

fn small_genetic() -> OptimizerConfig {
    OptimizerConfig::Genetic(
        GeneticConfig::new()
            .with_population_size(10)
            .with_max_generations(10)
            .with_seed(5),
    )
}

#[test]
fn test_run_completes() {
    let manager = RunManager::new(2).unwrap();
    let id = manager.submit(&small_genetic(), create_test_request()).unwrap();

    assert_eq!(manager.wait(id).unwrap(), RunStatus::Completed);
    assert_eq!(manager.status(id), Some(RunStatus::Completed));

    let plan = manager.result(id).unwrap().expect("completed run has a plan");
    assert_eq!(plan.routes.len(), 1);
    assert_eq!(plan.routes[0].distance, 10.0);
}

#[test]
fn test_invalid_config_is_rejected_before_queueing() {
    let manager = RunManager::new(1).unwrap();
    let config = OptimizerConfig::AntColony(AntColonyConfig::new().with_num_ants(0));

    let result = manager.submit(&config, create_test_request());
    assert!(matches!(result, Err(RunError::Config(_))));
    assert!(manager.runs().is_empty());
}

#[test]
fn test_unknown_run() {
    let manager = RunManager::new(1).unwrap();
    let id = Uuid::new_v4();

    assert_eq!(manager.status(id), None);
    assert!(!manager.cancel(id));
    assert_eq!(manager.wait(id), Err(RunError::UnknownRun(id)));
    assert!(matches!(manager.result(id), Err(RunError::UnknownRun(_))));
}

#[test]
fn test_cancelled_run_keeps_best_plan() {
    let manager = RunManager::new(1).unwrap();
    let mut aco = AntColonyConfig::new()
        .with_num_ants(2)
        .with_num_iterations(1_000_000)
        .with_seed(9);
    aco.min_iterations = 1_000_000;
    let id = manager
        .submit(&OptimizerConfig::AntColony(aco), create_test_request())
        .unwrap();

    assert!(manager.cancel(id));
    assert_eq!(manager.wait(id).unwrap(), RunStatus::Completed);

    let plan = manager.result(id).unwrap().expect("cancelled run has a plan");
    assert!(plan.statistics.cancelled);
    assert!(plan.statistics.iterations < 1_000_000);
}

#[test]
fn test_independent_runs() {
    let manager = RunManager::new(2).unwrap();
    let ids: Vec<Uuid> = (0..4)
        .map(|_| manager.submit(&small_genetic(), create_test_request()).unwrap())
        .collect();

    for id in &ids {
        assert_eq!(manager.wait(*id).unwrap(), RunStatus::Completed);
    }
    assert_eq!(manager.runs().len(), 4);

    let fitness: Vec<f64> = ids
        .iter()
        .map(|id| manager.result(*id).unwrap().map(|p| p.fitness).unwrap_or(f64::NAN))
        .collect();
    assert!(fitness.windows(2).all(|w| w[0] == w[1]));

    assert!(manager.remove(ids[0]));
    assert_eq!(manager.status(ids[0]), None);
    assert_eq!(manager.runs().len(), 3);
}

/// An optimizer that fails partway through a run.
struct FailingOptimizer;

impl Optimizer for FailingOptimizer {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn optimize(
        &self,
        _trucks: &[Truck],
        _orders: &[Order],
        _network: &Network,
        _now: DateTime,
        _cancel: &CancellationToken,
    ) -> Plan {
        panic!("demand table corrupted");
    }
}

#[test]
fn test_panicking_run_fails() {
    let manager = RunManager::new(1).unwrap();
    let id = manager.submit_optimizer(Box::new(FailingOptimizer), create_test_request());

    let status = manager.wait(id).unwrap();
    assert_eq!(status, RunStatus::Failed("demand table corrupted".to_string()));
    assert!(matches!(
        manager.result(id),
        Err(RunError::Failed { message, .. }) if message == "demand table corrupted"
    ));

    // The worker survives and takes the next run
    let next = manager.submit(&small_genetic(), create_test_request()).unwrap();
    assert_eq!(manager.wait(next).unwrap(), RunStatus::Completed);
}

//! Integration tests for the three optimizers.

use glp_routing::network::{Blockage, Depot, Location, Network};
use glp_routing::optimizer::{
    AntColony, CancellationToken, GeneticOptimizer, Optimizer, ParticleSwarm, Plan,
};
use glp_routing::truck::{Truck, TruckTier};
use glp_routing::{AntColonyConfig, GeneticConfig, Order, ParticleSwarmConfig};
use jiff::civil::{self, DateTime};
use jiff::SignedDuration;

fn start() -> DateTime {
    civil::date(2025, 1, 1).at(8, 0, 0, 0)
}

fn main_depot() -> Location {
    Location::new(12, 8)
}

fn create_test_network() -> Network {
    Network::new(
        70,
        50,
        vec![
            Depot::main("central", main_depot()),
            Depot::intermediate("north", Location::new(42, 42), 160.0),
            Depot::intermediate("east", Location::new(63, 3), 160.0),
        ],
    )
}

/// Small, seeded instances of all three optimizers.
fn create_optimizers() -> Vec<Box<dyn Optimizer>> {
    vec![
        Box::new(
            AntColony::new(
                AntColonyConfig::new()
                    .with_num_ants(10)
                    .with_num_iterations(20)
                    .with_seed(7),
            )
            .unwrap(),
        ),
        Box::new(
            GeneticOptimizer::new(
                GeneticConfig::new()
                    .with_population_size(20)
                    .with_max_generations(30)
                    .with_seed(7),
            )
            .unwrap(),
        ),
        Box::new(
            ParticleSwarm::new(
                ParticleSwarmConfig::new()
                    .with_num_particles(15)
                    .with_max_iterations(30)
                    .with_seed(7),
            )
            .unwrap(),
        ),
    ]
}

fn run(optimizer: &dyn Optimizer, trucks: &[Truck], orders: &[Order], network: &Network) -> Plan {
    optimizer.optimize(trucks, orders, network, start(), &CancellationToken::new())
}

/// A mixed fleet at the main depot and orders spread over the city.
fn create_moderate_scenario() -> (Vec<Truck>, Vec<Order>) {
    let trucks = vec![
        Truck::new("TA01", TruckTier::TA, main_depot()),
        Truck::new("TB01", TruckTier::TB, main_depot()),
        Truck::new("TC01", TruckTier::TC, main_depot()),
        Truck::new("TD01", TruckTier::TD, main_depot()),
    ];
    let orders = (0..10)
        .map(|i| {
            let location = Location::new(5 + (i * 7) % 60, 3 + (i * 11) % 40);
            let volume = 2.0 + (i % 4) as f64 * 3.0;
            Order::new(format!("o{}", i), format!("c{}", i), location, volume, start(), 24)
        })
        .collect();
    (trucks, orders)
}

#[test]
fn test_single_order_round_trip() {
    let network = create_test_network();
    let trucks = vec![Truck::new("TA01", TruckTier::TA, main_depot())];
    let orders = vec![Order::new("o1", "c1", Location::new(17, 8), 10.0, start(), 4)];

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);

        assert_eq!(plan.routes.len(), 1, "{}", optimizer.name());
        let route = &plan.routes[0];
        assert_eq!(route.truck_id, "TA01");
        assert_eq!(route.order_ids().collect::<Vec<_>>(), vec!["o1"]);
        assert_eq!(route.distance, 10.0, "{}", optimizer.name());
        assert_eq!(plan.report.delay_minutes, 0.0);
        assert_eq!(plan.report.unassigned_orders, 0);
        assert_eq!(plan.report.overload, 0.0);
        assert_eq!(plan.orders[0].assigned_truck.as_deref(), Some("TA01"));
        assert!(plan.fitness.is_finite());
    }
}

#[test]
fn test_oversized_order_is_split() {
    let network = create_test_network();
    let trucks = vec![
        Truck::new("TA01", TruckTier::TA, main_depot()),
        Truck::new("TA02", TruckTier::TA, main_depot()),
    ];
    let orders = vec![Order::new("big", "c1", Location::new(20, 12), 30.0, start(), 8)];

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);

        assert!(plan.orders.len() > 1);
        let total: f64 = plan.orders.iter().map(|o| o.volume).sum();
        assert!((total - 30.0).abs() < 1e-9);
        for part in &plan.orders {
            assert_eq!(part.base_id, "big");
            assert!(part.volume <= 25.0);
        }
    }
}

#[test]
fn test_isolated_order_is_unassigned() {
    let mut network = create_test_network();
    let target = Location::new(17, 8);
    network.add_blockage(Blockage::new(
        start() - SignedDuration::from_hours(24),
        start() + SignedDuration::from_hours(24 * 30),
        target.neighbors(),
    ));

    let trucks = vec![Truck::new("TA01", TruckTier::TA, main_depot())];
    let orders = vec![
        Order::new("cut_off", "c1", target, 5.0, start(), 4),
        Order::new("open", "c2", Location::new(12, 14), 5.0, start(), 4),
    ];

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);

        assert_eq!(plan.report.unassigned_orders, 1, "{}", optimizer.name());
        let unassigned: Vec<&str> = plan.unassigned_orders().map(|o| o.id.as_str()).collect();
        assert_eq!(unassigned, vec!["cut_off"]);
        assert!(plan.fitness >= 5_000.0);
    }
}

#[test]
fn test_overload_is_reflected_in_fitness() {
    let network = create_test_network();
    let (trucks, orders) = create_moderate_scenario();
    let capacities: std::collections::HashMap<&str, f64> =
        trucks.iter().map(|t| (t.id.as_str(), t.glp_capacity())).collect();

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);

        let over_capacity = plan.routes.iter().any(|route| {
            let capacity = capacities[route.truck_id.as_str()];
            route.trip_loads().iter().any(|load| *load > capacity + 1e-9)
        });
        if over_capacity {
            assert!(plan.report.overload > 0.0, "{}", optimizer.name());
        } else {
            assert_eq!(plan.report.overload, 0.0);
        }
        assert!(plan.statistics.iterations > 0);
    }
}

#[test]
fn test_routes_end_at_main_depot() {
    let network = create_test_network();
    let (trucks, orders) = create_moderate_scenario();

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);
        for route in &plan.routes {
            assert_eq!(route.destination, main_depot());
            assert!(!route.is_empty());
            assert_eq!(route.path.first(), Some(&route.origin));
            assert_eq!(route.path.last(), Some(&main_depot()));
        }
    }
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let network = create_test_network();
    let (trucks, orders) = create_moderate_scenario();

    for (a, b) in create_optimizers().into_iter().zip(create_optimizers()) {
        let first = run(a.as_ref(), &trucks, &orders, &network);
        let second = run(b.as_ref(), &trucks, &orders, &network);
        assert_eq!(first.fitness, second.fitness, "{}", a.name());
    }
}

#[test]
fn test_no_trucks_leaves_everything_unassigned() {
    let network = create_test_network();
    let (_, orders) = create_moderate_scenario();

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &[], &orders, &network);
        assert!(plan.routes.is_empty());
        assert_eq!(plan.report.unassigned_orders, orders.len());
    }
}

#[test]
fn test_no_orders_gives_empty_plan() {
    let network = create_test_network();
    let (trucks, _) = create_moderate_scenario();

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &[], &network);
        assert!(plan.routes.is_empty());
        assert_eq!(plan.fitness, 0.0);
    }
}

#[test]
fn test_missing_main_depot() {
    let network = Network::new(20, 20, vec![Depot::intermediate("north", Location::new(5, 5), 50.0)]);
    let trucks = vec![Truck::new("TA01", TruckTier::TA, Location::new(5, 5))];
    let orders = vec![Order::new("o1", "c1", Location::new(8, 5), 5.0, start(), 4)];

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);
        assert!(plan.routes.is_empty());
        assert!(plan.fitness.is_infinite());
    }
}

#[test]
fn test_trucks_due_for_maintenance_are_not_planned() {
    let network = create_test_network();
    let trucks = vec![
        Truck::new("TA01", TruckTier::TA, main_depot())
            .with_next_maintenance(start() + SignedDuration::from_hours(6)),
        Truck::new("TB01", TruckTier::TB, main_depot()),
    ];
    let orders = vec![Order::new("o1", "c1", Location::new(17, 8), 10.0, start(), 4)];

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);
        assert!(plan.route_for("TA01").is_none());
        assert!(plan.route_for("TB01").is_some(), "{}", optimizer.name());
    }
}

#[test]
fn test_orders_received_later_are_ignored() {
    let network = create_test_network();
    let trucks = vec![Truck::new("TA01", TruckTier::TA, main_depot())];
    let later = start() + SignedDuration::from_hours(2);
    let orders = vec![
        Order::new("now", "c1", Location::new(17, 8), 5.0, start(), 4),
        Order::new("later", "c2", Location::new(12, 3), 5.0, later, 4),
    ];

    for optimizer in create_optimizers() {
        let plan = run(optimizer.as_ref(), &trucks, &orders, &network);
        assert_eq!(plan.orders.len(), 1);
        assert_eq!(plan.orders[0].id, "now");
    }
}

#[test]
fn test_cancelled_before_start() {
    let network = create_test_network();
    let (trucks, orders) = create_moderate_scenario();
    let cancel = CancellationToken::new();
    cancel.cancel();

    for optimizer in create_optimizers() {
        let plan = optimizer.optimize(&trucks, &orders, &network, start(), &cancel);
        assert!(plan.statistics.cancelled);
        assert_eq!(plan.statistics.iterations, 0);
    }
}

#[test]
fn test_q0_schedule_rises() {
    let colony = AntColony::new(AntColonyConfig::new().with_num_iterations(100)).unwrap();
    let first = colony.q0_at(0);
    let last = colony.q0_at(99);

    assert!(first >= 0.5 && first < 0.51);
    assert!(last > 0.94 && last <= 0.95);
    for i in 1..100 {
        assert!(colony.q0_at(i) >= colony.q0_at(i - 1));
    }
}

#[test]
fn test_inertia_decays_linearly() {
    let swarm = ParticleSwarm::new(ParticleSwarmConfig::new().with_max_iterations(11)).unwrap();
    assert!((swarm.inertia_at(0) - 0.9).abs() < 1e-12);
    assert!((swarm.inertia_at(5) - 0.65).abs() < 1e-12);
    assert!((swarm.inertia_at(10) - 0.4).abs() < 1e-12);
}

#[test]
fn test_particle_decoding() {
    let genes = ParticleSwarm::decode_position(&[-0.7, 0.4, 1.6, 5.2, -0.2], 3);
    assert_eq!(genes, vec![-1, 0, 2, 2, 0]);
}

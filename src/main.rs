//! Plan and simulate one delivery shift on a generated scenario.

use clap::{Parser, ValueEnum};
use jiff::civil::{self, DateTime};
use log::info;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io;

use glp_routing::network::{Blockage, Depot, Location, Network, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use glp_routing::simulation::{BreakdownSchedule, DeliverySimulator, ShiftTurn};
use glp_routing::truck::{BreakdownKind, TruckTier};
use glp_routing::utils::write_plan;
use glp_routing::{
    AntColonyConfig, GeneticConfig, OptimizerConfig, Order, ParticleSwarmConfig, Truck,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Aco,
    Genetic,
    Pso,
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Optimizer to run
    #[arg(short, long, value_enum, default_value_t = Algorithm::Aco)]
    algorithm: Algorithm,

    /// Number of trucks, assigned tiers TA, TB, TC, TD in turn
    #[arg(short, long, default_value_t = 8)]
    trucks: usize,

    /// Number of orders received at the start of the shift
    #[arg(short, long, default_value_t = 20)]
    orders: usize,

    /// Number of blockages active during the shift
    #[arg(short, long, default_value_t = 3)]
    blockages: usize,

    /// Iterations (or generations) of the optimizer
    #[arg(short, long, default_value_t = 50)]
    iterations: usize,

    /// Seed for the scenario and the optimizer
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Truck that breaks down (TI1) halfway through its route
    #[arg(long)]
    breakdown: Option<String>,

    /// Print the plan as JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let start = civil::date(2025, 1, 1).at(8, 0, 0, 0);
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);

    let network = build_network(&mut rng, cli.blockages, start);
    let mut trucks = build_fleet(&network, cli.trucks);
    let mut orders = build_orders(&mut rng, cli.orders, start);

    let config = match cli.algorithm {
        Algorithm::Aco => OptimizerConfig::AntColony(
            AntColonyConfig::new()
                .with_num_iterations(cli.iterations)
                .with_seed(cli.seed),
        ),
        Algorithm::Genetic => OptimizerConfig::Genetic(
            GeneticConfig::new()
                .with_max_generations(cli.iterations)
                .with_seed(cli.seed),
        ),
        Algorithm::Pso => OptimizerConfig::ParticleSwarm(
            ParticleSwarmConfig::new()
                .with_max_iterations(cli.iterations)
                .with_seed(cli.seed),
        ),
    };

    info!(
        "planning {} orders for {} trucks with {}",
        orders.len(),
        trucks.len(),
        config.name()
    );
    let mut plan = glp_routing::optimize(&config, &trucks, &orders, &network, start)?;

    let mut schedule = BreakdownSchedule::new();
    if let Some(truck_id) = &cli.breakdown {
        schedule.register(ShiftTurn::of(start), truck_id.clone(), BreakdownKind::Ti1);
    }

    // The plan carries the split parts; they replace the original requests
    orders = plan.orders.clone();
    let report = DeliverySimulator::new(&network)
        .with_schedule(&schedule)
        .simulate(&mut plan.routes, &mut trucks, &mut orders, start);
    plan.orders = orders;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        write_plan(&plan, &mut out)?;
        println!("{}", plan.statistics.format());
        println!(
            "Simulation: {} delivered, {} re-queued, {} breakdowns",
            report.delivered.len(),
            report.requeued.len(),
            report.breakdowns.len()
        );
    }

    Ok(())
}

fn build_network(rng: &mut ChaCha8Rng, blockages: usize, start: DateTime) -> Network {
    let depots = vec![
        Depot::main("central", Location::new(12, 8)),
        Depot::intermediate("north", Location::new(42, 42), 160.0),
        Depot::intermediate("east", Location::new(63, 3), 160.0),
    ];
    let mut network = Network::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, depots);

    for _ in 0..blockages {
        let from = Location::new(rng.gen_range(5..DEFAULT_WIDTH - 5), rng.gen_range(5..DEFAULT_HEIGHT - 5));
        let corner = Location::new(from.x + rng.gen_range(-4..=4), from.y);
        let to = Location::new(corner.x, corner.y + rng.gen_range(-4..=4));
        let hours = rng.gen_range(2..=8);
        network.add_blockage(Blockage::from_polyline(
            start,
            start + jiff::SignedDuration::from_hours(hours),
            &[from, corner, to],
        ));
    }
    network
}

fn build_fleet(network: &Network, count: usize) -> Vec<Truck> {
    let home = network
        .main_depot()
        .map_or(Location::new(0, 0), |depot| depot.location);
    let tiers = [TruckTier::TA, TruckTier::TB, TruckTier::TC, TruckTier::TD];

    (0..count)
        .map(|i| {
            let tier = tiers[i % tiers.len()];
            Truck::new(format!("{:?}{:02}", tier, i / tiers.len() + 1), tier, home)
        })
        .collect()
}

fn build_orders(rng: &mut ChaCha8Rng, count: usize, start: DateTime) -> Vec<Order> {
    (0..count)
        .map(|i| {
            let location = Location::new(rng.gen_range(0..DEFAULT_WIDTH), rng.gen_range(0..DEFAULT_HEIGHT));
            let volume = rng.gen_range(1..=30) as f64;
            let deadline_hours = rng.gen_range(4..=24);
            Order::new(
                format!("o{:03}", i + 1),
                format!("c{:03}", rng.gen_range(1..=200)),
                location,
                volume,
                start,
                deadline_hours,
            )
        })
        .collect()
}

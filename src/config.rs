//! Configuration parameters for the three optimizers.
//!
//! Every struct deserializes with `#[serde(default)]`, so a partially specified
//! configuration picks up the documented defaults for the missing options.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_positive, ensure_range, ConfigError};
use crate::fitness::FitnessWeights;
use crate::split::SplitPolicy;

/// Configuration settings for the ant-colony optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntColonyConfig {
    /// Ants per iteration
    pub num_ants: usize,
    /// Iteration budget
    pub num_iterations: usize,
    /// Pheromone exponent (α)
    pub alpha: f64,
    /// Heuristic exponent (β)
    pub beta: f64,
    /// Evaporation rate (ρ)
    pub evaporation: f64,
    /// Exploitation probability at the first iteration; rises towards 0.95
    pub q0: f64,
    /// Starting pheromone; also sets the MMAS bounds
    pub initial_pheromone: f64,
    /// Iteration after which early termination may kick in
    pub min_iterations: usize,
    pub split: SplitPolicy,
    pub weights: FitnessWeights,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for AntColonyConfig {
    fn default() -> Self {
        AntColonyConfig {
            num_ants: 20,
            num_iterations: 100,
            alpha: 1.0,
            beta: 2.0,
            evaporation: 0.1,
            q0: 0.5,
            initial_pheromone: 0.5,
            min_iterations: 40,
            split: SplitPolicy::ANT_COLONY,
            weights: FitnessWeights::ANT_COLONY,
            seed: None,
        }
    }
}

impl AntColonyConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        AntColonyConfig::default()
    }

    pub fn with_num_ants(mut self, n: usize) -> Self {
        self.num_ants = n;
        self
    }

    pub fn with_num_iterations(mut self, n: usize) -> Self {
        self.num_iterations = n;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_evaporation(mut self, rho: f64) -> Self {
        self.evaporation = rho;
        self
    }

    pub fn with_q0(mut self, q0: f64) -> Self {
        self.q0 = q0;
        self
    }

    pub fn with_initial_pheromone(mut self, tau: f64) -> Self {
        self.initial_pheromone = tau;
        self
    }

    pub fn with_split(mut self, split: SplitPolicy) -> Self {
        self.split = split;
        self
    }

    pub fn with_weights(mut self, weights: FitnessWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("num_ants", self.num_ants)?;
        ensure_positive("num_iterations", self.num_iterations)?;
        ensure_non_negative("alpha", self.alpha)?;
        ensure_non_negative("beta", self.beta)?;
        ensure_range("evaporation", self.evaporation, 0.0, 1.0)?;
        ensure_range("q0", self.q0, 0.0, 1.0)?;
        ensure_range("initial_pheromone", self.initial_pheromone, f64::EPSILON, f64::MAX)?;
        self.split.validate()?;
        self.weights.validate()
    }
}

/// Configuration settings for the genetic optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub max_generations: usize,
    /// Probability of single-point crossover, otherwise the first parent is cloned
    pub crossover_rate: f64,
    /// Probability that an offspring gets one gene reassigned
    pub mutation_rate: f64,
    /// Individuals copied unchanged into the next generation
    pub elitism: usize,
    pub tournament_size: usize,
    /// Generation after which convergence is checked
    pub min_generations: usize,
    /// Population fitness variance, relative to the squared mean, below which the run stops
    pub convergence_epsilon: f64,
    pub split: SplitPolicy,
    pub weights: FitnessWeights,
    pub seed: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        GeneticConfig {
            population_size: 50,
            max_generations: 100,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            elitism: 2,
            tournament_size: 3,
            min_generations: 20,
            convergence_epsilon: 1e-6,
            split: SplitPolicy::FLAT_25,
            weights: FitnessWeights::GENETIC,
            seed: None,
        }
    }
}

impl GeneticConfig {
    pub fn new() -> Self {
        GeneticConfig::default()
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_elitism(mut self, n: usize) -> Self {
        self.elitism = n;
        self
    }

    pub fn with_split(mut self, split: SplitPolicy) -> Self {
        self.split = split;
        self
    }

    pub fn with_weights(mut self, weights: FitnessWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("population_size", self.population_size)?;
        ensure_positive("max_generations", self.max_generations)?;
        ensure_positive("tournament_size", self.tournament_size)?;
        ensure_range("crossover_rate", self.crossover_rate, 0.0, 1.0)?;
        ensure_range("mutation_rate", self.mutation_rate, 0.0, 1.0)?;
        ensure_range(
            "elitism",
            self.elitism as f64,
            0.0,
            self.population_size as f64,
        )?;
        ensure_non_negative("convergence_epsilon", self.convergence_epsilon)?;
        self.split.validate()?;
        self.weights.validate()
    }
}

/// Configuration settings for the particle-swarm optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSwarmConfig {
    pub num_particles: usize,
    pub max_iterations: usize,
    /// Starting inertia weight; decays linearly to 0.4
    pub inertia: f64,
    /// Pull towards the particle's own best
    pub cognitive: f64,
    /// Pull towards the swarm's best
    pub social: f64,
    /// Iteration after which stagnation is checked
    pub min_iterations: usize,
    /// Iterations without a meaningful improvement before stopping
    pub stagnation_window: usize,
    pub split: SplitPolicy,
    pub weights: FitnessWeights,
    pub seed: Option<u64>,
}

impl Default for ParticleSwarmConfig {
    fn default() -> Self {
        ParticleSwarmConfig {
            num_particles: 30,
            max_iterations: 100,
            inertia: 0.9,
            cognitive: 1.5,
            social: 1.5,
            min_iterations: 20,
            stagnation_window: 10,
            split: SplitPolicy::FLAT_25,
            weights: FitnessWeights::PARTICLE_SWARM,
            seed: None,
        }
    }
}

impl ParticleSwarmConfig {
    pub fn new() -> Self {
        ParticleSwarmConfig::default()
    }

    pub fn with_num_particles(mut self, n: usize) -> Self {
        self.num_particles = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_inertia(mut self, w: f64) -> Self {
        self.inertia = w;
        self
    }

    pub fn with_cognitive(mut self, c1: f64) -> Self {
        self.cognitive = c1;
        self
    }

    pub fn with_social(mut self, c2: f64) -> Self {
        self.social = c2;
        self
    }

    pub fn with_split(mut self, split: SplitPolicy) -> Self {
        self.split = split;
        self
    }

    pub fn with_weights(mut self, weights: FitnessWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("num_particles", self.num_particles)?;
        ensure_positive("max_iterations", self.max_iterations)?;
        ensure_positive("stagnation_window", self.stagnation_window)?;
        ensure_range("inertia", self.inertia, 0.0, 2.0)?;
        ensure_non_negative("cognitive", self.cognitive)?;
        ensure_non_negative("social", self.social)?;
        self.split.validate()?;
        self.weights.validate()
    }
}

/// Selects an optimizer together with its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum OptimizerConfig {
    AntColony(AntColonyConfig),
    Genetic(GeneticConfig),
    ParticleSwarm(ParticleSwarmConfig),
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            OptimizerConfig::AntColony(config) => config.validate(),
            OptimizerConfig::Genetic(config) => config.validate(),
            OptimizerConfig::ParticleSwarm(config) => config.validate(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::AntColony(_) => "ant_colony",
            OptimizerConfig::Genetic(_) => "genetic",
            OptimizerConfig::ParticleSwarm(_) => "particle_swarm",
        }
    }
}

//! Population management for the genetic optimizer.

use rand::Rng;
use rayon::prelude::*;

use crate::config::GeneticConfig;
use crate::route::Route;

use super::individual::{Individual, UNASSIGNED};
use super::operators::Genetic;

/// Manages the population of individuals, kept sorted by fitness after evaluation.
pub struct Population {
    pub individuals: Vec<Individual>,
    /// Target population size
    pub size: usize,
    /// Number of best individuals copied unchanged
    pub elitism: usize,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
}

impl Population {
    /// Create a new population with the given configuration.
    pub fn new(config: &GeneticConfig) -> Self {
        Population {
            individuals: Vec::with_capacity(config.population_size),
            size: config.population_size,
            elitism: config.elitism.min(config.population_size),
            tournament_size: config.tournament_size,
            crossover_rate: config.crossover_rate,
            mutation_rate: config.mutation_rate,
        }
    }

    /// Fill the population with random chromosomes, plus the given seeds.
    pub fn initialize<R: Rng>(
        &mut self,
        num_orders: usize,
        num_trucks: usize,
        seeds: Vec<Vec<i32>>,
        rng: &mut R,
    ) {
        self.individuals.clear();
        for genes in seeds.into_iter().take(self.size) {
            self.individuals.push(Individual::new(genes));
        }

        while self.individuals.len() < self.size {
            let genes = (0..num_orders)
                .map(|_| rng.gen_range(UNASSIGNED..num_trucks as i32))
                .collect();
            self.individuals.push(Individual::new(genes));
        }
    }

    /// Decode and score every individual whose genes changed, in parallel,
    /// then sort ascending by fitness.
    pub fn evaluate<F>(&mut self, decode: F)
    where
        F: Fn(&[i32]) -> (Vec<Route>, f64) + Sync,
    {
        self.individuals
            .par_iter_mut()
            .filter(|individual| !individual.evaluated)
            .for_each(|individual| {
                let (routes, fitness) = decode(&individual.genes);
                individual.routes = routes;
                individual.fitness = fitness;
                individual.evaluated = true;
            });

        self.individuals.sort();
    }

    /// The best individual, valid after [`Population::evaluate`].
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    /// Pick `tournament_size` individuals at random and return the fittest.
    pub fn tournament_selection<R: Rng>(&self, rng: &mut R) -> &Individual {
        let mut winner = &self.individuals[rng.gen_range(0..self.individuals.len())];
        for _ in 1..self.tournament_size {
            let contender = &self.individuals[rng.gen_range(0..self.individuals.len())];
            if contender.fitness < winner.fitness {
                winner = contender;
            }
        }
        winner
    }

    /// Build the next generation: elites first, then tournament-selected
    /// parents recombined and mutated.
    pub fn next_generation<R: Rng>(&mut self, genetic: &Genetic, num_trucks: usize, rng: &mut R) {
        let mut next: Vec<Individual> = self.individuals.iter().take(self.elitism).cloned().collect();

        while next.len() < self.size {
            let parent1 = self.tournament_selection(rng);
            let parent2 = self.tournament_selection(rng);

            let mut child = if rng.gen::<f64>() < self.crossover_rate {
                genetic.crossover(parent1, parent2, rng)
            } else {
                parent1.clone()
            };

            if rng.gen::<f64>() < self.mutation_rate {
                genetic.mutate(&mut child, num_trucks, rng);
            }

            next.push(child);
        }

        self.individuals = next;
    }

    /// Variance of the finite fitness values relative to their squared mean.
    ///
    /// Zero when the population has collapsed onto a single fitness.
    pub fn relative_fitness_variance(&self) -> f64 {
        let values: Vec<f64> = self
            .individuals
            .iter()
            .map(|i| i.fitness)
            .filter(|f| f.is_finite())
            .collect();
        if values.len() < 2 {
            return 0.0;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / values.len() as f64;
        variance / (mean * mean).max(f64::EPSILON)
    }
}

//! Genetic operators for the assignment chromosome.

use rand::Rng;

use super::individual::{Individual, UNASSIGNED};

/// Implements the genetic operators (crossover, mutation).
pub struct Genetic;

impl Genetic {
    /// Single-point crossover: the child takes `parent1` up to a random cut
    /// and `parent2` after it.
    pub fn crossover<R: Rng>(&self, parent1: &Individual, parent2: &Individual, rng: &mut R) -> Individual {
        let p1 = &parent1.genes;
        let p2 = &parent2.genes;

        if p1.len() < 2 || p1.len() != p2.len() {
            return Individual::new(p1.clone());
        }

        let cut = rng.gen_range(1..p1.len());
        let mut genes = Vec::with_capacity(p1.len());
        genes.extend_from_slice(&p1[..cut]);
        genes.extend_from_slice(&p2[cut..]);

        Individual::new(genes)
    }

    /// Reassign one random gene to a random truck or to "unassigned".
    pub fn mutate<R: Rng>(&self, individual: &mut Individual, num_trucks: usize, rng: &mut R) {
        if individual.genes.is_empty() {
            return;
        }

        let index = rng.gen_range(0..individual.genes.len());
        let value = rng.gen_range(UNASSIGNED..num_trucks as i32);
        individual.set_gene(index, value);
    }
}

//! Individual representation for the genetic optimizer.

use std::cmp::Ordering;

use crate::route::Route;

/// Gene value meaning "not assigned to any truck".
pub const UNASSIGNED: i32 = -1;

/// An individual in the genetic algorithm population.
#[derive(Debug, Clone)]
pub struct Individual {
    /// One gene per order: a truck index or [`UNASSIGNED`]
    pub genes: Vec<i32>,
    /// Routes decoded from the genes, empty until evaluated
    pub routes: Vec<Route>,
    /// Fitness of the decoded routes, lower is better
    pub fitness: f64,
    /// Whether `routes` and `fitness` match `genes`
    pub evaluated: bool,
}

impl Individual {
    /// Create a new, not yet evaluated individual.
    pub fn new(genes: Vec<i32>) -> Self {
        Individual {
            genes,
            routes: Vec::new(),
            fitness: f64::INFINITY,
            evaluated: false,
        }
    }

    /// Replace the genes, invalidating the previous evaluation.
    pub fn set_gene(&mut self, index: usize, value: i32) {
        if self.genes[index] != value {
            self.genes[index] = value;
            self.evaluated = false;
        }
    }

    /// Number of orders assigned to some truck.
    pub fn assigned_count(&self) -> usize {
        self.genes.iter().filter(|&&g| g != UNASSIGNED).count()
    }
}

impl PartialEq for Individual {
    fn eq(&self, other: &Self) -> bool {
        self.fitness == other.fitness
    }
}

impl Eq for Individual {}

impl PartialOrd for Individual {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Individual {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fitness.total_cmp(&other.fitness)
    }
}

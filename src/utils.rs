//! Utility functions and structures for reporting runs and plans.

use std::io::{self, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::optimizer::Plan;
use crate::route::VisitKind;

/// Format a duration as hours, minutes, and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Statistics about one optimization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub algorithm: String,
    /// Iterations (or generations) actually performed
    pub iterations: usize,
    /// Number of times the best fitness improved
    pub improvements: usize,
    pub runtime: Duration,
    pub best_fitness: f64,
    /// Stopped by the convergence criterion before the iteration budget
    pub stopped_early: bool,
    pub cancelled: bool,
}

impl SearchStatistics {
    pub fn new(algorithm: &str) -> Self {
        SearchStatistics {
            algorithm: algorithm.to_string(),
            best_fitness: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Format the statistics as a string.
    pub fn format(&self) -> String {
        format!(
            "Search Statistics ({}):
- Iterations: {}
- Improvements: {}
- Runtime: {}
- Best Fitness: {:.2}
- Stopped Early: {}
- Cancelled: {}",
            self.algorithm,
            self.iterations,
            self.improvements,
            format_duration(self.runtime),
            self.best_fitness,
            self.stopped_early,
            self.cancelled
        )
    }
}

/// Write a human-readable summary of a plan.
pub fn write_plan<W: Write>(plan: &Plan, out: &mut W) -> io::Result<()> {
    writeln!(out, "Fitness: {:.2}", plan.fitness)?;
    writeln!(out, "Total Distance: {:.2} km", plan.report.distance)?;
    writeln!(out, "Total Fuel: {:.2} gal", plan.report.fuel)?;
    writeln!(out, "Delay: {:.1} min", plan.report.delay_minutes)?;
    writeln!(
        out,
        "Unassigned: {} orders ({:.1} m3)",
        plan.report.unassigned_orders, plan.report.unassigned_volume
    )?;
    writeln!(out, "Routes: {}", plan.routes.len())?;
    writeln!(out)?;

    for route in &plan.routes {
        write!(out, "Truck {}: {}", route.truck_id, route.origin)?;
        for visit in &route.visits {
            match &visit.kind {
                VisitKind::Delivery { order_id, volume } => {
                    write!(out, " -> {} [{} {:.1}m3]", visit.location, order_id, volume)?
                }
                VisitKind::Depot { depot_id } => {
                    write!(out, " -> {} [{}]", visit.location, depot_id)?
                }
            }
        }
        writeln!(out, " -> {}", route.destination)?;
        writeln!(
            out,
            "  Distance: {:.1} km, Fuel: {:.2} gal, Load: {:.1} m3",
            route.distance,
            route.fuel_consumed,
            route.assigned_volume()
        )?;

        for event in &route.events {
            writeln!(
                out,
                "  {:?} at {} {} {}",
                event.kind, event.at, event.location, event.note
            )?;
        }
    }

    Ok(())
}

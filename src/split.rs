//! Splitting of oversized orders into deliverable parts.
//!
//! The largest tank in the fleet holds 25 m³, so a bigger request can never be
//! served in one visit. The splitter breaks such requests into parts that each
//! fit a truck; the parts always add up to the original volume.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_non_negative, ensure_range, ConfigError};
use crate::order::Order;

/// How orders above a threshold are cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Chunk size depends on the volume still left: above 40 m³ take 25,
    /// above 25 take 15, otherwise 10.
    Tiered { threshold: f64 },
    /// Fixed chunks of `chunk` m³.
    Flat { threshold: f64, chunk: f64 },
}

impl SplitPolicy {
    /// The policy used by the ant colony.
    pub const ANT_COLONY: SplitPolicy = SplitPolicy::Tiered { threshold: 12.0 };
    /// The policy used by the genetic and particle-swarm optimizers.
    pub const FLAT_25: SplitPolicy = SplitPolicy::Flat {
        threshold: 25.0,
        chunk: 25.0,
    };

    pub fn threshold(&self) -> f64 {
        match *self {
            SplitPolicy::Tiered { threshold } => threshold,
            SplitPolicy::Flat { threshold, .. } => threshold,
        }
    }

    /// Thresholds must be finite and non-negative; flat chunks finite and positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("split.threshold", self.threshold())?;
        if let SplitPolicy::Flat { chunk, .. } = *self {
            ensure_range("split.chunk", chunk, f64::MIN_POSITIVE, f64::MAX)?;
        }
        Ok(())
    }

    /// Largest part this policy ever produces.
    pub fn max_chunk(&self) -> f64 {
        match *self {
            SplitPolicy::Tiered { threshold } => threshold.max(25.0),
            SplitPolicy::Flat { threshold, chunk } => threshold.max(chunk),
        }
    }

    fn chunk_for(&self, remaining: f64) -> f64 {
        match *self {
            SplitPolicy::Tiered { .. } => {
                if remaining > 40.0 {
                    25.0
                } else if remaining > 25.0 {
                    15.0
                } else {
                    10.0
                }
            }
            SplitPolicy::Flat { chunk, .. } => chunk,
        }
    }
}

/// Applies a [`SplitPolicy`] to orders.
pub struct Split;

impl Split {
    /// Split a single order. Orders at or below the threshold, and parts of
    /// an earlier split, come back unchanged. So does every order under an
    /// invalid policy.
    pub fn split_order(order: &Order, policy: SplitPolicy) -> Vec<Order> {
        if order.is_split() || order.volume <= policy.threshold() || order.volume <= 0.0 {
            return vec![order.clone()];
        }
        if let Err(e) = policy.validate() {
            log::warn!("Order {} left whole: {}", order.id, e);
            return vec![order.clone()];
        }

        let mut volumes = Vec::new();
        let mut remaining = order.volume;

        while remaining > policy.chunk_for(remaining) {
            let chunk = policy.chunk_for(remaining);
            volumes.push(chunk);
            remaining -= chunk;
        }

        // The last part takes whatever is left so the parts add up exactly
        let allotted: f64 = volumes.iter().sum();
        volumes.push(order.volume - allotted);

        volumes
            .into_iter()
            .enumerate()
            .map(|(i, volume)| order.part(i as u32 + 1, volume))
            .collect()
    }

    /// Split every order, keeping their relative order.
    pub fn split_all(orders: &[Order], policy: SplitPolicy) -> Vec<Order> {
        orders
            .iter()
            .flat_map(|order| Self::split_order(order, policy))
            .collect()
    }
}

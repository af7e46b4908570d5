//! Delivery requests.

use jiff::civil::DateTime;
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::network::Location;

/// A GLP delivery request, or one part of a split request.
///
/// Parts of a split order share `base_id`; an unsplit order has `part == None`
/// and `base_id == id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub base_id: String,
    pub part: Option<u32>,
    pub client_id: String,
    pub location: Location,
    /// Requested GLP in m³.
    pub volume: f64,
    pub received_at: DateTime,
    pub deadline: DateTime,
    /// Id of the truck the order is planned on, if any.
    pub assigned_truck: Option<String>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime>,
}

impl Order {
    /// A request received at `received_at` that must be served within `deadline_hours`.
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        location: Location,
        volume: f64,
        received_at: DateTime,
        deadline_hours: i64,
    ) -> Self {
        let id = id.into();
        Order {
            base_id: id.clone(),
            id,
            part: None,
            client_id: client_id.into(),
            location,
            volume,
            received_at,
            deadline: received_at + SignedDuration::from_hours(deadline_hours),
            assigned_truck: None,
            delivered: false,
            delivered_at: None,
        }
    }

    /// Part `index` (1-based) of this order, carrying `volume` m³.
    pub fn part(&self, index: u32, volume: f64) -> Order {
        Order {
            id: format!("{}#{}", self.base_id, index),
            base_id: self.base_id.clone(),
            part: Some(index),
            client_id: self.client_id.clone(),
            location: self.location,
            volume,
            received_at: self.received_at,
            deadline: self.deadline,
            assigned_truck: None,
            delivered: false,
            delivered_at: None,
        }
    }

    pub fn is_split(&self) -> bool {
        self.part.is_some()
    }

    /// Received by `now` and not yet delivered.
    pub fn is_pending(&self, now: DateTime) -> bool {
        !self.delivered && self.received_at <= now
    }

    /// Minutes late when arriving at `arrival`, zero when on time.
    pub fn delay_minutes(&self, arrival: DateTime) -> f64 {
        let late = arrival.duration_since(self.deadline).as_secs_f64() / 60.0;
        late.max(0.0)
    }

    pub fn mark_delivered(&mut self, at: DateTime) {
        self.delivered = true;
        self.delivered_at = Some(at);
    }
}

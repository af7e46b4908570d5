//! Tank trucks: GLP and fuel bookkeeping plus the availability state machine.

use jiff::civil::DateTime;
use jiff::{SignedDuration, ToSpan};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::network::Location;

/// Fuel tank size in gallons, shared by every tier.
pub const FUEL_CAPACITY: f64 = 25.0;
/// Average driving speed in km/h, shared by every tier.
pub const AVERAGE_SPEED: f64 = 50.0;
/// Weight in tonnes of one m³ of GLP.
pub const GLP_TONNES_PER_M3: f64 = 0.5;
/// Divisor of the consumption formula `km * tonnes / 180`.
const CONSUMPTION_FACTOR: f64 = 180.0;
/// Length of a maintenance stop.
pub const MAINTENANCE_DURATION: SignedDuration = SignedDuration::from_hours(24);
/// Trucks whose maintenance starts within this window are not planned.
pub const MAINTENANCE_LOOKAHEAD: SignedDuration = SignedDuration::from_hours(12);

/// The four fleet tiers, from largest to smallest tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TruckTier {
    TA,
    TB,
    TC,
    TD,
}

impl TruckTier {
    /// GLP tank capacity in m³.
    pub fn glp_capacity(&self) -> f64 {
        match self {
            TruckTier::TA => 25.0,
            TruckTier::TB => 15.0,
            TruckTier::TC => 10.0,
            TruckTier::TD => 5.0,
        }
    }

    /// Empty weight in tonnes.
    pub fn tare(&self) -> f64 {
        match self {
            TruckTier::TA => 2.5,
            TruckTier::TB => 2.0,
            TruckTier::TC => 1.5,
            TruckTier::TD => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TruckState {
    Available,
    /// Immobilised at the breakdown site.
    BrokenDown,
    /// Past immobilisation but still being repaired.
    Unavailable,
    Maintenance,
}

/// Incident severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakdownKind {
    /// Flat tyre: two hours on site, then back in service.
    Ti1,
    /// Engine failure: two hours on site, back at the next shift boundary.
    Ti2,
    /// Crash: four hours on site, back three days later at midnight.
    Ti3,
}

impl BreakdownKind {
    pub fn immobilization(&self) -> SignedDuration {
        match self {
            BreakdownKind::Ti1 | BreakdownKind::Ti2 => SignedDuration::from_hours(2),
            BreakdownKind::Ti3 => SignedDuration::from_hours(4),
        }
    }

    /// When a truck that broke down at `at` is back in service.
    pub fn resume_at(&self, at: DateTime) -> DateTime {
        match self {
            BreakdownKind::Ti1 => at + self.immobilization(),
            BreakdownKind::Ti2 => {
                let date = at.date();
                if at.hour() < 8 {
                    date.at(16, 0, 0, 0)
                } else if at.hour() < 16 {
                    date.saturating_add(1.day()).at(0, 0, 0, 0)
                } else {
                    date.saturating_add(1.day()).at(8, 0, 0, 0)
                }
            }
            BreakdownKind::Ti3 => at.date().saturating_add(3.days()).at(0, 0, 0, 0),
        }
    }
}

impl fmt::Display for BreakdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BreakdownKind::Ti1 => "TI1",
            BreakdownKind::Ti2 => "TI2",
            BreakdownKind::Ti3 => "TI3",
        };
        f.write_str(label)
    }
}

/// A tank truck.
///
/// Invariants: `0 <= glp_level <= glp_capacity` and `0 <= fuel_level <= FUEL_CAPACITY`.
/// Every resource operation either succeeds completely or leaves the truck untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truck {
    pub id: String,
    pub tier: TruckTier,
    pub location: Location,
    glp_level: f64,
    fuel_level: f64,
    state: TruckState,
    pub last_maintenance: Option<DateTime>,
    pub next_maintenance: Option<DateTime>,
    maintenance_started: Option<DateTime>,
    breakdown: Option<BreakdownKind>,
    immobilized_until: Option<DateTime>,
    available_at: Option<DateTime>,
}

impl Truck {
    /// A truck parked at `location` with a full fuel tank and an empty GLP tank.
    pub fn new(id: impl Into<String>, tier: TruckTier, location: Location) -> Self {
        Truck {
            id: id.into(),
            tier,
            location,
            glp_level: 0.0,
            fuel_level: FUEL_CAPACITY,
            state: TruckState::Available,
            last_maintenance: None,
            next_maintenance: None,
            maintenance_started: None,
            breakdown: None,
            immobilized_until: None,
            available_at: None,
        }
    }

    /// Start with a full GLP tank.
    pub fn loaded(mut self) -> Self {
        self.glp_level = self.glp_capacity();
        self
    }

    pub fn with_next_maintenance(mut self, at: DateTime) -> Self {
        self.next_maintenance = Some(at);
        self
    }

    pub fn glp_capacity(&self) -> f64 {
        self.tier.glp_capacity()
    }

    pub fn fuel_capacity(&self) -> f64 {
        FUEL_CAPACITY
    }

    pub fn speed(&self) -> f64 {
        AVERAGE_SPEED
    }

    pub fn glp_level(&self) -> f64 {
        self.glp_level
    }

    pub fn fuel_level(&self) -> f64 {
        self.fuel_level
    }

    pub fn state(&self) -> TruckState {
        self.state
    }

    pub fn breakdown(&self) -> Option<BreakdownKind> {
        self.breakdown
    }

    pub fn immobilized_until(&self) -> Option<DateTime> {
        self.immobilized_until
    }

    pub fn available_at(&self) -> Option<DateTime> {
        self.available_at
    }

    /// Current weight in tonnes: tare plus the GLP on board.
    pub fn total_weight(&self) -> f64 {
        self.tier.tare() + self.glp_level * GLP_TONNES_PER_M3
    }

    /// Gallons needed to drive `distance_km` at the current weight.
    pub fn fuel_needed(&self, distance_km: f64) -> f64 {
        fuel_for(distance_km, self.total_weight())
    }

    pub fn load_glp(&mut self, volume: f64) -> bool {
        if !volume.is_finite()
            || volume < 0.0
            || self.glp_level + volume > self.glp_capacity() + f64::EPSILON
        {
            return false;
        }
        self.glp_level = (self.glp_level + volume).min(self.glp_capacity());
        true
    }

    pub fn unload_glp(&mut self, volume: f64) -> bool {
        if !volume.is_finite() || volume < 0.0 || volume > self.glp_level + f64::EPSILON {
            return false;
        }
        self.glp_level = (self.glp_level - volume).max(0.0);
        true
    }

    /// Add `gallons`, capped at the tank size. Negative amounts are rejected.
    pub fn refuel(&mut self, gallons: f64) -> bool {
        if gallons < 0.0 || !gallons.is_finite() {
            return false;
        }
        self.fuel_level = (self.fuel_level + gallons).min(FUEL_CAPACITY);
        true
    }

    pub fn refuel_full(&mut self) {
        self.fuel_level = FUEL_CAPACITY;
    }

    /// Burn the fuel for `distance_km`. Fails without change when the tank is short.
    pub fn consume_fuel(&mut self, distance_km: f64) -> bool {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return false;
        }
        let needed = self.fuel_needed(distance_km);
        if needed > self.fuel_level {
            return false;
        }
        self.fuel_level -= needed;
        true
    }

    /// Take the truck out of service after an incident at `at`.
    pub fn register_breakdown(&mut self, kind: BreakdownKind, at: DateTime) {
        self.state = TruckState::BrokenDown;
        self.breakdown = Some(kind);
        self.immobilized_until = Some(at + kind.immobilization());
        self.available_at = Some(kind.resume_at(at));
    }

    /// Bring the state machine up to `now`.
    pub fn advance(&mut self, now: DateTime) {
        if self.state == TruckState::Maintenance {
            if let Some(started) = self.maintenance_started {
                if now >= started + MAINTENANCE_DURATION {
                    self.finish_maintenance(started);
                }
            }
            return;
        }

        if let Some(next) = self.next_maintenance {
            if now >= next && now < next + MAINTENANCE_DURATION {
                self.state = TruckState::Maintenance;
                self.maintenance_started = Some(next);
                return;
            }
        }

        if self.state == TruckState::BrokenDown
            && self.immobilized_until.is_some_and(|until| now >= until)
        {
            self.state = TruckState::Unavailable;
        }

        if self.state == TruckState::Unavailable && self.available_at.is_some_and(|at| now >= at) {
            self.state = TruckState::Available;
            self.breakdown = None;
            self.immobilized_until = None;
            self.available_at = None;
        }
    }

    /// Whether the truck can take part in a new planning pass at `now`.
    pub fn is_eligible(&self, now: DateTime) -> bool {
        if self.state != TruckState::Available {
            return false;
        }
        match self.next_maintenance {
            Some(next) => {
                let within_lookahead = next >= now && next.duration_since(now) < MAINTENANCE_LOOKAHEAD;
                let in_window = now >= next && now < next + MAINTENANCE_DURATION;
                !within_lookahead && !in_window
            }
            None => true,
        }
    }

    fn finish_maintenance(&mut self, started: DateTime) {
        self.state = TruckState::Available;
        self.maintenance_started = None;
        self.last_maintenance = Some(started);
        self.next_maintenance = Some(started.saturating_add(2.months()));
        self.refuel_full();
    }
}

/// Gallons burnt over `distance_km` by a vehicle weighing `weight_tonnes`.
pub fn fuel_for(distance_km: f64, weight_tonnes: f64) -> f64 {
    distance_km * weight_tonnes / CONSUMPTION_FACTOR
}

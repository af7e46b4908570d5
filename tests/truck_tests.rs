//! Tests for truck resources and the availability state machine.

use glp_routing::network::Location;
use glp_routing::truck::{BreakdownKind, Truck, TruckState, TruckTier, FUEL_CAPACITY};
use jiff::civil::{self, DateTime};
use jiff::SignedDuration;

fn at(day: i8, hour: i8, minute: i8) -> DateTime {
    civil::date(2025, 1, day).at(hour, minute, 0, 0)
}

fn create_test_truck(tier: TruckTier) -> Truck {
    Truck::new("T1", tier, Location::new(0, 0))
}

#[test]
fn test_tiers() {
    assert_eq!(TruckTier::TA.glp_capacity(), 25.0);
    assert_eq!(TruckTier::TB.glp_capacity(), 15.0);
    assert_eq!(TruckTier::TC.glp_capacity(), 10.0);
    assert_eq!(TruckTier::TD.glp_capacity(), 5.0);
    assert_eq!(TruckTier::TA.tare(), 2.5);
    assert_eq!(TruckTier::TD.tare(), 1.0);
}

#[test]
fn test_new_truck() {
    let truck = create_test_truck(TruckTier::TB);
    assert_eq!(truck.state(), TruckState::Available);
    assert_eq!(truck.fuel_level(), FUEL_CAPACITY);
    assert_eq!(truck.glp_level(), 0.0);
    assert_eq!(truck.total_weight(), 2.0);

    let loaded = create_test_truck(TruckTier::TB).loaded();
    assert_eq!(loaded.glp_level(), 15.0);
    assert_eq!(loaded.total_weight(), 2.0 + 15.0 * 0.5);
}

#[test]
fn test_load_and_unload_bounds() {
    let mut truck = create_test_truck(TruckTier::TC);

    assert!(truck.load_glp(8.0));
    assert!(!truck.load_glp(3.0));
    assert_eq!(truck.glp_level(), 8.0);

    assert!(truck.load_glp(2.0));
    assert_eq!(truck.glp_level(), 10.0);

    assert!(!truck.unload_glp(12.0));
    assert_eq!(truck.glp_level(), 10.0);
    assert!(truck.unload_glp(4.0));
    assert_eq!(truck.glp_level(), 6.0);

    assert!(!truck.load_glp(-1.0));
    assert!(!truck.unload_glp(-1.0));
}

#[test]
fn test_consume_fuel() {
    let mut truck = create_test_truck(TruckTier::TA);

    // 180 km at 2.5 t burns 2.5 gal
    assert!(truck.consume_fuel(180.0));
    assert!((truck.fuel_level() - (FUEL_CAPACITY - 2.5)).abs() < 1e-9);

    assert!(truck.load_glp(25.0));
    let needed = truck.fuel_needed(100.0);
    assert!((needed - 100.0 * 15.0 / 180.0).abs() < 1e-9);
}

#[test]
fn test_consume_fuel_rejects_overdraw() {
    let mut truck = create_test_truck(TruckTier::TA).loaded();
    let before = truck.fuel_level();

    // 15 t over 500 km needs about 41.7 gal
    assert!(!truck.consume_fuel(500.0));
    assert_eq!(truck.fuel_level(), before);
    assert!(truck.fuel_level() >= 0.0);

    assert!(!truck.consume_fuel(-5.0));
    assert_eq!(truck.fuel_level(), before);
}

#[test]
fn test_refuel_caps_at_tank_size() {
    let mut truck = create_test_truck(TruckTier::TA);
    assert!(truck.consume_fuel(360.0));
    assert!(truck.refuel(100.0));
    assert_eq!(truck.fuel_level(), FUEL_CAPACITY);
    assert!(!truck.refuel(-1.0));
}

#[test]
fn test_ti1_resume() {
    let kind = BreakdownKind::Ti1;
    assert_eq!(kind.resume_at(at(1, 13, 30)), at(1, 15, 30));
    assert_eq!(kind.immobilization(), SignedDuration::from_hours(2));
}

#[test]
fn test_ti2_resume_follows_shifts() {
    let kind = BreakdownKind::Ti2;
    assert_eq!(kind.resume_at(at(1, 7, 59)), at(1, 16, 0));
    assert_eq!(kind.resume_at(at(1, 8, 0)), at(2, 0, 0));
    assert_eq!(kind.resume_at(at(1, 15, 45)), at(2, 0, 0));
    assert_eq!(kind.resume_at(at(1, 16, 0)), at(2, 8, 0));
    assert_eq!(kind.resume_at(at(1, 23, 10)), at(2, 8, 0));
}

#[test]
fn test_ti3_resume_three_days_at_midnight() {
    let kind = BreakdownKind::Ti3;
    assert_eq!(kind.immobilization(), SignedDuration::from_hours(4));
    for (hour, minute) in [(0, 0), (9, 15), (13, 27), (23, 59)] {
        assert_eq!(kind.resume_at(at(1, hour, minute)), at(4, 0, 0));
    }
    // Month boundary
    let late = civil::date(2025, 1, 30).at(18, 0, 0, 0);
    assert_eq!(kind.resume_at(late), civil::date(2025, 2, 2).at(0, 0, 0, 0));
}

#[test]
fn test_breakdown_state_machine() {
    let mut truck = create_test_truck(TruckTier::TB);
    truck.register_breakdown(BreakdownKind::Ti2, at(1, 10, 0));

    assert_eq!(truck.state(), TruckState::BrokenDown);
    assert_eq!(truck.breakdown(), Some(BreakdownKind::Ti2));
    assert_eq!(truck.immobilized_until(), Some(at(1, 12, 0)));
    assert_eq!(truck.available_at(), Some(at(2, 0, 0)));
    assert!(!truck.is_eligible(at(1, 11, 0)));

    truck.advance(at(1, 11, 0));
    assert_eq!(truck.state(), TruckState::BrokenDown);

    truck.advance(at(1, 13, 0));
    assert_eq!(truck.state(), TruckState::Unavailable);
    assert!(!truck.is_eligible(at(1, 13, 0)));

    truck.advance(at(2, 0, 0));
    assert_eq!(truck.state(), TruckState::Available);
    assert_eq!(truck.breakdown(), None);
    assert!(truck.is_eligible(at(2, 0, 0)));
}

#[test]
fn test_ti1_recovers_in_one_step() {
    let mut truck = create_test_truck(TruckTier::TD);
    truck.register_breakdown(BreakdownKind::Ti1, at(1, 8, 0));
    truck.advance(at(1, 10, 0));
    assert_eq!(truck.state(), TruckState::Available);
}

#[test]
fn test_maintenance_cycle() {
    let mut truck = create_test_truck(TruckTier::TA).with_next_maintenance(at(2, 0, 0));

    assert!(truck.is_eligible(at(1, 8, 0)));
    // Within 12 hours of the maintenance slot
    assert!(!truck.is_eligible(at(1, 14, 0)));

    truck.advance(at(2, 3, 0));
    assert_eq!(truck.state(), TruckState::Maintenance);
    assert!(!truck.is_eligible(at(2, 3, 0)));

    truck.advance(at(2, 23, 0));
    assert_eq!(truck.state(), TruckState::Maintenance);

    truck.advance(at(3, 0, 0));
    assert_eq!(truck.state(), TruckState::Available);
    assert_eq!(truck.last_maintenance, Some(at(2, 0, 0)));
    assert_eq!(
        truck.next_maintenance,
        Some(civil::date(2025, 3, 2).at(0, 0, 0, 0))
    );
    assert!(truck.is_eligible(at(3, 0, 0)));
}

#[test]
fn test_non_finite_amounts_are_rejected() {
    let mut truck = create_test_truck(TruckTier::TA);
    assert!(truck.load_glp(10.0));
    let fuel = truck.fuel_level();

    assert!(!truck.load_glp(f64::NAN));
    assert!(!truck.load_glp(f64::INFINITY));
    assert_eq!(truck.glp_level(), 10.0);

    assert!(!truck.unload_glp(f64::NAN));
    assert_eq!(truck.glp_level(), 10.0);

    assert!(!truck.consume_fuel(f64::NAN));
    assert!(!truck.consume_fuel(f64::INFINITY));
    assert_eq!(truck.fuel_level(), fuel);
}

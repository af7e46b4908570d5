//! Tests for route bookkeeping, path tracing and re-sequencing.

use glp_routing::network::{Blockage, Depot, Location, Network};
use glp_routing::order::Order;
use glp_routing::route::{Route, Visit, SERVICE_TIME};
use glp_routing::truck::TruckTier;
use jiff::civil::{self, DateTime};
use jiff::SignedDuration;

fn start() -> DateTime {
    civil::date(2025, 1, 1).at(8, 0, 0, 0)
}

fn create_test_network() -> Network {
    Network::new(10, 10, vec![Depot::main("main", Location::new(0, 0))])
}

fn order_at(id: &str, x: i32, y: i32, volume: f64) -> Order {
    Order::new(id, "c1", Location::new(x, y), volume, start(), 4)
}

fn route_through(orders: &[Order]) -> Route {
    let mut route = Route::new("T1", Location::new(0, 0), Location::new(0, 0));
    for order in orders {
        route.push_delivery(order);
    }
    route
}

#[test]
fn test_empty_route() {
    let route = Route::new("T1", Location::new(0, 0), Location::new(0, 0));
    assert!(route.is_empty());
    assert_eq!(route.distance, 0.0);
    assert_eq!(route.legs, vec![0.0]);
}

#[test]
fn test_distance_is_recomputed() {
    let mut route = route_through(&[order_at("a", 3, 0, 2.0), order_at("b", 3, 4, 3.0)]);

    assert_eq!(route.legs, vec![3.0, 4.0, 7.0]);
    assert_eq!(route.distance, 14.0);
    assert_eq!(route.delivery_count(), 2);
    assert_eq!(route.assigned_volume(), 5.0);

    route.visits.reverse();
    route.recalculate_distance();
    assert_eq!(route.legs, vec![7.0, 4.0, 3.0]);
    assert_eq!(route.distance, 14.0);
}

#[test]
fn test_trip_loads_split_at_depots() {
    let depot = Depot::main("main", Location::new(0, 0));
    let mut route = route_through(&[order_at("a", 3, 0, 10.0), order_at("b", 4, 0, 5.0)]);
    route.push_depot(&depot);
    route.push_delivery(&order_at("c", 0, 6, 12.0));

    assert_eq!(route.trip_loads(), vec![15.0, 12.0]);
    assert_eq!(route.reload_count(), 1);
    assert_eq!(route.assigned_volume(), 27.0);
    let ids: Vec<&str> = route.order_ids().collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_depot_only_route_is_empty() {
    let mut route = Route::new("T1", Location::new(5, 5), Location::new(0, 0));
    route.push_depot(&Depot::main("main", Location::new(0, 0)));
    assert!(route.is_empty());
    assert_eq!(route.reload_count(), 0);
}

#[test]
fn test_trace_path_follows_the_grid() {
    let network = create_test_network();
    let mut route = route_through(&[order_at("a", 4, 3, 5.0)]);

    assert!(route.trace_path(&network, start(), 50.0));
    assert_eq!(route.distance, 14.0);
    assert_eq!(route.path.len(), 15);
    assert_eq!(route.path.first(), Some(&Location::new(0, 0)));
    assert_eq!(route.path.last(), Some(&Location::new(0, 0)));
    for pair in route.path.windows(2) {
        assert!(pair[0].is_adjacent(&pair[1]));
    }
}

#[test]
fn test_trace_path_detours_around_blockage() {
    let mut network = create_test_network();
    network.add_blockage(Blockage::new(
        start(),
        start() + SignedDuration::from_hours(24),
        [Location::new(2, 0)],
    ));
    let mut route = route_through(&[order_at("a", 4, 0, 5.0)]);
    assert_eq!(route.distance, 8.0);

    assert!(route.trace_path(&network, start(), 50.0));
    assert_eq!(route.legs, vec![6.0, 6.0]);
    assert_eq!(route.distance, 12.0);
    assert!(!route.path.contains(&Location::new(2, 0)));
}

#[test]
fn test_trace_path_reports_unreachable_leg() {
    let mut network = create_test_network();
    network.add_blockage(Blockage::new(
        start(),
        start() + SignedDuration::from_hours(24),
        [Location::new(4, 1), Location::new(3, 0), Location::new(5, 0)],
    ));
    let mut route = route_through(&[order_at("a", 4, 0, 5.0)]);

    assert!(!route.trace_path(&network, start(), 50.0));
    assert_eq!(route.distance, 8.0);
    assert!(route.path.is_empty());
}

#[test]
fn test_walk_projects_arrivals_and_fuel() {
    let route = route_through(&[order_at("a", 5, 0, 10.0), order_at("b", 10, 0, 5.0)]);
    let walk = route.walk(TruckTier::TA, start(), 50.0);

    assert_eq!(walk.arrivals.len(), 2);
    let first = walk.arrivals[0].duration_since(start());
    assert_eq!(first.as_secs(), 360);
    let second = walk.arrivals[1].duration_since(walk.arrivals[0]);
    assert_eq!(second.as_secs(), 360 + SERVICE_TIME.as_secs());

    // 5 km at 2.5 + 7.5 t, 5 km at 2.5 + 2.5 t, 10 km at 2.5 t
    let expected = (5.0 * 10.0 + 5.0 * 5.0 + 10.0 * 2.5) / 180.0;
    assert!((walk.fuel - expected).abs() < 1e-9);
}

#[test]
fn test_resequence_shortens_trip() {
    let network = create_test_network();
    let mut route = route_through(&[
        order_at("far", 5, 0, 1.0),
        order_at("near", 1, 0, 1.0),
        order_at("mid", 3, 0, 1.0),
    ]);
    assert_eq!(route.distance, 14.0);

    assert!(route.resequence(&network, start()));
    assert_eq!(route.distance, 10.0);
    assert_eq!(route.delivery_count(), 3);
}

#[test]
fn test_resequence_keeps_depot_visits_in_place() {
    let network = create_test_network();
    let depot = Depot::main("main", Location::new(0, 0));
    let mut route = route_through(&[
        order_at("a", 5, 0, 1.0),
        order_at("b", 1, 0, 1.0),
        order_at("c", 3, 0, 1.0),
    ]);
    route.push_depot(&depot);
    route.push_delivery(&order_at("d", 0, 4, 1.0));

    route.resequence(&network, start());

    assert!(route.visits[3].is_depot());
    assert_eq!(route.visits[4], Visit::delivery(&order_at("d", 0, 4, 1.0)));
    let first_trip: Vec<&str> = route.visits[..3].iter().filter_map(|v| v.order_id()).collect();
    assert_eq!(first_trip.len(), 3);
    assert!(!first_trip.contains(&"d"));
}

#[test]
fn test_walk_with_stalled_truck_saturates() {
    let route = route_through(&[order_at("a", 5, 0, 10.0)]);
    let walk = route.walk(TruckTier::TA, start(), 0.0);

    assert_eq!(walk.arrivals, vec![DateTime::MAX]);
    assert_eq!(walk.finished_at, DateTime::MAX);
    assert!(walk.fuel > 0.0);
}

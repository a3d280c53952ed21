//! Route evaluation: distance, time and the fleet cost model.
//!
//! Every route is implicitly closed by the depot on both ends. The stats record
//! produced here is shared by the fitness function and by reporting.

use crate::heuristics::construction::CAPACITY_TOLERANCE;
use crate::instance::{CvrpInstance, NodeIndex};
use serde::{Deserialize, Serialize};

/// Aggregated cost statistics over a set of routes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteStats {
    /// Total distance in kilometers
    pub total_distance: f64,
    /// Total driving time in hours
    pub total_time: f64,
    pub fuel_cost: f64,
    pub fixed_cost: f64,
    pub distance_cost: f64,
    pub time_cost: f64,
    /// Sum of the four cost components
    pub total_cost: f64,
    /// Largest overload of a single route, 0 when every route fits
    pub max_violation: f64,
    /// Number of non-empty routes (vehicles dispatched)
    pub num_routes: usize,
}

impl RouteStats {
    /// Overloads within the packing tolerance count as feasible
    pub fn is_feasible(&self) -> bool {
        self.max_violation <= CAPACITY_TOLERANCE
    }
}

/// Breakdown of a single route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub customers: Vec<NodeIndex>,
    pub load: f64,
    pub distance: f64,
    pub time: f64,
    /// `max(0, load - capacity)`
    pub violation: f64,
}

impl RouteSummary {
    pub fn is_overloaded(&self) -> bool {
        self.violation > CAPACITY_TOLERANCE
    }
}

/// Sum of the demands served by a route
pub fn route_load(instance: &CvrpInstance, route: &[NodeIndex]) -> f64 {
    route.iter().map(|&c| instance.demand(c)).sum()
}

/// Length of depot -> route -> depot
pub fn route_distance(instance: &CvrpInstance, route: &[NodeIndex]) -> f64 {
    let (first, last) = match (route.first(), route.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return 0.0,
    };
    let depot = instance.depot();

    let inner: f64 = route.windows(2).map(|w| instance.distance(w[0], w[1])).sum();
    instance.distance(depot, first) + inner + instance.distance(last, depot)
}

/// Evaluate one route on its own
pub fn evaluate_route(instance: &CvrpInstance, route: &[NodeIndex]) -> RouteSummary {
    let load = route_load(instance, route);
    let distance = route_distance(instance, route);

    RouteSummary {
        customers: route.to_vec(),
        load,
        distance,
        time: distance / instance.costs().speed,
        violation: (load - instance.capacity()).max(0.0),
    }
}

/// Evaluate a full set of routes. Empty routes are skipped and cost nothing.
pub fn evaluate_routes(instance: &CvrpInstance, routes: &[Vec<NodeIndex>]) -> RouteStats {
    let costs = instance.costs();
    let mut stats = RouteStats::default();

    for route in routes.iter().filter(|r| !r.is_empty()) {
        let summary = evaluate_route(instance, route);
        stats.max_violation = stats.max_violation.max(summary.violation);

        let liters = summary.distance / costs.fuel_efficiency;

        stats.total_distance += summary.distance;
        stats.total_time += summary.time;
        stats.fuel_cost += liters * costs.fuel_price;
        stats.distance_cost += costs.distance_cost * summary.distance;
        stats.time_cost += costs.time_cost * summary.time;
        stats.fixed_cost += costs.fixed_cost;
        stats.num_routes += 1;
    }

    stats.total_cost = stats.fixed_cost + stats.distance_cost + stats.time_cost + stats.fuel_cost;
    stats
}

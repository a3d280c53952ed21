//! Scalar fitness of a permutation: route cost plus a capacity penalty.

use crate::evaluation::{evaluate_routes, RouteStats};
use crate::heuristics::construction::permutation_to_routes;
use crate::instance::{CvrpInstance, NodeIndex};
use serde::{Deserialize, Serialize};

/// Default weight applied to the maximum capacity violation
pub const PENALTY_WEIGHT: f64 = 1e6;

/// Penalized cost of a candidate, with the raw stats kept alongside so that
/// "expensive but feasible" and "cheap but infeasible" stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    /// `stats.total_cost + penalty_weight * stats.max_violation`
    pub cost: f64,
    pub stats: RouteStats,
}

impl Fitness {
    pub fn is_feasible(&self) -> bool {
        self.stats.is_feasible()
    }

    /// Penalty part of the cost
    pub fn penalty(&self) -> f64 {
        self.cost - self.stats.total_cost
    }
}

/// Builds routes from a permutation and scores them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessFunction {
    pub penalty_weight: f64,
}

impl Default for FitnessFunction {
    fn default() -> Self {
        FitnessFunction {
            penalty_weight: PENALTY_WEIGHT,
        }
    }
}

impl FitnessFunction {
    pub fn new(penalty_weight: f64) -> Self {
        FitnessFunction { penalty_weight }
    }

    pub fn evaluate(&self, instance: &CvrpInstance, permutation: &[NodeIndex]) -> Fitness {
        let routes = permutation_to_routes(instance, permutation);
        let stats = evaluate_routes(instance, &routes);

        Fitness {
            cost: stats.total_cost + self.penalty_weight * stats.max_violation,
            stats,
        }
    }
}

/// Fitness with the default penalty weight
pub fn fitness(instance: &CvrpInstance, permutation: &[NodeIndex]) -> Fitness {
    FitnessFunction::default().evaluate(instance, permutation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{CostParameters, Node};

    // Depot D, customer A (demand 3) and B (demand 4), fixed cost 10,
    // one unit per km, no time or fuel cost.
    fn create_test_instance(capacity: f64) -> CvrpInstance {
        let costs = CostParameters {
            fixed_cost: 10.0,
            distance_cost: 1.0,
            time_cost: 0.0,
            fuel_price: 0.0,
            ..CostParameters::default()
        };
        CvrpInstance::new(
            "two customers",
            Node::depot("D", 4.60, -74.08),
            vec![Node::new("A", 4.65, -74.05, 3.0), Node::new("B", 4.70, -74.12, 4.0)],
            capacity,
            costs,
        )
        .unwrap()
    }

    #[test]
    fn test_split_into_two_routes() {
        let instance = create_test_instance(5.0);
        let (d, a, b) = (NodeIndex(0), NodeIndex(1), NodeIndex(2));

        let result = fitness(&instance, &[a, b]);

        let expected_distance = 2.0 * instance.distance(d, a) + 2.0 * instance.distance(d, b);
        assert_eq!(result.stats.num_routes, 2);
        assert_eq!(result.stats.fixed_cost, 20.0);
        assert!((result.stats.total_distance - expected_distance).abs() < 1e-9);
        assert!((result.cost - (20.0 + expected_distance)).abs() < 1e-9);
        assert_eq!(result.stats.max_violation, 0.0);
        assert!(result.is_feasible());
        assert_eq!(result.penalty(), 0.0);
    }

    #[test]
    fn test_single_route_when_capacity_allows() {
        let instance = create_test_instance(10.0);
        let (d, a, b) = (NodeIndex(0), NodeIndex(1), NodeIndex(2));

        let result = fitness(&instance, &[a, b]);

        let expected_distance = instance.distance(d, a) + instance.distance(a, b) + instance.distance(b, d);
        assert_eq!(result.stats.num_routes, 1);
        assert_eq!(result.stats.fixed_cost, 10.0);
        assert!((result.stats.total_distance - expected_distance).abs() < 1e-9);
        assert_eq!(result.stats.max_violation, 0.0);
    }

    #[test]
    fn test_infeasible_worse_than_feasible() {
        // B alone exceeds the capacity of 3.5 by 0.5
        let instance = create_test_instance(3.5);
        let (a, b) = (NodeIndex(1), NodeIndex(2));

        let infeasible = fitness(&instance, &[a, b]);
        assert!((infeasible.stats.max_violation - 0.5).abs() < 1e-12);
        assert!(!infeasible.is_feasible());
        assert!((infeasible.penalty() - 0.5 * PENALTY_WEIGHT).abs() < 1e-6);

        let roomy = create_test_instance(10.0);
        let feasible = fitness(&roomy, &[a, b]);
        assert!(feasible.is_feasible());
        assert!(infeasible.cost > feasible.cost);
        assert!(infeasible.stats.total_cost >= feasible.stats.total_cost);
    }

    #[test]
    fn test_penalty_outweighs_cheaper_route() {
        // B overloads a capacity of 3.5 by 0.5, with two routes
        let tight = create_test_instance(3.5);
        let overloaded = fitness(&tight, &[NodeIndex(1), NodeIndex(2)]);
        assert_eq!(overloaded.stats.num_routes, 2);
        assert!(!overloaded.is_feasible());

        // Same layout with B at exactly 3.5 and an extra customer C: three
        // feasible routes, strictly more expensive before the penalty
        let costs = CostParameters {
            fixed_cost: 10.0,
            distance_cost: 1.0,
            time_cost: 0.0,
            fuel_price: 0.0,
            ..CostParameters::default()
        };
        let spread = CvrpInstance::new(
            "three customers",
            Node::depot("D", 4.60, -74.08),
            vec![
                Node::new("A", 4.65, -74.05, 3.0),
                Node::new("B", 4.70, -74.12, 3.5),
                Node::new("C", 4.55, -74.02, 1.0),
            ],
            3.5,
            costs,
        )
        .unwrap();
        let feasible = fitness(&spread, &[NodeIndex(1), NodeIndex(2), NodeIndex(3)]);
        assert_eq!(feasible.stats.num_routes, 3);
        assert!(feasible.is_feasible());

        assert!(overloaded.stats.total_cost < feasible.stats.total_cost);
        assert!(overloaded.cost > feasible.cost);
    }

    #[test]
    fn test_custom_penalty_weight() {
        let instance = create_test_instance(3.5);
        let perm = [NodeIndex(1), NodeIndex(2)];

        let zero = FitnessFunction::new(0.0).evaluate(&instance, &perm);
        assert!((zero.cost - zero.stats.total_cost).abs() < 1e-12);

        let heavy = FitnessFunction::new(100.0).evaluate(&instance, &perm);
        assert!((heavy.cost - (heavy.stats.total_cost + 50.0)).abs() < 1e-9);
    }
}

//! Route construction from a customer permutation.
//!
//! The permutation is cut into consecutive routes by greedy, capacity-bounded
//! bin packing. Customers are never reordered or split, so the quality of the
//! routes depends only on the permutation.

use crate::instance::{CvrpInstance, NodeIndex};

/// Slack allowed on the capacity check to absorb floating point rounding
pub const CAPACITY_TOLERANCE: f64 = 1e-6;

/// Split a permutation of customers into vehicle routes.
///
/// Customers are appended to the current route while the running load plus the
/// next demand stays within capacity; otherwise the route is closed and a new one
/// starts with that customer. A customer heavier than the capacity still gets its
/// own (overloaded) route, which the evaluator reports as a violation.
pub fn permutation_to_routes(instance: &CvrpInstance, permutation: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let capacity = instance.capacity();
    let mut routes = Vec::new();
    let mut current: Vec<NodeIndex> = Vec::new();
    let mut load = 0.0;

    for &customer in permutation {
        let demand = instance.demand(customer);

        if !current.is_empty() && load + demand > capacity + CAPACITY_TOLERANCE {
            routes.push(std::mem::take(&mut current));
            load = 0.0;
        }

        current.push(customer);
        load += demand;
    }

    if !current.is_empty() {
        routes.push(current);
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{evaluate_routes, route_load};
    use crate::fitness::fitness;
    use crate::instance::{CostParameters, Node};
    use proptest::prelude::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn create_test_instance(capacity: f64) -> CvrpInstance {
        CvrpInstance::new(
            "construction",
            Node::depot("D", 0.0, 0.0),
            vec![
                Node::new("A", 0.0, 0.1, 3.0),
                Node::new("B", 0.1, 0.0, 4.0),
                Node::new("C", 0.1, 0.1, 2.0),
                Node::new("E", 0.2, 0.1, 6.0),
                Node::new("F", 0.2, 0.2, 0.0),
            ],
            capacity,
            CostParameters::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_greedy_split() {
        let instance = create_test_instance(7.0);
        let perm: Vec<NodeIndex> = instance.customers().to_vec();
        let routes = permutation_to_routes(&instance, &perm);

        // 3 + 4 fits, 2 + 6 does not, 6 + 0 fits
        assert_eq!(
            routes,
            vec![
                vec![NodeIndex(1), NodeIndex(2)],
                vec![NodeIndex(3)],
                vec![NodeIndex(4), NodeIndex(5)],
            ]
        );
    }

    #[test]
    fn test_tolerance_absorbs_rounding() {
        let instance = CvrpInstance::new(
            "rounding",
            Node::depot("D", 0.0, 0.0),
            vec![Node::new("A", 0.0, 0.1, 0.1), Node::new("B", 0.1, 0.0, 0.2)],
            0.3,
            CostParameters::default(),
        )
        .unwrap();
        // 0.1 + 0.2 is slightly above 0.3 in binary floating point
        let routes = permutation_to_routes(&instance, instance.customers());
        assert_eq!(routes.len(), 1);

        let stats = evaluate_routes(&instance, &routes);
        assert!(stats.is_feasible());

        let scored = fitness(&instance, instance.customers());
        assert_eq!(scored.stats.num_routes, 1);
        assert!(scored.is_feasible());
    }

    #[test]
    fn test_oversized_customer_gets_own_route() {
        let instance = create_test_instance(5.0);
        let perm = vec![NodeIndex(1), NodeIndex(4), NodeIndex(3)];
        let routes = permutation_to_routes(&instance, &perm);

        assert_eq!(routes, vec![vec![NodeIndex(1)], vec![NodeIndex(4)], vec![NodeIndex(3)]]);
    }

    #[test]
    fn test_empty_permutation() {
        let instance = create_test_instance(5.0);
        assert!(permutation_to_routes(&instance, &[]).is_empty());
    }

    proptest! {
        #[test]
        fn test_routes_partition_permutation(seed in any::<u64>(), capacity in 1.0f64..20.0) {
            let instance = create_test_instance(capacity);
            let mut perm = instance.customers().to_vec();
            perm.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

            let routes = permutation_to_routes(&instance, &perm);

            let flattened: Vec<NodeIndex> = routes.iter().flatten().copied().collect();
            prop_assert_eq!(&flattened, &perm);

            for route in &routes {
                prop_assert!(!route.is_empty());
                let expected: f64 = route.iter().map(|&c| instance.demand(c)).sum();
                prop_assert!((route_load(&instance, route) - expected).abs() < 1e-12);
                if route.len() > 1 {
                    prop_assert!(expected <= capacity + CAPACITY_TOLERANCE);
                }
            }
        }
    }
}

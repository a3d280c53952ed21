//! Solution representation and export for the CVRP.
//!
//! A solution is the best permutation found by a search, the routes derived from
//! it, its cost breakdown and the convergence history of the run.

use crate::error::Result;
use crate::evaluation::{evaluate_route, RouteStats, RouteSummary};
use crate::fitness::FitnessFunction;
use crate::heuristics::construction::permutation_to_routes;
use crate::instance::{CvrpInstance, NodeId, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Represents a solution to the CVRP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Seed of the random source used by the run
    pub seed: u64,
    /// Customer ordering, the only heritable part of a candidate
    pub permutation: Vec<NodeIndex>,
    /// Routes derived from the permutation
    pub routes: Vec<Vec<NodeIndex>>,
    /// Penalized cost used for ranking
    pub cost: f64,
    pub stats: RouteStats,
    pub feasible: bool,
    /// Best cost so far: initial population first, then one entry per generation
    pub history: Vec<f64>,
    pub generations: usize,
    /// Computation time in seconds
    pub computation_time: f64,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            algorithm: String::new(),
            seed: 0,
            permutation: Vec::new(),
            routes: Vec::new(),
            cost: f64::INFINITY,
            stats: RouteStats::default(),
            feasible: false,
            history: Vec::new(),
            generations: 0,
            computation_time: 0.0,
        }
    }

    /// Create a solution from a permutation, deriving routes and costs
    pub fn from_permutation(
        instance: &CvrpInstance,
        permutation: Vec<NodeIndex>,
        fitness: &FitnessFunction,
        algorithm: &str,
    ) -> Self {
        let scored = fitness.evaluate(instance, &permutation);
        let routes = permutation_to_routes(instance, &permutation);

        Solution {
            algorithm: algorithm.to_string(),
            permutation,
            routes,
            cost: scored.cost,
            stats: scored.stats,
            feasible: scored.is_feasible(),
            ..Solution::new()
        }
    }

    /// Check every customer appears exactly once in the permutation
    pub fn is_complete(&self, instance: &CvrpInstance) -> bool {
        if self.permutation.len() != instance.num_customers() {
            return false;
        }
        let unique: HashSet<NodeIndex> = self.permutation.iter().copied().collect();
        unique.len() == self.permutation.len() && unique.iter().all(|&c| instance.is_customer(c))
    }

    /// Routes expressed with the external node ids
    pub fn route_ids(&self, instance: &CvrpInstance) -> Vec<Vec<NodeId>> {
        self.routes
            .iter()
            .map(|route| route.iter().map(|&c| instance.id_of(c).clone()).collect())
            .collect()
    }

    pub fn route_summaries(&self, instance: &CvrpInstance) -> Vec<RouteSummary> {
        self.routes.iter().map(|route| evaluate_route(instance, route)).collect()
    }

    /// Build a self-describing report keyed by node ids
    pub fn report(&self, instance: &CvrpInstance) -> SolutionReport {
        let routes = self
            .route_summaries(instance)
            .into_iter()
            .enumerate()
            .map(|(i, summary)| RouteReport {
                vehicle: i + 1,
                customers: summary.customers.iter().map(|&c| instance.id_of(c).clone()).collect(),
                load: summary.load,
                distance_km: summary.distance,
                time_hours: summary.time,
                violation: summary.violation,
            })
            .collect();

        SolutionReport {
            instance: instance.name.clone(),
            algorithm: self.algorithm.clone(),
            seed: self.seed,
            cost: self.cost,
            feasible: self.feasible,
            stats: self.stats,
            permutation: self.permutation.iter().map(|&c| instance.id_of(c).clone()).collect(),
            routes,
            history: self.history.clone(),
            generations: self.generations,
            computation_time: self.computation_time,
        }
    }

    /// Save the report as pretty JSON
    pub fn save_json<P: AsRef<Path>>(&self, instance: &CvrpInstance, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.report(instance))?;
        Ok(())
    }

    /// Write the convergence history as `generation,best_cost`
    pub fn write_history_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for (generation, &best_cost) in self.history.iter().enumerate() {
            writer.serialize(HistoryRow { generation, best_cost })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn export_history_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_history_csv(File::create(path)?)
    }

    /// Write one row per visit as `route,position,customer,demand`
    pub fn write_routes_csv<W: Write>(&self, instance: &CvrpInstance, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for (r, route) in self.routes.iter().enumerate() {
            for (position, &customer) in route.iter().enumerate() {
                writer.serialize(RouteRow {
                    route: r + 1,
                    position: position + 1,
                    customer: instance.id_of(customer).clone(),
                    demand: instance.demand(customer),
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn export_routes_csv<P: AsRef<Path>>(&self, instance: &CvrpInstance, path: P) -> Result<()> {
        self.write_routes_csv(instance, File::create(path)?)
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Feasible: {}", self.feasible)?;
        writeln!(f, "  Vehicles: {}", self.stats.num_routes)?;
        writeln!(f, "  Distance: {:.2} km", self.stats.total_distance)?;
        writeln!(f, "  Time: {:.2} h", self.stats.total_time)?;
        writeln!(
            f,
            "  Costs: fixed {:.2}, distance {:.2}, time {:.2}, fuel {:.2}",
            self.stats.fixed_cost, self.stats.distance_cost, self.stats.time_cost, self.stats.fuel_cost
        )?;
        if !self.feasible {
            writeln!(f, "  Max capacity violation: {:.2}", self.stats.max_violation)?;
        }
        writeln!(f, "  Generations: {}", self.generations)?;
        writeln!(f, "  Computation time: {:.4}s", self.computation_time)
    }
}

/// Serializable view of a solution with node ids instead of indices
#[derive(Debug, Clone, Serialize)]
pub struct SolutionReport {
    pub instance: String,
    pub algorithm: String,
    pub seed: u64,
    pub cost: f64,
    pub feasible: bool,
    pub stats: RouteStats,
    pub permutation: Vec<NodeId>,
    pub routes: Vec<RouteReport>,
    pub history: Vec<f64>,
    pub generations: usize,
    pub computation_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub vehicle: usize,
    pub customers: Vec<NodeId>,
    pub load: f64,
    pub distance_km: f64,
    pub time_hours: f64,
    pub violation: f64,
}

#[derive(Serialize)]
struct HistoryRow {
    generation: usize,
    best_cost: f64,
}

#[derive(Serialize)]
struct RouteRow {
    route: usize,
    position: usize,
    customer: NodeId,
    demand: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{CostParameters, Node};

    fn create_test_instance() -> CvrpInstance {
        CvrpInstance::new(
            "test",
            Node::depot("D", 0.0, 0.0),
            vec![
                Node::new("A", 0.0, 0.1, 3.0),
                Node::new("B", 0.1, 0.0, 4.0),
                Node::new("C", 0.1, 0.1, 2.0),
            ],
            6.0,
            CostParameters {
                fixed_cost: 5.0,
                distance_cost: 1.0,
                ..CostParameters::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_solution_creation() {
        let sol = Solution::new();
        assert!(sol.permutation.is_empty());
        assert!(!sol.feasible);
        assert_eq!(sol.cost, f64::INFINITY);
    }

    #[test]
    fn test_from_permutation() {
        let instance = create_test_instance();
        let perm = vec![NodeIndex(1), NodeIndex(2), NodeIndex(3)];
        let sol = Solution::from_permutation(&instance, perm, &FitnessFunction::default(), "test");

        assert!(sol.is_complete(&instance));
        assert!(sol.feasible);
        assert_eq!(sol.routes, vec![vec![NodeIndex(1)], vec![NodeIndex(2), NodeIndex(3)]]);
        assert_eq!(
            sol.route_ids(&instance),
            vec![vec![NodeId::from("A")], vec![NodeId::from("B"), NodeId::from("C")]]
        );
        assert_eq!(sol.stats.num_routes, 2);
        assert!(sol.to_string().contains("Vehicles: 2"));
    }

    #[test]
    fn test_incomplete_permutation_detected() {
        let instance = create_test_instance();
        let mut sol = Solution::new();
        sol.permutation = vec![NodeIndex(1), NodeIndex(1), NodeIndex(3)];
        assert!(!sol.is_complete(&instance));
        sol.permutation = vec![NodeIndex(0), NodeIndex(1), NodeIndex(2)];
        assert!(!sol.is_complete(&instance));
    }

    #[test]
    fn test_csv_exports() {
        let instance = create_test_instance();
        let mut sol = Solution::from_permutation(
            &instance,
            vec![NodeIndex(3), NodeIndex(1), NodeIndex(2)],
            &FitnessFunction::default(),
            "test",
        );
        sol.history = vec![30.0, 25.5];

        let mut history = Vec::new();
        sol.write_history_csv(&mut history).unwrap();
        let history = String::from_utf8(history).unwrap();
        assert_eq!(history, "generation,best_cost\n0,30.0\n1,25.5\n");

        let mut routes = Vec::new();
        sol.write_routes_csv(&instance, &mut routes).unwrap();
        let routes = String::from_utf8(routes).unwrap();
        let lines: Vec<&str> = routes.lines().collect();
        assert_eq!(lines[0], "route,position,customer,demand");
        assert_eq!(lines[1], "1,1,C,2.0");
        assert_eq!(lines[2], "1,2,A,3.0");
        assert_eq!(lines[3], "2,1,B,4.0");
    }

    #[test]
    fn test_report_uses_ids() {
        let instance = create_test_instance();
        let sol = Solution::from_permutation(
            &instance,
            vec![NodeIndex(2), NodeIndex(3), NodeIndex(1)],
            &FitnessFunction::default(),
            "test",
        );
        let report = sol.report(&instance);

        assert_eq!(report.routes.len(), 2);
        assert_eq!(report.routes[0].customers, vec![NodeId::from("B"), NodeId::from("C")]);
        assert_eq!(report.routes[0].load, 6.0);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"permutation\":[\"B\",\"C\",\"A\"]"));
    }
}

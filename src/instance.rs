//! Module for representing CVRP instances.
//!
//! An instance holds one depot, the customers with their demands, the shared
//! vehicle capacity and the cost coefficients of the fleet. Nodes are addressed
//! by a typed [`NodeIndex`] (their row in the distance matrix); the external
//! [`NodeId`] is only used at the edges (loading and reporting).

use crate::distance::{Coordinate, DistanceMatrix};
use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// External identifier of a node, as found in the input tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a node in the distance matrix. The depot is always index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub usize);

impl NodeIndex {
    pub const DEPOT: NodeIndex = NodeIndex(0);

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A depot or customer location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub location: Coordinate,
    /// Quantity to deliver (always 0 for the depot)
    pub demand: f64,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, latitude: f64, longitude: f64, demand: f64) -> Self {
        Node {
            id: id.into(),
            location: Coordinate::new(latitude, longitude),
            demand,
        }
    }

    pub fn depot(id: impl Into<NodeId>, latitude: f64, longitude: f64) -> Self {
        Node::new(id, latitude, longitude, 0.0)
    }
}

/// Cost coefficients of the homogeneous fleet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    /// Charge per vehicle dispatched
    pub fixed_cost: f64,
    /// Cost per kilometer
    pub distance_cost: f64,
    /// Cost per hour
    pub time_cost: f64,
    /// Price per liter of fuel
    pub fuel_price: f64,
    /// Kilometers per liter
    pub fuel_efficiency: f64,
    /// Average travel speed in km/h
    pub speed: f64,
}

impl Default for CostParameters {
    fn default() -> Self {
        CostParameters {
            fixed_cost: 0.0,
            distance_cost: 0.0,
            time_cost: 0.0,
            fuel_price: 0.0,
            fuel_efficiency: 8.0,
            speed: 25.0,
        }
    }
}

impl CostParameters {
    fn validate(&self) -> Result<()> {
        let coefficients = [
            ("fixed_cost", self.fixed_cost),
            ("distance_cost", self.distance_cost),
            ("time_cost", self.time_cost),
            ("fuel_price", self.fuel_price),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() {
                return Err(SolverError::InvalidInstance(format!("{} must be finite, got {}", name, value)));
            }
        }
        if !(self.fuel_efficiency.is_finite() && self.fuel_efficiency > 0.0) {
            return Err(SolverError::InvalidInstance(format!(
                "fuel efficiency must be positive, got {}",
                self.fuel_efficiency
            )));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(SolverError::InvalidInstance(format!("speed must be positive, got {}", self.speed)));
        }
        Ok(())
    }
}

/// Represents a complete CVRP instance. Immutable once built.
#[derive(Debug, Clone)]
pub struct CvrpInstance {
    /// Name of the instance
    pub name: String,
    nodes: Vec<Node>,
    customers: Vec<NodeIndex>,
    node_index: HashMap<NodeId, NodeIndex>,
    capacity: f64,
    costs: CostParameters,
    distance_matrix: DistanceMatrix,
}

impl CvrpInstance {
    /// Validate the input and build the instance, including its distance matrix.
    ///
    /// Customers keep the order given here; it is only used to seed the initial
    /// permutation.
    pub fn new(
        name: impl Into<String>,
        depot: Node,
        customers: Vec<Node>,
        capacity: f64,
        costs: CostParameters,
    ) -> Result<Self> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(SolverError::InvalidInstance(format!(
                "vehicle capacity must be positive, got {}",
                capacity
            )));
        }
        costs.validate()?;

        let mut nodes = Vec::with_capacity(customers.len() + 1);
        nodes.push(Node { demand: 0.0, ..depot });
        nodes.extend(customers);

        let mut node_index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if !node.location.is_valid() {
                return Err(SolverError::InvalidInstance(format!(
                    "node {} has invalid coordinates ({}, {})",
                    node.id, node.location.latitude, node.location.longitude
                )));
            }
            if !(node.demand.is_finite() && node.demand >= 0.0) {
                return Err(SolverError::InvalidInstance(format!(
                    "customer {} has invalid demand {}",
                    node.id, node.demand
                )));
            }
            if node_index.insert(node.id.clone(), NodeIndex(i)).is_some() {
                return Err(SolverError::InvalidInstance(format!("duplicate node id {}", node.id)));
            }
        }

        for node in nodes.iter().skip(1).filter(|n| n.demand > capacity) {
            log::warn!(
                "customer {} demand {} exceeds vehicle capacity {}; its route will always be infeasible",
                node.id,
                node.demand,
                capacity
            );
        }

        let coords: Vec<Coordinate> = nodes.iter().map(|n| n.location).collect();
        let distance_matrix = DistanceMatrix::from_coordinates(&coords);
        let customers = (1..nodes.len()).map(NodeIndex).collect();

        Ok(CvrpInstance {
            name: name.into(),
            nodes,
            customers,
            node_index,
            capacity,
            costs,
            distance_matrix,
        })
    }

    #[inline]
    pub fn depot(&self) -> NodeIndex {
        NodeIndex::DEPOT
    }

    /// Customer indices in instance order
    pub fn customers(&self) -> &[NodeIndex] {
        &self.customers
    }

    /// Depot followed by all customers
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.0]
    }

    pub fn id_of(&self, idx: NodeIndex) -> &NodeId {
        &self.nodes[idx.0].id
    }

    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub fn is_customer(&self, idx: NodeIndex) -> bool {
        idx.0 != 0 && idx.0 < self.nodes.len()
    }

    #[inline]
    pub fn demand(&self, idx: NodeIndex) -> f64 {
        self.nodes[idx.0].demand
    }

    #[inline]
    pub fn distance(&self, from: NodeIndex, to: NodeIndex) -> f64 {
        self.distance_matrix.get(from.0, to.0)
    }

    pub fn distance_matrix(&self) -> &DistanceMatrix {
        &self.distance_matrix
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn costs(&self) -> &CostParameters {
        &self.costs
    }

    pub fn num_customers(&self) -> usize {
        self.customers.len()
    }

    /// Number of nodes including the depot
    pub fn dimension(&self) -> usize {
        self.nodes.len()
    }

    pub fn total_demand(&self) -> f64 {
        self.nodes.iter().skip(1).map(|n| n.demand).sum()
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let total_demand = self.total_demand();
        let max_demand = self.nodes.iter().skip(1).map(|n| n.demand).fold(0.0, f64::max);
        let oversized_customers = self
            .nodes
            .iter()
            .skip(1)
            .filter(|n| n.demand > self.capacity)
            .map(|n| n.id.clone())
            .collect();

        let n = self.dimension();
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut max_distance: f64 = 0.0;
        for i in 0..n {
            for j in i + 1..n {
                let d = self.distance_matrix.get(i, j);
                sum += d;
                count += 1;
                max_distance = max_distance.max(d);
            }
        }
        let avg_distance = if count > 0 { sum / count as f64 } else { 0.0 };

        InstanceStatistics {
            name: self.name.clone(),
            num_customers: self.num_customers(),
            capacity: self.capacity,
            total_demand,
            max_demand,
            min_vehicles: (total_demand / self.capacity).ceil() as usize,
            oversized_customers,
            avg_distance,
            max_distance,
        }
    }
}

/// Statistics about a CVRP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_customers: usize,
    pub capacity: f64,
    pub total_demand: f64,
    pub max_demand: f64,
    /// Lower bound on the number of vehicles, ceil(total demand / capacity)
    pub min_vehicles: usize,
    /// Customers whose demand alone exceeds the capacity
    pub oversized_customers: Vec<NodeId>,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {} (1 depot + {} customers)", self.num_customers + 1, self.num_customers)?;
        writeln!(f, "  Capacity: {:.2}", self.capacity)?;
        writeln!(f, "  Total demand: {:.2}", self.total_demand)?;
        writeln!(f, "  Max demand: {:.2}", self.max_demand)?;
        writeln!(f, "  Min vehicles: {}", self.min_vehicles)?;
        if !self.oversized_customers.is_empty() {
            let ids: Vec<&str> = self.oversized_customers.iter().map(|id| id.as_str()).collect();
            writeln!(f, "  Oversized customers: {}", ids.join(", "))?;
        }
        writeln!(f, "  Avg distance: {:.2} km", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2} km", self.max_distance)
    }
}

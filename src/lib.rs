//! CVRP Genetic Algorithm Solver Library
//!
//! A permutation-based genetic algorithm for the Capacitated Vehicle Routing
//! Problem with a single depot and a homogeneous fleet.
//!
//! # Features
//!
//! - Haversine distance matrix over latitude/longitude nodes
//! - Greedy capacity-based splitting of a customer permutation into routes
//! - Fleet cost model (fixed, distance, time and fuel costs) with a capacity penalty
//! - Genetic Algorithm (tournament selection, OX crossover, swap/inversion mutation)
//! - CSV instance loading, multi-seed benchmarking and SVG visualization
//!
//! # Example
//!
//! ```no_run
//! use cvrp_ga_solver::loader::InstanceFiles;
//! use cvrp_ga_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
//!
//! // Load instance
//! let files = InstanceFiles::from_dirs("data/base", "data/case1");
//! let instance = files.load().unwrap();
//!
//! // Run the GA
//! let mut ga = GeneticAlgorithm::new(&instance, GAConfig::default()).unwrap();
//! let solution = ga.run();
//!
//! println!("Solution cost: {:.2}", solution.cost);
//! ```

pub mod error;
pub mod distance;
pub mod instance;
pub mod evaluation;
pub mod fitness;
pub mod solution;
pub mod heuristics;
pub mod loader;
pub mod benchmark;
pub mod visualization;

pub use error::{Result, SolverError};
pub use instance::{CvrpInstance, NodeId, NodeIndex};
pub use solution::Solution;

//! Heuristics module for the CVRP.
//!
//! This module exports the route splitter and the genetic algorithm.

pub mod construction;
pub mod genetic;

pub use construction::*;
pub use genetic::*;

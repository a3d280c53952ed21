//! Benchmarking module for the CVRP genetic algorithm.
//!
//! Runs the GA over a range of seeds on one instance, collects one record per
//! run and summarizes the spread of the results.

use crate::error::Result;
use crate::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use crate::instance::CvrpInstance;
use crate::solution::Solution;

use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Result of a single GA run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Instance name
    pub instance: String,
    pub seed: u64,
    /// Penalized cost
    pub cost: f64,
    /// Cost without penalty
    pub total_cost: f64,
    pub max_violation: f64,
    pub feasible: bool,
    /// Number of vehicles dispatched
    pub routes: usize,
    pub generations: usize,
    /// Computation time in seconds
    pub time: f64,
}

impl RunResult {
    fn from_solution(instance: &CvrpInstance, solution: &Solution) -> Self {
        RunResult {
            instance: instance.name.clone(),
            seed: solution.seed,
            cost: solution.cost,
            total_cost: solution.stats.total_cost,
            max_violation: solution.stats.max_violation,
            feasible: solution.feasible,
            routes: solution.stats.num_routes,
            generations: solution.generations,
            time: solution.computation_time,
        }
    }
}

/// Aggregated statistics over all runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub instance: String,
    pub num_runs: usize,
    pub num_feasible: usize,
    pub best_cost: f64,
    pub mean_cost: f64,
    pub worst_cost: f64,
    /// Sample standard deviation of the cost (0 for a single run)
    pub std_cost: f64,
    pub mean_time: f64,
    pub total_time: f64,
    /// Seed of the cheapest run
    pub best_seed: u64,
}

/// Benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Number of independent runs
    pub num_runs: usize,
    /// Seeds used are `base_seed..base_seed + num_runs`, wrapping past `u64::MAX`
    pub base_seed: u64,
    /// Run in parallel
    pub parallel: bool,
    /// Display a progress bar
    pub show_progress: bool,
    /// GA settings shared by every run (the seed is overridden)
    pub ga: GAConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            base_seed: 0,
            parallel: true,
            show_progress: false,
            ga: GAConfig::default(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
    best: Option<Solution>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            best: None,
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(self.config.num_runs as u64);
        let style = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} runs {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    /// Run the GA once per seed. Results are stored in seed order.
    pub fn run(&mut self, instance: &CvrpInstance) -> Result<&[RunResult]> {
        self.config.ga.validate()?;
        log::info!(
            "Running benchmark on instance {}: {} runs from seed {}",
            instance.name,
            self.config.num_runs,
            self.config.base_seed
        );

        let seeds: Vec<u64> = (0..self.config.num_runs as u64)
            .map(|i| self.config.base_seed.wrapping_add(i))
            .collect();
        let pb = self.progress_bar();

        let run_one = |seed: u64| -> Result<Solution> {
            let config = GAConfig {
                seed,
                verbose: false,
                ..self.config.ga.clone()
            };
            let mut ga = GeneticAlgorithm::new(instance, config)?;
            let solution = ga.run();
            log::debug!("seed {} finished with cost {:.2}", seed, solution.cost);
            pb.inc(1);
            Ok(solution)
        };

        let solutions: Vec<Solution> = if self.config.parallel {
            seeds.into_par_iter().map(run_one).collect::<Result<Vec<_>>>()?
        } else {
            seeds.into_iter().map(run_one).collect::<Result<Vec<_>>>()?
        };
        pb.finish_with_message("done");

        self.results = solutions.iter().map(|s| RunResult::from_solution(instance, s)).collect();
        self.best = solutions.into_iter().min_by_key(|s| OrderedFloat(s.cost));

        if let Some(stats) = self.compute_statistics() {
            log::info!(
                "Benchmark finished: best {:.2} (seed {}), mean {:.2}, feasible {}/{}",
                stats.best_cost,
                stats.best_seed,
                stats.mean_cost,
                stats.num_feasible,
                stats.num_runs
            );
        }

        Ok(&self.results)
    }

    /// Summarize the runs, `None` before any run
    pub fn compute_statistics(&self) -> Option<BenchmarkStatistics> {
        let first = self.results.first()?;
        let best_run = self.results.iter().min_by_key(|r| OrderedFloat(r.cost))?;

        let costs: Vec<f64> = self.results.iter().map(|r| r.cost).collect();
        let times: Vec<f64> = self.results.iter().map(|r| r.time).collect();

        let std_cost = costs.iter().std_dev();

        Some(BenchmarkStatistics {
            instance: first.instance.clone(),
            num_runs: self.results.len(),
            num_feasible: self.results.iter().filter(|r| r.feasible).count(),
            best_cost: costs.iter().copied().fold(f64::INFINITY, f64::min),
            mean_cost: costs.iter().mean(),
            worst_cost: costs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_cost: if std_cost.is_nan() { 0.0 } else { std_cost },
            mean_time: times.iter().mean(),
            total_time: times.iter().sum(),
            best_seed: best_run.seed,
        })
    }

    /// Write one row per run
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_csv(File::create(path)?)
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);

        if let Some(stats) = self.compute_statistics() {
            writer.serialize(stats)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       CVRP GA Benchmark Report\n");
        report.push_str("========================================\n\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));

        let ga = &self.config.ga;
        report.push_str(&format!(
            "GA: population {}, generations {}, crossover {:.2}, mutation {:.2}, tournament {}\n\n",
            ga.population_size, ga.max_generations, ga.crossover_prob, ga.mutation_prob, ga.tournament_size
        ));

        report.push_str("Runs:\n");
        report.push_str("-".repeat(80).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:>8} {:>16} {:>16} {:>10} {:>8} {:>10}\n",
            "Seed", "Cost", "Total Cost", "Feasible", "Routes", "Time (s)"
        ));
        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        for result in &self.results {
            report.push_str(&format!(
                "{:>8} {:>16.2} {:>16.2} {:>10} {:>8} {:>10.4}\n",
                result.seed,
                result.cost,
                result.total_cost,
                if result.feasible { "yes" } else { "no" },
                result.routes,
                result.time
            ));
        }

        report.push_str("-".repeat(80).as_str());
        report.push('\n');

        match self.compute_statistics() {
            Some(stats) => {
                report.push_str(&format!("\nInstance: {}\n", stats.instance));
                report.push_str(&format!("Feasible runs: {}/{}\n", stats.num_feasible, stats.num_runs));
                report.push_str(&format!("Best cost: {:.2} (seed {})\n", stats.best_cost, stats.best_seed));
                report.push_str(&format!("Mean cost: {:.2} +/- {:.2}\n", stats.mean_cost, stats.std_cost));
                report.push_str(&format!("Worst cost: {:.2}\n", stats.worst_cost));
                report.push_str(&format!("Mean time: {:.4}s (total {:.4}s)\n", stats.mean_time, stats.total_time));
            }
            None => report.push_str("\nNo runs recorded.\n"),
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    /// Cheapest solution over all runs
    pub fn best_solution(&self) -> Option<&Solution> {
        self.best.as_ref()
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }
}

//! CVRP GA Solver - Command Line Interface
//!
//! Genetic algorithm for the Capacitated Vehicle Routing Problem over CSV instances.

use clap::{Args, Parser, Subcommand};
use cvrp_ga_solver::benchmark::{Benchmark, BenchmarkConfig};
use cvrp_ga_solver::error::{Result, SolverError};
use cvrp_ga_solver::fitness::FitnessFunction;
use cvrp_ga_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use cvrp_ga_solver::instance::CvrpInstance;
use cvrp_ga_solver::loader::{InstanceFiles, DEFAULT_SPEED_KMH};
use cvrp_ga_solver::solution::Solution;
use cvrp_ga_solver::visualization::render_solution;

use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cvrp-ga-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "A genetic algorithm solver for the Capacitated Vehicle Routing Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance with the genetic algorithm
    Solve {
        #[command(flatten)]
        instance: InstanceArgs,

        #[command(flatten)]
        ga: GaArgs,

        /// Write the solution report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the convergence history as CSV
        #[arg(long)]
        history: Option<PathBuf>,

        /// Write the routes as CSV
        #[arg(long)]
        routes: Option<PathBuf>,

        /// Directory for the route map and convergence plot
        #[arg(long)]
        visualize: Option<PathBuf>,
    },

    /// Run the GA over several seeds and summarize the results
    Benchmark {
        #[command(flatten)]
        instance: InstanceArgs,

        #[command(flatten)]
        ga: GaArgs,

        /// Number of runs
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Output directory for results
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Run the seeds one after the other
        #[arg(long)]
        sequential: bool,
    },

    /// Analyze an instance
    Analyze {
        #[command(flatten)]
        instance: InstanceArgs,
    },
}

#[derive(Args, Debug)]
struct InstanceArgs {
    /// Directory holding depots.csv
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Directory holding clients.csv, vehicles.csv and parameters_urban.csv
    #[arg(long)]
    case_dir: Option<PathBuf>,

    /// Depot table (overrides --base-dir)
    #[arg(long)]
    depots: Option<PathBuf>,

    /// Customer table (overrides --case-dir)
    #[arg(long)]
    clients: Option<PathBuf>,

    /// Fleet table (overrides --case-dir)
    #[arg(long)]
    vehicles: Option<PathBuf>,

    /// Cost parameter table (overrides --case-dir)
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Average speed in km/h
    #[arg(long, default_value_t = DEFAULT_SPEED_KMH)]
    speed: f64,
}

impl InstanceArgs {
    fn files(&self) -> Result<InstanceFiles> {
        let from_dirs = match (&self.base_dir, &self.case_dir) {
            (Some(base), Some(case)) => Some(InstanceFiles::from_dirs(base, case)),
            _ => None,
        };

        let pick = |explicit: &Option<PathBuf>, derived: Option<&PathBuf>, flag: &str| -> Result<PathBuf> {
            explicit
                .clone()
                .or_else(|| derived.cloned())
                .ok_or_else(|| SolverError::InvalidConfig(format!("missing --{} (or --base-dir and --case-dir)", flag)))
        };

        let depots = pick(&self.depots, from_dirs.as_ref().map(|f| &f.depots), "depots")?;
        let clients = pick(&self.clients, from_dirs.as_ref().map(|f| &f.clients), "clients")?;
        let vehicles = pick(&self.vehicles, from_dirs.as_ref().map(|f| &f.vehicles), "vehicles")?;
        let parameters = pick(&self.parameters, from_dirs.as_ref().map(|f| &f.parameters), "parameters")?;

        Ok(InstanceFiles::new(depots, clients, vehicles, parameters).with_speed(self.speed))
    }

    fn load(&self) -> Result<CvrpInstance> {
        let files = self.files()?;
        println!("Loading instance from {:?}...", files.clients.parent().unwrap_or(Path::new(".")));
        files.load()
    }
}

#[derive(Args, Debug)]
struct GaArgs {
    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Population size
    #[arg(long)]
    population: Option<usize>,

    /// Number of generations
    #[arg(long)]
    generations: Option<usize>,

    /// Crossover probability
    #[arg(long)]
    crossover: Option<f64>,

    /// Mutation probability
    #[arg(long)]
    mutation: Option<f64>,

    /// Tournament size
    #[arg(long)]
    tournament: Option<usize>,

    /// Weight of the capacity violation in the cost
    #[arg(long)]
    penalty: Option<f64>,

    /// Evaluate offspring in parallel
    #[arg(long)]
    parallel: bool,

    /// Silence progress output
    #[arg(short, long)]
    quiet: bool,

    /// JSON file with a base GA configuration; explicit flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

impl GaArgs {
    fn to_config(&self) -> Result<GAConfig> {
        let mut config: GAConfig = match &self.config {
            Some(path) => serde_json::from_reader(File::open(path)?)?,
            None => GAConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(population) = self.population {
            config.population_size = population;
        }
        if let Some(generations) = self.generations {
            config.max_generations = generations;
        }
        if let Some(crossover) = self.crossover {
            config.crossover_prob = crossover;
        }
        if let Some(mutation) = self.mutation {
            config.mutation_prob = mutation;
        }
        if let Some(tournament) = self.tournament {
            config.tournament_size = tournament;
        }
        if let Some(penalty) = self.penalty {
            config.penalty_weight = penalty;
        }
        if self.parallel {
            config.parallel_evaluation = true;
        }
        if self.quiet {
            config.verbose = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve { instance, ga, output, history, routes, visualize } => {
            solve_instance(&instance, &ga, output, history, routes, visualize)
        }

        Commands::Benchmark { instance, ga, runs, output_dir, sequential } => {
            run_benchmark(&instance, &ga, runs, &output_dir, sequential)
        }

        Commands::Analyze { instance } => analyze_instance(&instance),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_routes(instance: &CvrpInstance, solution: &Solution) {
    println!("\nRoutes:");
    for (i, summary) in solution.route_summaries(instance).iter().enumerate() {
        let ids: Vec<&str> = summary.customers.iter().map(|&c| instance.id_of(c).as_str()).collect();
        let depot = instance.id_of(instance.depot());
        let overload = if summary.is_overloaded() {
            format!("  OVERLOAD {:.2}", summary.violation)
        } else {
            String::new()
        };
        println!(
            "  Vehicle {:>3}: {} -> {} -> {}  (load {:.2}/{:.2}, {:.2} km){}",
            i + 1,
            depot,
            ids.join(" -> "),
            depot,
            summary.load,
            instance.capacity(),
            summary.distance,
            overload
        );
    }
}

fn solve_instance(
    instance_args: &InstanceArgs,
    ga_args: &GaArgs,
    output: Option<PathBuf>,
    history: Option<PathBuf>,
    routes: Option<PathBuf>,
    visualize: Option<PathBuf>,
) -> Result<()> {
    let instance = instance_args.load()?;
    let config = ga_args.to_config()?;

    if config.verbose {
        println!("{}", instance.statistics());
        println!(
            "GA: seed {}, population {}, generations {}, crossover {}, mutation {}, tournament {}",
            config.seed,
            config.population_size,
            config.max_generations,
            config.crossover_prob,
            config.mutation_prob,
            config.tournament_size
        );
    }

    let mut ga = GeneticAlgorithm::new(&instance, config)?;
    let solution = ga.run();

    println!("\n{}", solution);
    print_routes(&instance, &solution);

    if let Some(path) = output {
        solution.save_json(&instance, &path)?;
        println!("\nSolution saved to {:?}", path);
    }

    if let Some(path) = history {
        solution.export_history_csv(&path)?;
        println!("History saved to {:?}", path);
    }

    if let Some(path) = routes {
        solution.export_routes_csv(&instance, &path)?;
        println!("Routes saved to {:?}", path);
    }

    if let Some(dir) = visualize {
        render_solution(&instance, &solution, &dir)?;
        println!("Visualizations saved to {:?}", dir);
    }

    Ok(())
}

fn run_benchmark(
    instance_args: &InstanceArgs,
    ga_args: &GaArgs,
    runs: usize,
    output_dir: &Path,
    sequential: bool,
) -> Result<()> {
    let instance = instance_args.load()?;
    let ga = ga_args.to_config()?;

    let config = BenchmarkConfig {
        num_runs: runs,
        base_seed: ga.seed,
        parallel: !sequential,
        show_progress: !ga_args.quiet,
        ga,
    };

    std::fs::create_dir_all(output_dir)?;

    let mut benchmark = Benchmark::new(config);
    benchmark.run(&instance)?;

    let results_path = output_dir.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output_dir.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    if let Some(best) = benchmark.best_solution() {
        let best_path = output_dir.join("best_solution.json");
        best.save_json(&instance, &best_path)?;
        println!("Best solution saved to {:?}", best_path);
    }

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output_dir.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(instance_args: &InstanceArgs) -> Result<()> {
    let instance = instance_args.load()?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let costs = instance.costs();
    println!("Cost Parameters:");
    println!("  Fixed cost per vehicle: {:.2}", costs.fixed_cost);
    println!("  Distance cost per km: {:.2}", costs.distance_cost);
    println!("  Time cost per hour: {:.2}", costs.time_cost);
    println!("  Fuel price: {:.2}", costs.fuel_price);
    println!("  Fuel efficiency: {:.2} km/l", costs.fuel_efficiency);
    println!("  Speed: {:.2} km/h", costs.speed);

    let demands: Vec<f64> = instance.customers().iter().map(|&c| instance.demand(c)).collect();
    if !demands.is_empty() {
        let avg_demand = demands.iter().sum::<f64>() / demands.len() as f64;
        let min_demand = demands.iter().cloned().fold(f64::INFINITY, f64::min);

        println!("\nDemand Statistics:");
        println!("  Average: {:.2}", avg_demand);
        println!("  Min: {:.2}", min_demand);
        println!("  Capacity utilization ratio: {:.2}%", avg_demand / instance.capacity() * 100.0);
    }

    // Quick estimate: customers visited in id order
    let baseline = Solution::from_permutation(
        &instance,
        instance.customers().to_vec(),
        &FitnessFunction::default(),
        "IdOrder",
    );
    println!("\nQuick Solution Estimate:");
    println!(
        "  Id order split: {:.2} with {} vehicles (feasible: {})",
        baseline.cost, baseline.stats.num_routes, baseline.feasible
    );

    Ok(())
}

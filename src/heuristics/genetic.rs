//! Genetic Algorithm for the CVRP.
//!
//! Candidates are permutations of the customers; routes are always re-derived
//! from the permutation by the greedy splitter, so the permutation is the only
//! genetic material. The engine implements:
//! - Uniform random initialization
//! - Tournament selection without replacement
//! - Order Crossover (OX)
//! - Swap and segment-inversion mutation
//! - Generational replacement with elitist tracking of the all-time best
//!
//! Every randomized operator takes the random source explicitly, so a run is
//! fully determined by its seed.

use crate::error::{Result, SolverError};
use crate::evaluation::RouteStats;
use crate::fitness::{FitnessFunction, PENALTY_WEIGHT};
use crate::instance::{CvrpInstance, NodeIndex};
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;

/// Individual in the genetic algorithm population. Never mutated once evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    /// Customer ordering
    pub permutation: Vec<NodeIndex>,
    /// Penalized cost (lower is better)
    pub cost: f64,
    /// Unpenalized cost breakdown and capacity violation
    pub stats: RouteStats,
}

impl Individual {
    pub fn new(permutation: Vec<NodeIndex>, instance: &CvrpInstance, fitness: &FitnessFunction) -> Self {
        let scored = fitness.evaluate(instance, &permutation);

        Individual {
            permutation,
            cost: scored.cost,
            stats: scored.stats,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.stats.is_feasible()
    }
}

/// Genetic Algorithm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GAConfig {
    /// Random seed
    pub seed: u64,
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Crossover probability
    pub crossover_prob: f64,
    /// Probability that an offspring goes through mutation at all
    pub mutation_prob: f64,
    /// Swap sub-operator probability, once mutation is triggered
    pub swap_prob: f64,
    /// Segment inversion sub-operator probability, once mutation is triggered
    pub inversion_prob: f64,
    /// Tournament size for selection
    pub tournament_size: usize,
    /// Weight of the maximum capacity violation in the cost
    pub penalty_weight: f64,
    /// Log progress at info level
    pub verbose: bool,
    /// Generations between two progress lines
    pub log_interval: usize,
    /// Evaluate the offspring of a generation with rayon
    pub parallel_evaluation: bool,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            seed: 0,
            population_size: 80,
            max_generations: 400,
            crossover_prob: 0.9,
            mutation_prob: 0.3,
            swap_prob: 0.2,
            inversion_prob: 0.1,
            tournament_size: 3,
            penalty_weight: PENALTY_WEIGHT,
            verbose: true,
            log_interval: 20,
            parallel_evaluation: false,
        }
    }
}

impl GAConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(SolverError::InvalidConfig("population size must be at least 1".to_string()));
        }
        if self.tournament_size == 0 {
            return Err(SolverError::InvalidConfig("tournament size must be at least 1".to_string()));
        }
        let probabilities = [
            ("crossover_prob", self.crossover_prob),
            ("mutation_prob", self.mutation_prob),
            ("swap_prob", self.swap_prob),
            ("inversion_prob", self.inversion_prob),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(SolverError::InvalidConfig(format!("{} must be within [0, 1], got {}", name, p)));
            }
        }
        if !(self.penalty_weight.is_finite() && self.penalty_weight >= 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "penalty weight must be a non-negative number, got {}",
                self.penalty_weight
            )));
        }
        Ok(())
    }
}

/// Uniformly shuffled copy of the customer list
pub fn random_permutation<R: Rng + ?Sized>(customers: &[NodeIndex], rng: &mut R) -> Vec<NodeIndex> {
    let mut perm = customers.to_vec();
    perm.shuffle(rng);
    perm
}

/// Tournament selection: draw `k` distinct individuals and keep the cheapest.
///
/// `k` is clamped to the population size. Ties go to the first drawn.
///
/// # Panics
///
/// Panics if `population` is empty.
pub fn tournament_select<'a, R: Rng + ?Sized>(population: &'a [Individual], k: usize, rng: &mut R) -> &'a Individual {
    let k = k.clamp(1, population.len().max(1));
    let mut best: Option<usize> = None;

    for i in index::sample(rng, population.len(), k).iter() {
        if best.map_or(true, |b| population[i].cost < population[b].cost) {
            best = Some(i);
        }
    }

    &population[best.unwrap_or(0)]
}

/// Order Crossover (OX) with a uniformly random segment of at least two positions
pub fn order_crossover<R: Rng + ?Sized>(parent1: &[NodeIndex], parent2: &[NodeIndex], rng: &mut R) -> Vec<NodeIndex> {
    let n = parent1.len();
    if n < 2 {
        return parent1.to_vec();
    }

    let cut = index::sample(rng, n, 2);
    let (start, end) = (cut.index(0).min(cut.index(1)), cut.index(0).max(cut.index(1)));
    order_crossover_segment(parent1, parent2, start, end)
}

/// OX on a fixed segment: `parent1[start..=end]` is copied in place, the other
/// positions are filled left to right with the remaining customers in `parent2` order.
pub fn order_crossover_segment(parent1: &[NodeIndex], parent2: &[NodeIndex], start: usize, end: usize) -> Vec<NodeIndex> {
    let n = parent1.len();
    let segment: HashSet<NodeIndex> = parent1[start..=end].iter().copied().collect();
    let mut filler = parent2.iter().copied().filter(|c| !segment.contains(c));

    let mut child = Vec::with_capacity(n);
    for (i, &gene) in parent1.iter().enumerate() {
        if (start..=end).contains(&i) {
            child.push(gene);
        } else if let Some(next) = filler.next() {
            child.push(next);
        }
    }

    debug_assert_eq!(child.len(), n, "parents must be permutations of the same customers");
    child
}

/// Swap mutation: exchange two distinct random positions
pub fn swap_mutation<R: Rng + ?Sized>(perm: &mut [NodeIndex], rng: &mut R) {
    if perm.len() < 2 {
        return;
    }
    let pos = index::sample(rng, perm.len(), 2);
    perm.swap(pos.index(0), pos.index(1));
}

/// Inversion mutation: reverse a random segment of at least two positions
pub fn inversion_mutation<R: Rng + ?Sized>(perm: &mut [NodeIndex], rng: &mut R) {
    if perm.len() < 2 {
        return;
    }
    let pos = index::sample(rng, perm.len(), 2);
    let (start, end) = (pos.index(0).min(pos.index(1)), pos.index(0).max(pos.index(1)));
    perm[start..=end].reverse();
}

/// Apply each sub-operator independently with its own probability
pub fn mutate<R: Rng + ?Sized>(perm: &[NodeIndex], swap_prob: f64, inversion_prob: f64, rng: &mut R) -> Vec<NodeIndex> {
    let mut child = perm.to_vec();

    if rng.gen::<f64>() < swap_prob {
        swap_mutation(&mut child, rng);
    }
    if rng.gen::<f64>() < inversion_prob {
        inversion_mutation(&mut child, rng);
    }

    child
}

fn best_of(population: &[Individual]) -> Option<&Individual> {
    population.iter().min_by_key(|ind| OrderedFloat(ind.cost))
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm<'a> {
    config: GAConfig,
    instance: &'a CvrpInstance,
    fitness: FitnessFunction,
    population: Vec<Individual>,
    best_individual: Option<Individual>,
    history: Vec<f64>,
    rng: ChaCha8Rng,
    generation: usize,
}

impl<'a> GeneticAlgorithm<'a> {
    pub fn new(instance: &'a CvrpInstance, config: GAConfig) -> Result<Self> {
        config.validate()?;
        if config.tournament_size > config.population_size {
            log::warn!(
                "tournament size {} exceeds population size {}; clamping",
                config.tournament_size,
                config.population_size
            );
        }

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let fitness = FitnessFunction::new(config.penalty_weight);

        Ok(GeneticAlgorithm {
            config,
            instance,
            fitness,
            population: Vec::new(),
            best_individual: None,
            history: Vec::new(),
            rng,
            generation: 0,
        })
    }

    /// Evaluate candidates in order. The random source is never touched here, so
    /// parallel and sequential evaluation give identical populations.
    fn evaluate_all(&self, permutations: Vec<Vec<NodeIndex>>) -> Vec<Individual> {
        let instance = self.instance;
        let fitness = &self.fitness;

        if self.config.parallel_evaluation {
            permutations
                .into_par_iter()
                .map(|perm| Individual::new(perm, instance, fitness))
                .collect()
        } else {
            permutations
                .into_iter()
                .map(|perm| Individual::new(perm, instance, fitness))
                .collect()
        }
    }

    /// Initialize population with random permutations
    fn initialize_population(&mut self) {
        let customers = self.instance.customers();
        let permutations: Vec<Vec<NodeIndex>> = (0..self.config.population_size)
            .map(|_| random_permutation(customers, &mut self.rng))
            .collect();

        self.population = self.evaluate_all(permutations);
        self.best_individual = best_of(&self.population).cloned();
        self.generation = 0;
        self.history.clear();

        if let Some(best) = &self.best_individual {
            self.history.push(best.cost);
            let feasible_count = self.population.iter().filter(|i| i.is_feasible()).count();
            log::debug!(
                "[GA] Initialized population: {} (feasible: {})",
                self.population.len(),
                feasible_count
            );
        }
    }

    /// Select two parents, recombine and mutate into one offspring permutation
    fn breed(&mut self) -> Vec<NodeIndex> {
        let k = self.config.tournament_size;
        let parent1 = tournament_select(&self.population, k, &mut self.rng);
        let parent2 = tournament_select(&self.population, k, &mut self.rng);

        let child = if self.rng.gen::<f64>() < self.config.crossover_prob {
            order_crossover(&parent1.permutation, &parent2.permutation, &mut self.rng)
        } else {
            parent1.permutation.clone()
        };

        if self.rng.gen::<f64>() < self.config.mutation_prob {
            mutate(&child, self.config.swap_prob, self.config.inversion_prob, &mut self.rng)
        } else {
            child
        }
    }

    /// Create new generation
    fn evolve(&mut self) {
        let offspring: Vec<Vec<NodeIndex>> = (0..self.config.population_size).map(|_| self.breed()).collect();
        let new_population = self.evaluate_all(offspring);

        if let Some(candidate) = best_of(&new_population) {
            let improved = self
                .best_individual
                .as_ref()
                .map_or(true, |current| candidate.cost < current.cost);
            if improved {
                self.best_individual = Some(candidate.clone());
            }
        }

        self.population = new_population;
        self.generation += 1;

        if let Some(best) = &self.best_individual {
            self.history.push(best.cost);
        }
    }

    fn log_progress(&self) {
        let Some(best) = &self.best_individual else {
            return;
        };
        let interval = self.config.log_interval.max(1);

        if self.config.verbose && (self.generation == 0 || self.generation % interval == 0) {
            if self.generation == 0 {
                log::info!("[GA] Initial: best cost = {:.2}", best.cost);
            } else {
                log::info!("[GA] Gen {:4}: best cost = {:.2}", self.generation, best.cost);
            }
        } else {
            log::debug!(
                "[GA] Gen {}  Best cost {:.3}  Feasible {}  Diversity {:.2}",
                self.generation,
                best.cost,
                best.is_feasible(),
                self.population_diversity()
            );
        }
    }

    /// Run the genetic algorithm for the configured number of generations
    pub fn run(&mut self) -> Solution {
        let start = Instant::now();

        self.initialize_population();
        self.log_progress();

        for _ in 0..self.config.max_generations {
            self.evolve();
            self.log_progress();
        }

        let mut solution = self.best_solution().unwrap_or_default();
        solution.seed = self.config.seed;
        solution.history = self.history.clone();
        solution.generations = self.generation;
        solution.computation_time = start.elapsed().as_secs_f64();

        solution
    }

    /// Get current best solution, with routes re-derived from its permutation
    pub fn best_solution(&self) -> Option<Solution> {
        self.best_individual.as_ref().map(|ind| {
            Solution::from_permutation(self.instance, ind.permutation.clone(), &self.fitness, "GeneticAlgorithm")
        })
    }

    pub fn best_individual(&self) -> Option<&Individual> {
        self.best_individual.as_ref()
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Best cost so far, one entry for the initial population and one per generation
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Get current generation
    pub fn current_generation(&self) -> usize {
        self.generation
    }

    /// Get population diversity (average number of differing positions between individuals)
    pub fn population_diversity(&self) -> f64 {
        let sample = &self.population[..self.population.len().min(20)];
        if sample.len() < 2 {
            return 0.0;
        }

        let mut total_diff = 0.0;
        let mut count = 0;

        for i in 0..sample.len() {
            for j in i + 1..sample.len() {
                let diff = sample[i]
                    .permutation
                    .iter()
                    .zip(sample[j].permutation.iter())
                    .filter(|(a, b)| a != b)
                    .count();
                total_diff += diff as f64;
                count += 1;
            }
        }

        total_diff / count as f64
    }
}

/// Build and run a GA in one call
pub fn run_genetic_algorithm(instance: &CvrpInstance, config: GAConfig) -> Result<Solution> {
    let mut ga = GeneticAlgorithm::new(instance, config)?;
    Ok(ga.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{CostParameters, Node};
    use proptest::prelude::*;

    fn create_test_instance() -> CvrpInstance {
        let costs = CostParameters {
            fixed_cost: 50.0,
            distance_cost: 2.0,
            time_cost: 10.0,
            fuel_price: 1.5,
            fuel_efficiency: 8.0,
            speed: 25.0,
        };
        let customers = (0..12)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / 12.0;
                Node::new(
                    format!("C{:02}", i),
                    4.60 + 0.05 * angle.sin(),
                    -74.08 + 0.05 * angle.cos(),
                    1.0 + (i % 4) as f64,
                )
            })
            .collect();

        CvrpInstance::new("ring", Node::depot("D", 4.60, -74.08), customers, 10.0, costs).unwrap()
    }

    fn small_config(seed: u64) -> GAConfig {
        GAConfig {
            seed,
            population_size: 20,
            max_generations: 30,
            verbose: false,
            ..Default::default()
        }
    }

    fn is_permutation_of(perm: &[NodeIndex], reference: &[NodeIndex]) -> bool {
        let mut a = perm.to_vec();
        let mut b = reference.to_vec();
        a.sort();
        b.sort();
        a == b
    }

    fn perm(ids: &[usize]) -> Vec<NodeIndex> {
        ids.iter().map(|&i| NodeIndex(i)).collect()
    }

    #[test]
    fn test_genetic_algorithm() {
        let instance = create_test_instance();
        let mut ga = GeneticAlgorithm::new(&instance, small_config(7)).unwrap();
        let solution = ga.run();

        assert!(solution.is_complete(&instance));
        assert!(solution.feasible);
        assert_eq!(solution.generations, 30);
        assert_eq!(solution.history.len(), 31);
        assert_eq!(ga.population().len(), 20);
        assert_eq!(solution.history.last().copied(), Some(solution.cost));

        let flattened: Vec<NodeIndex> = solution.routes.iter().flatten().copied().collect();
        assert_eq!(flattened, solution.permutation);
    }

    #[test]
    fn test_history_non_increasing() {
        let instance = create_test_instance();
        let solution = run_genetic_algorithm(&instance, small_config(3)).unwrap();

        for pair in solution.history.windows(2) {
            assert!(pair[1] <= pair[0], "history increased: {:?}", pair);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let instance = create_test_instance();
        let first = run_genetic_algorithm(&instance, small_config(42)).unwrap();
        let second = run_genetic_algorithm(&instance, small_config(42)).unwrap();

        assert_eq!(first.permutation, second.permutation);
        assert_eq!(first.cost, second.cost);
        assert_eq!(first.history, second.history);
    }

    #[test]
    fn test_parallel_evaluation_matches_sequential() {
        let instance = create_test_instance();
        let sequential = run_genetic_algorithm(&instance, small_config(11)).unwrap();
        let parallel = run_genetic_algorithm(
            &instance,
            GAConfig {
                parallel_evaluation: true,
                ..small_config(11)
            },
        )
        .unwrap();

        assert_eq!(sequential.permutation, parallel.permutation);
        assert_eq!(sequential.history, parallel.history);
    }

    #[test]
    fn test_best_matches_initial_population() {
        let instance = create_test_instance();
        let mut ga = GeneticAlgorithm::new(&instance, GAConfig { max_generations: 0, ..small_config(5) }).unwrap();
        let solution = ga.run();

        let min_cost = ga.population().iter().map(|i| i.cost).fold(f64::INFINITY, f64::min);
        assert_eq!(solution.history, vec![min_cost]);
        assert_eq!(solution.cost, min_cost);
        assert_eq!(solution.generations, 0);
    }

    #[test]
    fn test_infeasible_instance_still_runs() {
        let instance = CvrpInstance::new(
            "oversized",
            Node::depot("D", 0.0, 0.0),
            vec![Node::new("A", 0.0, 0.1, 3.0), Node::new("B", 0.1, 0.0, 12.0)],
            10.0,
            CostParameters::default(),
        )
        .unwrap();
        let solution = run_genetic_algorithm(&instance, small_config(1)).unwrap();

        assert!(!solution.feasible);
        assert!((solution.stats.max_violation - 2.0).abs() < 1e-12);
        assert!(solution.cost >= 2.0 * PENALTY_WEIGHT);
    }

    #[test]
    fn test_no_customers() {
        let instance = CvrpInstance::new("empty", Node::depot("D", 0.0, 0.0), vec![], 10.0, CostParameters::default())
            .unwrap();
        let solution = run_genetic_algorithm(&instance, small_config(1)).unwrap();

        assert!(solution.permutation.is_empty());
        assert!(solution.routes.is_empty());
        assert!(solution.history.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_config_validation() {
        assert!(GAConfig::default().validate().is_ok());
        assert!(GAConfig { population_size: 0, ..Default::default() }.validate().is_err());
        assert!(GAConfig { tournament_size: 0, ..Default::default() }.validate().is_err());
        assert!(GAConfig { crossover_prob: 1.5, ..Default::default() }.validate().is_err());
        assert!(GAConfig { inversion_prob: -0.1, ..Default::default() }.validate().is_err());
        assert!(GAConfig { penalty_weight: f64::NAN, ..Default::default() }.validate().is_err());

        let instance = create_test_instance();
        assert!(GeneticAlgorithm::new(&instance, GAConfig { population_size: 0, ..Default::default() }).is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: GAConfig = serde_json::from_str(r#"{"seed": 9, "population_size": 40}"#).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.population_size, 40);
        assert_eq!(config.max_generations, 400);
        assert_eq!(config.tournament_size, 3);
    }

    #[test]
    fn test_tournament_picks_cheapest() {
        let instance = create_test_instance();
        let fitness = FitnessFunction::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let population: Vec<Individual> = (0..6)
            .map(|_| Individual::new(random_permutation(instance.customers(), &mut rng), &instance, &fitness))
            .collect();

        let cheapest = population.iter().map(|i| i.cost).fold(f64::INFINITY, f64::min);
        let winner = tournament_select(&population, population.len(), &mut rng);
        assert_eq!(winner.cost, cheapest);

        // Oversized tournaments are clamped to the population
        let winner = tournament_select(&population, 100, &mut rng);
        assert_eq!(winner.cost, cheapest);
    }

    #[test]
    fn test_order_crossover_segment() {
        let p1 = perm(&[1, 2, 3, 4, 5, 6]);
        let p2 = perm(&[6, 5, 4, 3, 2, 1]);

        assert_eq!(order_crossover_segment(&p1, &p2, 1, 3), perm(&[6, 2, 3, 4, 5, 1]));
        assert_eq!(order_crossover_segment(&p1, &p2, 0, 5), p1);
        assert_eq!(order_crossover_segment(&p1, &p2, 4, 5), perm(&[4, 3, 2, 1, 5, 6]));
    }

    #[test]
    fn test_crossover_of_identical_parents() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let p = perm(&[3, 1, 4, 2, 5]);
        assert_eq!(order_crossover(&p, &p, &mut rng), p);
        assert_eq!(order_crossover(&p[..1], &p[..1], &mut rng), perm(&[3]));
    }

    #[test]
    fn test_mutation_probabilities() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let p = perm(&[1, 2, 3, 4, 5, 6, 7]);

        assert_eq!(mutate(&p, 0.0, 0.0, &mut rng), p);

        let swapped = mutate(&p, 1.0, 0.0, &mut rng);
        let changed = p.iter().zip(swapped.iter()).filter(|(a, b)| a != b).count();
        assert_eq!(changed, 2);

        let single = perm(&[9]);
        assert_eq!(mutate(&single, 1.0, 1.0, &mut rng), single);
    }

    #[test]
    fn test_inversion_reverses_contiguous_segment() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let original = perm(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut p = original.clone();
        inversion_mutation(&mut p, &mut rng);

        let first = p.iter().zip(original.iter()).position(|(a, b)| a != b);
        let last = p.iter().zip(original.iter()).rposition(|(a, b)| a != b);
        if let (Some(start), Some(end)) = (first, last) {
            let mut reversed = original[start..=end].to_vec();
            reversed.reverse();
            assert_eq!(&p[start..=end], reversed.as_slice());
        } else {
            panic!("inversion must change at least two positions");
        }
    }

    proptest! {
        #[test]
        fn test_crossover_yields_permutation(seed in any::<u64>(), n in 0usize..40) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let customers: Vec<NodeIndex> = (1..=n).map(NodeIndex).collect();
            let p1 = random_permutation(&customers, &mut rng);
            let p2 = random_permutation(&customers, &mut rng);

            let child = order_crossover(&p1, &p2, &mut rng);
            prop_assert!(is_permutation_of(&child, &customers));
        }

        #[test]
        fn test_mutation_yields_permutation(seed in any::<u64>(), n in 0usize..40) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let customers: Vec<NodeIndex> = (1..=n).map(NodeIndex).collect();
            let p = random_permutation(&customers, &mut rng);

            let child = mutate(&p, 1.0, 1.0, &mut rng);
            prop_assert!(is_permutation_of(&child, &customers));

            let mut swapped = p.clone();
            swap_mutation(&mut swapped, &mut rng);
            prop_assert!(is_permutation_of(&swapped, &customers));
        }
    }
}

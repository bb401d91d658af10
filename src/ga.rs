use std::cmp::Ordering;

use geo::Area;
use geo_types::Polygon;
use log::{debug, info};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::cache::{BIN_ID, NfpCache};
use crate::config::{BinSpec, NestConfig};
use crate::error::NestError;
use crate::fit_poly::FitPoly;
use crate::geometry::rect_polygon;
use crate::nest::{missing_nfp_tasks, nest};
use crate::session::{Progress, Stage};

/// One candidate fit: an ordering of shape instances with their
/// rotations, scored after placement.
#[derive(Debug, Clone)]
pub struct Solution {
    pub polys: Vec<FitPoly>,
    pub fitness: Option<f64>,
    pub fitted: Option<Vec<Vec<usize>>>,
}

impl Solution {
    pub fn new(polys: Vec<FitPoly>) -> Self {
        Self {
            polys,
            fitness: None,
            fitted: None,
        }
    }

    /// Run the placement once; later calls are no-ops until a mutation
    /// invalidates the result.
    pub fn fit(&mut self, bin: &FitPoly, cache: &NfpCache) -> Result<(), NestError> {
        if self.fitted.is_some() {
            return Ok(());
        }
        let (fitness, bins) = nest(bin, &mut self.polys, cache)?;
        self.fitness = Some(fitness);
        self.fitted = Some(bins);
        Ok(())
    }

    /// Randomly swap neighboring shapes and re-roll rotations.
    fn mutate(&mut self, rng: &mut StdRng, mutation_rate: u32, rotations: u32) {
        let chance = f64::from(mutation_rate) * 0.01;
        for i in 0..self.polys.len() {
            if rng.r#gen::<f64>() < chance && i + 1 < self.polys.len() {
                self.polys.swap(i, i + 1);
            }
            if rng.r#gen::<f64>() < chance {
                let angle = random_angle(rng, rotations);
                self.polys[i].rotate(angle);
            }
        }
        self.fitness = None;
        self.fitted = None;
    }
}

/// A rotation from the allowed set `{k * 360/n}`.
fn random_angle(rng: &mut StdRng, rotations: u32) -> f64 {
    let k = rng.gen_range(0..rotations);
    f64::from(k) * (360.0 / f64::from(rotations))
}

fn cmp_fitness(a: &Solution, b: &Solution) -> Ordering {
    a.fitness
        .unwrap_or(f64::MAX)
        .partial_cmp(&b.fitness.unwrap_or(f64::MAX))
        .unwrap_or(Ordering::Equal)
}

/// Draw an index with the given weights, optionally excluding one.
fn weighted_index(rng: &mut StdRng, weights: &[f64], exclude: Option<usize>) -> usize {
    let total: f64 = weights
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(_, w)| w)
        .sum();
    let mut draw = rng.r#gen::<f64>() * total;
    let mut last = 0;
    for (i, w) in weights.iter().enumerate() {
        if Some(i) == exclude {
            continue;
        }
        last = i;
        if draw < *w {
            return i;
        }
        draw -= w;
    }
    last
}

/// Two distinct parents drawn without replacement.
fn pick_parents(rng: &mut StdRng, weights: &[f64]) -> (usize, usize) {
    let first = weighted_index(rng, weights, None);
    let second = weighted_index(rng, weights, Some(first));
    (first, second)
}

/// Genetic search over shape orderings and rotations.
///
/// Owns the worker pool, the RNG and the NFP cache for one run; the pool
/// is released when the fitter is dropped.
pub struct FitterGa {
    bin: FitPoly,
    polys: Vec<FitPoly>,
    config: NestConfig,
    cache: NfpCache,
    pool: rayon::ThreadPool,
    rng: StdRng,
}

impl FitterGa {
    pub fn new(bin: BinSpec, config: NestConfig) -> Result<Self, NestError> {
        bin.validate()?;
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_workers)
            .build()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            bin: FitPoly::new(BIN_ID, 0, rect_polygon(bin.width, bin.height)),
            polys: Vec::new(),
            config,
            cache: NfpCache::new(),
            pool,
            rng,
        })
    }

    /// Register the shapes to pack. Each requested copy becomes its own
    /// instance sharing the source shape's id, so the NFP cache is
    /// reused across copies.
    pub fn set_shapes(&mut self, shapes: &[(u32, Polygon<f64>, usize)]) {
        self.polys.clear();
        let mut instance = 0u64;
        for (shape_id, polygon, count) in shapes {
            for _ in 0..*count {
                instance += 1;
                self.polys
                    .push(FitPoly::new(*shape_id, instance, polygon.clone()));
            }
        }
    }

    /// Number of distinct fit polygons computed so far.
    pub fn cached_nfps(&self) -> usize {
        self.cache.len()
    }

    /// Evolve the population and return the best solution found.
    pub fn calculate_fit(
        &mut self,
        progress: Option<&dyn Fn(Progress)>,
    ) -> Result<Solution, NestError> {
        self.cache.clear();

        // Largest shapes first is the seed ordering.
        let mut ordered = self.polys.clone();
        ordered.sort_by(|a, b| {
            b.polygon
                .unsigned_area()
                .partial_cmp(&a.polygon.unsigned_area())
                .unwrap_or(Ordering::Equal)
        });

        let mut population = vec![Solution::new(ordered.clone())];
        while population.len() < self.config.population_size {
            let mut mutant = Solution::new(ordered.clone());
            mutant.mutate(&mut self.rng, self.config.mutation_rate, self.config.rotations);
            population.push(mutant);
        }

        let generations = self.config.num_generations;
        for generation in 0..generations {
            self.fill_cache(&population);
            self.evaluate(&mut population)?;

            if generation < generations - 1 {
                population = self.new_generation(population);
            }

            if let Some(best) = population
                .iter()
                .filter_map(|s| s.fitness)
                .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            {
                debug!(
                    "generation {}/{}: best fitness {:.4}, {} cached nfps",
                    generation + 1,
                    generations,
                    best,
                    self.cache.len()
                );
            }
            if let Some(cb) = progress {
                cb(Progress {
                    stage: Stage::Generations,
                    index: generation + 1,
                    total: generations,
                });
            }
        }

        population.sort_by(cmp_fitness);
        let best = population.swap_remove(0);

        let placed = best.polys.iter().filter(|p| p.placed).count();
        info!(
            "placed {} of {} shapes across {} bins, fitness {:.4}",
            placed,
            best.polys.len(),
            best.fitted.as_ref().map_or(0, |b| b.len()),
            best.fitness.unwrap_or(f64::INFINITY)
        );
        Ok(best)
    }

    /// Compute every missing fit polygon for the population in one
    /// parallel sweep and merge the results into the cache.
    fn fill_cache(&mut self, population: &[Solution]) {
        let tasks = missing_nfp_tasks(
            population.iter().map(|s| s.polys.as_slice()),
            &self.bin,
            &self.cache,
        );
        if tasks.is_empty() {
            return;
        }
        let chunk = tasks.len().div_ceil(self.config.n_workers);
        let results: Vec<_> = self.pool.install(|| {
            tasks
                .par_chunks(chunk)
                .flat_map_iter(|chunk| chunk.iter().map(|(key, task)| (*key, task.compute())))
                .collect()
        });
        self.cache.extend(results);
    }

    /// Fit every solution, splitting the population into chunks so tiny
    /// populations are not fragmented into trivial work items.
    fn evaluate(&self, population: &mut [Solution]) -> Result<(), NestError> {
        let chunks = self.config.n_workers.min((population.len() / 5).max(1));
        let chunk = population.len().div_ceil(chunks);
        let bin = &self.bin;
        let cache = &self.cache;
        self.pool.install(|| {
            population.par_chunks_mut(chunk).try_for_each(|solutions| {
                for solution in solutions {
                    solution.fit(bin, cache)?;
                }
                Ok(())
            })
        })
    }

    /// Elitism plus rank-weighted crossover and mutation.
    fn new_generation(&mut self, mut population: Vec<Solution>) -> Vec<Solution> {
        population.sort_by(cmp_fitness);

        let mut new_pop = Vec::with_capacity(population.len());
        new_pop.push(population[0].clone());

        let weights: Vec<f64> = (0..population.len())
            .map(|i| 1.0 / (i + 1) as f64)
            .collect();

        while new_pop.len() < population.len() {
            let (male, female) = pick_parents(&mut self.rng, &weights);
            let (mut child1, mut child2) = self.mate(&population[male], &population[female]);
            child1.mutate(&mut self.rng, self.config.mutation_rate, self.config.rotations);
            new_pop.push(child1);
            if new_pop.len() < population.len() {
                child2.mutate(&mut self.rng, self.config.mutation_rate, self.config.rotations);
                new_pop.push(child2);
            }
        }
        new_pop
    }

    /// Single point order crossover. Children take the head of one
    /// parent and fill the tail in the other parent's order, keeping
    /// each instance exactly once.
    fn mate(&mut self, male: &Solution, female: &Solution) -> (Solution, Solution) {
        let n = male.polys.len();
        if n <= 1 {
            // nothing to recombine, just force a refit
            let mut a = male.clone();
            let mut b = female.clone();
            a.fitted = None;
            b.fitted = None;
            return (a, b);
        }

        let cut = self.rng.gen_range(1..n);

        let mut child1: Vec<FitPoly> = male.polys[..cut].to_vec();
        for poly in &female.polys {
            if !child1.iter().any(|x| x.instance_id == poly.instance_id) {
                child1.push(poly.clone());
            }
        }
        let mut child2: Vec<FitPoly> = female.polys[..cut].to_vec();
        for poly in &male.polys {
            if !child2.iter().any(|x| x.instance_id == poly.instance_id) {
                child2.push(poly.clone());
            }
        }

        (Solution::new(child1), Solution::new(child2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::LineString;

    fn square(size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)]),
            vec![],
        )
    }

    fn fitter(seed: u64) -> FitterGa {
        let cfg = NestConfig {
            num_generations: 2,
            population_size: 4,
            mutation_rate: 50,
            rotations: 4,
            n_workers: 1,
            seed: Some(seed),
        };
        FitterGa::new(BinSpec::new(300.0, 300.0), cfg).unwrap()
    }

    #[test]
    fn crossover_keeps_every_instance_once() {
        let mut ga = fitter(7);
        ga.set_shapes(&[(1, square(50.0), 3), (2, square(30.0), 2)]);
        let male = Solution::new(ga.polys.clone());
        let mut female = Solution::new(ga.polys.clone());
        female.polys.reverse();

        let (c1, c2) = ga.mate(&male, &female);
        for child in [&c1, &c2] {
            let mut ids: Vec<u64> = child.polys.iter().map(|p| p.instance_id).collect();
            ids.sort_unstable();
            assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn mutation_invalidates_previous_fit() {
        let mut ga = fitter(3);
        ga.set_shapes(&[(1, square(50.0), 2)]);
        let mut sol = Solution::new(ga.polys.clone());
        sol.fitness = Some(1.5);
        sol.fitted = Some(vec![vec![0, 1]]);
        sol.mutate(&mut ga.rng, 100, 4);
        assert!(sol.fitness.is_none());
        assert!(sol.fitted.is_none());
    }

    #[test]
    fn mutated_rotations_stay_in_the_allowed_set() {
        let mut ga = fitter(11);
        ga.set_shapes(&[(1, square(50.0), 4)]);
        let mut sol = Solution::new(ga.polys.clone());
        for _ in 0..20 {
            sol.mutate(&mut ga.rng, 100, 4);
        }
        for poly in &sol.polys {
            let canonical = poly.rotation.rem_euclid(360.0);
            let step = canonical / 90.0;
            assert!((step - step.round()).abs() < 1e-6, "rotation {canonical}");
        }
    }

    #[test]
    fn new_generation_carries_the_best_forward() {
        let mut ga = fitter(5);
        ga.set_shapes(&[(1, square(50.0), 3)]);
        let mut population = Vec::new();
        for fitness in [3.0, 1.25, 2.0, 4.0] {
            let mut sol = Solution::new(ga.polys.clone());
            sol.fitness = Some(fitness);
            sol.fitted = Some(Vec::new());
            population.push(sol);
        }

        let next = ga.new_generation(population);
        assert_eq!(next.len(), 4);
        assert_eq!(next[0].fitness, Some(1.25));
        assert!(next[0].fitted.is_some(), "elite must not be re-fit");
        for child in &next[1..] {
            assert!(child.fitness.is_none());
        }
    }

    #[test]
    fn weighted_pick_excludes_first_parent() {
        let mut ga = fitter(9);
        let weights: Vec<f64> = (0..6).map(|i| 1.0 / (i + 1) as f64).collect();
        for _ in 0..50 {
            let (a, b) = pick_parents(&mut ga.rng, &weights);
            assert_ne!(a, b);
            assert!(a < 6 && b < 6);
        }
    }

    #[test]
    fn single_shape_mate_forces_refit() {
        let mut ga = fitter(13);
        ga.set_shapes(&[(1, square(50.0), 1)]);
        let mut male = Solution::new(ga.polys.clone());
        male.fitted = Some(Vec::new());
        male.fitness = Some(1.0);
        let female = male.clone();
        let (c1, c2) = ga.mate(&male, &female);
        assert!(c1.fitted.is_none());
        assert!(c2.fitted.is_none());
    }
}

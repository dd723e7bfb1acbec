use std::error::Error;

use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use rayon::prelude::*;
use yaml_rust::Yaml;

use super::config_utils;
use super::error::Result;
use super::optimizer::Optimizer;


#[derive(PartialEq, Debug, Clone)]
pub struct SearchConfig {
    // sweeps per start
    pub max_iterations: usize,
    // first step, as a fraction of each route's frequency range
    pub initial_step: f64,
    // stop once every step is below this fraction of its range
    pub min_step: f64,
    pub penalty_weight: f64,
    pub num_starts: usize,
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> SearchConfig {
        return SearchConfig {
            max_iterations: 200,
            initial_step: 0.25,
            min_step: 1e-3,
            penalty_weight: 1e3,
            num_starts: 4,
            seed: 100,
        };
    }
}

impl SearchConfig {
    pub fn from_yaml(yaml_cfg: &Yaml) -> std::result::Result<SearchConfig, Box<dyn Error>> {
        let defaults = SearchConfig::default();
        let cfg = SearchConfig {
            max_iterations: config_utils::get_usize_or(yaml_cfg, "max_iterations",
                                                       defaults.max_iterations)?,
            initial_step: config_utils::get_f64_or(yaml_cfg, "initial_step",
                                                   defaults.initial_step)?,
            min_step: config_utils::get_f64_or(yaml_cfg, "min_step", defaults.min_step)?,
            penalty_weight: config_utils::get_f64_or(yaml_cfg, "penalty_weight",
                                                     defaults.penalty_weight)?,
            num_starts: config_utils::get_usize_or(yaml_cfg, "num_starts",
                                                   defaults.num_starts)?,
            seed: config_utils::get_usize_or(yaml_cfg, "seed", defaults.seed as usize)? as u64,
        };
        if !(cfg.initial_step > 0.) || !(cfg.min_step > 0.) || cfg.penalty_weight < 0. {
            return Err("search steps must be positive and the penalty non-negative".into());
        }
        if cfg.num_starts == 0 {
            return Err("search needs at least one start".into());
        }
        return Ok(cfg);
    }
}


#[derive(Debug, Clone)]
pub struct SearchResult {
    pub frequencies: Vec<f64>,
    pub vrc: f64,
    pub objective: f64,
    pub load_constrains: Vec<f64>,
    pub frequency_constrains: Vec<f64>,
    pub num_evaluations: usize,
}


/// VRC plus a quadratic penalty on every violated constraint.
pub fn penalized_objective(optimizer: &Optimizer, fopt: &[f64], penalty_weight: f64)
                           -> Result<f64> {
    let vrc = optimizer.vrc(fopt)?;
    let (load, bounds) = optimizer.get_constrains(fopt)?;
    let violation: f64 = load.iter().chain(bounds.iter())
        .map(|gg| gg.min(0.).powi(2))
        .sum();
    return Ok(vrc + penalty_weight * violation);
}

/// Searches for the frequencies minimizing the penalized VRC, with a pattern search run from
/// the network's initial frequencies and from random starting points.
pub fn minimize(optimizer: &Optimizer, cfg: &SearchConfig) -> Result<SearchResult> {
    let (lower, upper) = optimizer.frequency_bounds()?;
    let mut rng = Isaac64Rng::seed_from_u64(cfg.seed);
    let mut starts = vec![optimizer.f0().to_vec()];
    for _ in 1..cfg.num_starts {
        let start = lower.iter().zip(&upper)
            .map(|(lo, hi)| rng.gen_range(*lo..=*hi))
            .collect();
        starts.push(start);
    }

    let mut best: Option<(Vec<f64>, f64)> = None;
    let mut num_evaluations = 0;
    for (si, start) in starts.iter().enumerate() {
        let (point, value, evals) = pattern_search(optimizer, start, &lower, &upper, cfg)?;
        num_evaluations += evals;
        log::info!("start {}: objective {} after {} evaluations", si, value, evals);
        let improves = match &best {
            Some((_, best_value)) => value < *best_value,
            None => true,
        };
        if improves {
            best = Some((point, value));
        }
    }

    let (frequencies, objective) = match best {
        Some(bb) => bb,
        None => {
            let f0 = optimizer.f0().to_vec();
            let value = penalized_objective(optimizer, &f0, cfg.penalty_weight)?;
            (f0, value)
        }
    };
    let vrc = optimizer.vrc(&frequencies)?;
    let (load_constrains, frequency_constrains) = optimizer.get_constrains(&frequencies)?;
    if load_constrains.iter().chain(frequency_constrains.iter()).any(|gg| *gg < 0.) {
        log::warn!("best frequencies found violate some constrains");
    }
    log::info!("best VRC {} at {:?}", vrc, frequencies);
    return Ok(SearchResult {
        frequencies,
        vrc,
        objective,
        load_constrains,
        frequency_constrains,
        num_evaluations,
    });
}

fn project(point: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    return point.iter().zip(lower).zip(upper)
        .map(|((pp, lo), hi)| pp.max(*lo).min(*hi))
        .collect();
}

/// Hooke-Jeeves pattern search inside the box [lower, upper].  Returns the best point, its
/// objective and the number of objective evaluations.
fn pattern_search(optimizer: &Optimizer, start: &[f64], lower: &[f64], upper: &[f64],
                  cfg: &SearchConfig) -> Result<(Vec<f64>, f64, usize)> {
    let mut base = project(start, lower, upper);
    let mut base_value = penalized_objective(optimizer, &base, cfg.penalty_weight)?;
    let mut num_evaluations = 1;
    let ranges: Vec<f64> = lower.iter().zip(upper).map(|(lo, hi)| hi - lo).collect();
    let mut steps: Vec<f64> = ranges.iter().map(|rr| rr * cfg.initial_step).collect();

    for _ in 0..cfg.max_iterations {
        let (point, value, evals) = explore(optimizer, &base, &steps, lower, upper, cfg)?;
        num_evaluations += evals;
        if value < base_value {
            // keep moving in the direction that just paid off
            let jump: Vec<f64> = point.iter().zip(&base).map(|(pp, bb)| 2. * pp - bb).collect();
            let jump = project(&jump, lower, upper);
            base = point;
            base_value = value;
            if jump != base {
                let jump_value = penalized_objective(optimizer, &jump, cfg.penalty_weight)?;
                num_evaluations += 1;
                if jump_value < base_value {
                    base = jump;
                    base_value = jump_value;
                }
            }
        } else {
            for step in steps.iter_mut() {
                *step *= 0.5;
            }
            let converged = steps.iter().zip(&ranges)
                .all(|(step, range)| *step <= cfg.min_step * range);
            if converged {
                break;
            }
        }
    }
    return Ok((base, base_value, num_evaluations));
}

/// Tries one step up and down along every coordinate, evaluating the trial points in parallel.
/// Returns the best one, or the base itself with an infinite value if there are none.
fn explore(optimizer: &Optimizer, base: &[f64], steps: &[f64], lower: &[f64], upper: &[f64],
           cfg: &SearchConfig) -> Result<(Vec<f64>, f64, usize)> {
    let mut trials = vec![];
    for (ii, step) in steps.iter().enumerate() {
        for sign in [1., -1.].iter() {
            let mut trial = base.to_vec();
            trial[ii] += sign * step;
            let trial = project(&trial, lower, upper);
            if trial != base {
                trials.push(trial);
            }
        }
    }
    let values: Vec<f64> = trials.par_iter()
        .map(|trial| penalized_objective(optimizer, trial, cfg.penalty_weight))
        .collect::<Result<Vec<f64>>>()?;

    let mut best = (base.to_vec(), std::f64::INFINITY);
    for (trial, value) in trials.iter().zip(&values) {
        if *value < best.1 {
            best = (trial.clone(), *value);
        }
    }
    return Ok((best.0, best.1, trials.len()));
}

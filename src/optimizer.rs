use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use super::City;
use super::Demand;
use super::Passenger;
use super::assignment::{assign, Assignment};
use super::constrains;
use super::costs::{CostComponent, CostContext, CostTerm, OperatorsCost};
use super::error::{OptimizationError, Result};
use super::extended_graph::ExtendedGraph;
use super::hyperpath::compute_hyperpaths;
use super::pt_system::TransportNetwork;


static DEFAULT_CACHE_SIZE: usize = 2;


/// Fixed mapping between route ids and positions in a frequency vector.
#[derive(Clone, Debug, PartialEq)]
pub struct LinesPosition {
    route_ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl LinesPosition {
    pub fn new(network: &TransportNetwork) -> LinesPosition {
        let route_ids: Vec<String> = network.get_routes().iter().map(|rr| rr.id.clone())
            .collect();
        let positions = route_ids.iter().enumerate()
            .map(|(ii, id)| (id.clone(), ii))
            .collect();
        return LinesPosition {
            route_ids,
            positions,
        };
    }

    pub fn len(&self) -> usize {
        return self.route_ids.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.route_ids.is_empty();
    }

    pub fn get_position(&self, route_id: &str) -> Option<usize> {
        return self.positions.get(route_id).copied();
    }

    pub fn get_route_id(&self, position: usize) -> Option<&str> {
        return self.route_ids.get(position).map(|id| id.as_str());
    }

    pub fn route_ids(&self) -> &[String] {
        return &self.route_ids;
    }

    pub fn to_named(&self, fopt: &[f64]) -> Result<BTreeMap<String, f64>> {
        if fopt.len() != self.len() {
            return Err(OptimizationError::FrequencyCountMismatch {
                expected: self.len(),
                found: fopt.len(),
            });
        }
        return Ok(self.route_ids.iter().cloned().zip(fopt.iter().copied()).collect());
    }

    pub fn to_vector(&self, named: &BTreeMap<String, f64>) -> Result<Vec<f64>> {
        let mut fopt = vec![0.; self.len()];
        for (route_id, freq) in named {
            match self.get_position(route_id) {
                Some(pos) => fopt[pos] = *freq,
                None => return Err(OptimizationError::InvalidRoute {
                    route: route_id.clone(),
                    reason: String::from("no such route in the network"),
                }),
            }
        }
        if named.len() != self.len() {
            return Err(OptimizationError::FrequencyCountMismatch {
                expected: self.len(),
                found: named.len(),
            });
        }
        return Ok(fopt);
    }
}


/// Everything computed from one frequency vector.
#[derive(Debug)]
pub struct Evaluation {
    pub frequencies: Vec<f64>,
    pub assignment: Assignment,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct CostBreakdown {
    pub infrastructure: f64,
    pub operators: f64,
    pub users: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        return self.operators + self.infrastructure + self.users;
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct RouteResult {
    pub route_id: String,
    pub mode: String,
    pub frequency: f64,
    // passengers/hour on the most loaded section
    pub most_loaded_section: f64,
    // passengers per vehicle on the most loaded section
    pub required_capacity: f64,
    // fraction of the offered capacity used on the most loaded section
    pub capacity_usage: f64,
    pub cycle_time_h: f64,
    pub fleet: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct OverallResults {
    pub costs: CostBreakdown,
    pub vrc: f64,
    pub total_demand: f64,
    pub user_cost_per_trip: f64,
    pub num_violations: usize,
}


/// Evaluates candidate frequency vectors of a fixed city, demand and network.
pub struct Optimizer {
    city: City,
    demand: Demand,
    passenger: Passenger,
    network: TransportNetwork,
    lines_position: LinesPosition,
    f0: Vec<f64>,
    cost_terms: Vec<CostTerm>,
    cache_size: usize,
    cache: Mutex<VecDeque<(Vec<u64>, Arc<Evaluation>)>>,
}

impl Optimizer {
    pub fn new(city: City, demand: Demand, passenger: Passenger, network: TransportNetwork)
               -> Result<Optimizer> {
        if network.num_routes() == 0 {
            return Err(OptimizationError::EmptyNetwork);
        }
        for mode in network.get_modes() {
            mode.validate()?;
        }
        passenger.validate()?;
        demand.validate(&city)?;
        let f0: Vec<f64> = network.get_routes().iter().map(|rr| rr.frequency).collect();
        // fail on malformed routes now rather than on the first evaluation
        let graph = ExtendedGraph::build(&city, &network, &passenger, &f0)?;
        log::info!("optimizer over {} routes, extended graph of {} nodes and {} edges",
                   network.num_routes(), graph.node_count(), graph.edge_count());

        return Ok(Optimizer {
            lines_position: LinesPosition::new(&network),
            city,
            demand,
            passenger,
            network,
            f0,
            cost_terms: CostTerm::all().to_vec(),
            cache_size: DEFAULT_CACHE_SIZE,
            cache: Mutex::new(VecDeque::new()),
        });
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Optimizer {
        self.cache_size = cache_size;
        return self;
    }

    pub fn f0(&self) -> &[f64] {
        return &self.f0;
    }

    pub fn lines_position(&self) -> &LinesPosition {
        return &self.lines_position;
    }

    pub fn get_city(&self) -> &City {
        return &self.city;
    }

    pub fn get_demand(&self) -> &Demand {
        return &self.demand;
    }

    pub fn get_network(&self) -> &TransportNetwork {
        return &self.network;
    }

    /// Lower and upper frequency bounds of each route, from its mode.
    pub fn frequency_bounds(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let mut lower = vec![];
        let mut upper = vec![];
        for route in self.network.get_routes() {
            let mode = self.network.mode_of(route)?;
            lower.push(mode.fmin);
            upper.push(mode.fmax);
        }
        return Ok((lower, upper));
    }

    /// Builds the extended graph, hyperpaths and assignment for `fopt`, reusing a recent
    /// result for the exact same vector when there is one.
    pub fn evaluate(&self, fopt: &[f64]) -> Result<Arc<Evaluation>> {
        let key: Vec<u64> = fopt.iter().map(|ff| ff.to_bits()).collect();
        if self.cache_size > 0 {
            let cache = self.lock_cache();
            if let Some((_, evaluation)) = cache.iter().find(|(kk, _)| *kk == key) {
                return Ok(evaluation.clone());
            }
        }

        log::debug!("build extended graph");
        let graph = ExtendedGraph::build(&self.city, &self.network, &self.passenger, fopt)?;
        log::debug!("compute hyperpaths");
        let hyperpaths = compute_hyperpaths(&graph, &self.passenger, &self.demand)?;
        log::debug!("assign demand");
        let assignment = assign(&graph, &self.network, &hyperpaths, &self.demand)?;
        let evaluation = Arc::new(Evaluation {
            frequencies: fopt.to_vec(),
            assignment,
        });

        if self.cache_size > 0 {
            let mut cache = self.lock_cache();
            if !cache.iter().any(|(kk, _)| *kk == key) {
                cache.push_back((key, evaluation.clone()));
                while cache.len() > self.cache_size {
                    cache.pop_front();
                }
            }
        }
        return Ok(evaluation);
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<VecDeque<(Vec<u64>, Arc<Evaluation>)>> {
        // entries are only ever pushed whole, so a poisoned cache is still consistent
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn cost_breakdown(&self, fopt: &[f64]) -> Result<CostBreakdown> {
        let evaluation = self.evaluate(fopt)?;
        let ctx = CostContext {
            city: &self.city,
            network: &self.network,
            passenger: &self.passenger,
            frequencies: fopt,
            assignment: &evaluation.assignment,
        };
        let mut breakdown = CostBreakdown {
            infrastructure: 0.,
            operators: 0.,
            users: 0.,
        };
        log::debug!("compute costs");
        for term in &self.cost_terms {
            let value = term.evaluate(&ctx)?;
            match term {
                CostTerm::Infrastructure(_) => breakdown.infrastructure += value,
                CostTerm::Operators(_) => breakdown.operators += value,
                CostTerm::Users(_) => breakdown.users += value,
            }
        }
        return Ok(breakdown);
    }

    /// Value of resources consumed: operator, infrastructure and user costs per hour.
    #[allow(non_snake_case)]
    pub fn VRC(&self, fopt: &[f64]) -> Result<f64> {
        return self.vrc(fopt);
    }

    pub fn vrc(&self, fopt: &[f64]) -> Result<f64> {
        return Ok(self.cost_breakdown(fopt)?.total());
    }

    /// Most-loaded-section constrains and frequency-bound constrains of `fopt`.
    pub fn get_constrains(&self, fopt: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        let evaluation = self.evaluate(fopt)?;
        let load = constrains::most_loaded_section_constrains(&self.network, fopt,
                                                              &evaluation.assignment)?;
        let bounds = constrains::fmax_constrains(&self.network, fopt)?;
        return Ok((load, bounds));
    }

    /// VRC of several candidates at once.  Candidates are independent, so they're evaluated in
    /// parallel.
    pub fn evaluate_batch(&self, candidates: &[Vec<f64>]) -> Vec<Result<f64>> {
        return candidates.par_iter().map(|fopt| self.vrc(fopt)).collect();
    }

    pub fn network_results(&self, fopt: &[f64]) -> Result<Vec<RouteResult>> {
        let evaluation = self.evaluate(fopt)?;
        let mut results = vec![];
        for ((route, freq), flows) in self.network.get_routes().iter().zip(fopt)
                                          .zip(&evaluation.assignment.routes) {
            let mode = self.network.mode_of(route)?;
            let most_loaded_section = flows.most_loaded_section();
            let cycle_time_h = OperatorsCost::cycle_time_h(&self.city, route, mode, flows,
                                                           *freq)?;
            results.push(RouteResult {
                route_id: route.id.clone(),
                mode: mode.name.clone(),
                frequency: *freq,
                most_loaded_section,
                required_capacity: most_loaded_section / freq,
                capacity_usage: most_loaded_section / (mode.capacity * freq),
                cycle_time_h,
                fleet: OperatorsCost::fleet_size(mode, *freq, most_loaded_section, cycle_time_h),
            });
        }
        return Ok(results);
    }

    pub fn overall_results(&self, fopt: &[f64]) -> Result<OverallResults> {
        let costs = self.cost_breakdown(fopt)?;
        let (load, bounds) = self.get_constrains(fopt)?;
        let total_demand = self.evaluate(fopt)?.assignment.assigned_trips;
        let user_cost_per_trip = if total_demand > 0. {costs.users / total_demand} else {0.};
        return Ok(OverallResults {
            vrc: costs.total(),
            costs,
            total_demand,
            user_cost_per_trip,
            num_violations: constrains::count_violations(&load) +
                constrains::count_violations(&bounds),
        });
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use super::super::pt_system::{Mode, Route};
    use super::super::test_utils;

    fn two_node_optimizer(demand_ab: f64) -> Optimizer {
        let (city, demand, passenger, network) = test_utils::two_node_env(demand_ab);
        return Optimizer::new(city, demand, passenger, network).unwrap();
    }

    fn corridor_optimizer() -> Optimizer {
        let (city, demand, passenger, network) = test_utils::corridor_env();
        return Optimizer::new(city, demand, passenger, network).unwrap();
    }

    #[test]
    fn test_two_node_scenario() {
        let optimizer = two_node_optimizer(100.);
        assert_eq!(optimizer.f0(), &[5.]);
        let (load, bounds) = optimizer.get_constrains(&[5.]).unwrap();
        assert_eq!(load, vec![150.]);
        assert_eq!(bounds, vec![4., 15.]);
        assert_relative_eq!(optimizer.vrc(&[5.]).unwrap(), 140., epsilon = 1e-9);
        assert_eq!(optimizer.VRC(&[5.]).unwrap(), optimizer.vrc(&[5.]).unwrap());
    }

    #[test]
    fn test_zero_demand() {
        let (city, demand, passenger, _) = test_utils::two_node_env(0.);
        let mut network = TransportNetwork::new();
        network.add_mode(test_utils::costly_bus()).unwrap();
        network.add_route(Route::new("R1", "bus", vec![0, 1], 5.)).unwrap();
        let optimizer = Optimizer::new(city, demand, passenger, network).unwrap();

        let breakdown = optimizer.cost_breakdown(&[5.]).unwrap();
        assert_eq!(breakdown.users, 0.);
        // 10 km at 5 + 0.2 * 5 per km
        assert_relative_eq!(breakdown.infrastructure, 60., epsilon = 1e-9);
        // an empty cycle of 211 / 360 h, run by vehicles costing 60 per hour, plus 50 veh-km/h
        assert_relative_eq!(breakdown.operators, 211. * 5. / 6. + 50., epsilon = 1e-9);
        let vrc = optimizer.vrc(&[5.]).unwrap();
        assert_relative_eq!(vrc, breakdown.operators + breakdown.infrastructure,
                            epsilon = 1e-9);

        let (load, _) = optimizer.get_constrains(&[5.]).unwrap();
        assert_eq!(load, vec![300.]);
    }

    #[test]
    fn test_frequency_at_bound() {
        let optimizer = two_node_optimizer(100.);
        let (_, bounds) = optimizer.get_constrains(&[20.]).unwrap();
        assert_eq!(bounds[1], 0.);
        let overall = optimizer.overall_results(&[20.]).unwrap();
        assert_eq!(overall.num_violations, 0);
    }

    #[test]
    fn test_idempotent() {
        let optimizer = corridor_optimizer();
        let fopt = vec![7.5, 3.2, 2.];
        let first = optimizer.vrc(&fopt).unwrap();
        let first_constrains = optimizer.get_constrains(&fopt).unwrap();
        // push the first vector out of the cache, so the second call recomputes everything
        optimizer.vrc(&[8., 4., 3.]).unwrap();
        optimizer.vrc(&[9., 4., 3.]).unwrap();
        assert_eq!(optimizer.vrc(&fopt).unwrap().to_bits(), first.to_bits());
        assert_eq!(optimizer.get_constrains(&fopt).unwrap(), first_constrains);

        let uncached = corridor_optimizer().with_cache_size(0);
        assert_eq!(uncached.vrc(&fopt).unwrap().to_bits(), first.to_bits());
    }

    #[test]
    fn test_users_cost_decreases_with_frequency() {
        let optimizer = corridor_optimizer();
        let mut last_users = std::f64::INFINITY;
        for scale in 1..6 {
            let ff = scale as f64;
            let breakdown = optimizer.cost_breakdown(&[2. * ff, 2. * ff, 2. * ff]).unwrap();
            assert!(breakdown.users <= last_users + 1e-9);
            last_users = breakdown.users;
        }
    }

    #[test]
    fn test_evaluate_batch() {
        let optimizer = corridor_optimizer();
        let candidates = vec![vec![6., 4., 3.], vec![6., 0., 3.], vec![10., 10., 10.]];
        let values = optimizer.evaluate_batch(&candidates);
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_ref().unwrap(), &optimizer.vrc(&candidates[0]).unwrap());
        match &values[1] {
            Err(OptimizationError::NonPositiveFrequency{route, ..}) => {
                assert_eq!(route, "express")
            }
            other => panic!("expected a frequency error, got {:?}", other),
        }
        assert!(values[2].is_ok());
    }

    #[test]
    fn test_network_results() {
        let optimizer = two_node_optimizer(100.);
        let results = optimizer.network_results(&[5.]).unwrap();
        assert_eq!(results.len(), 1);
        let r1 = &results[0];
        assert_eq!(r1.route_id, "R1");
        assert_eq!(r1.most_loaded_section, 100.);
        assert_relative_eq!(r1.required_capacity, 20.);
        assert_relative_eq!(r1.capacity_usage, 0.4);
        // half an hour of driving, no dwell or layover
        assert_relative_eq!(r1.cycle_time_h, 0.5);
        assert_relative_eq!(r1.fleet, 2.5);

        let overall = optimizer.overall_results(&[5.]).unwrap();
        assert_eq!(overall.total_demand, 100.);
        assert_relative_eq!(overall.user_cost_per_trip, 1.4, epsilon = 1e-12);
        assert_eq!(overall.vrc, overall.costs.total());
    }

    #[test]
    fn test_lines_position() {
        let optimizer = corridor_optimizer();
        let lines = optimizer.lines_position();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.get_position("express"), Some(1));
        assert_eq!(lines.get_route_id(2), Some("shuttle"));
        let named = lines.to_named(&[1., 2., 3.]).unwrap();
        assert_eq!(named["local"], 1.);
        assert_eq!(lines.to_vector(&named).unwrap(), vec![1., 2., 3.]);
        assert!(lines.to_named(&[1.]).is_err());
        let mut bad = named.clone();
        bad.insert(String::from("tram"), 2.);
        assert!(lines.to_vector(&bad).is_err());
    }

    #[test]
    fn test_invalid_construction() {
        let (city, demand, passenger, _) = test_utils::two_node_env(100.);
        let empty = Optimizer::new(city.clone(), demand.clone(), passenger.clone(),
                                   TransportNetwork::new());
        assert!(matches!(empty, Err(OptimizationError::EmptyNetwork)));

        // B -> A isn't a street
        let mut network = TransportNetwork::new();
        network.add_mode(Mode::new("bus", 50., 20., 1., 20.)).unwrap();
        network.add_route(Route::new("R1", "bus", vec![1, 0], 5.)).unwrap();
        let missing = Optimizer::new(city.clone(), demand.clone(), passenger.clone(), network);
        assert!(matches!(missing, Err(OptimizationError::MissingEdge{..})));

        let mut network = TransportNetwork::new();
        network.add_mode(Mode::new("bus", 50., 20., 1., 20.)).unwrap();
        network.add_route(Route::new("R1", "bus", vec![0, 1], 0.)).unwrap();
        let zero = Optimizer::new(city, demand, passenger, network);
        assert!(matches!(zero, Err(OptimizationError::NonPositiveFrequency{..})));
    }

    #[test]
    fn test_zero_frequency_evaluation() {
        let optimizer = two_node_optimizer(100.);
        assert!(matches!(optimizer.vrc(&[0.]),
                         Err(OptimizationError::NonPositiveFrequency{..})));
        assert!(matches!(optimizer.vrc(&[5., 5.]),
                         Err(OptimizationError::FrequencyCountMismatch{..})));
    }
}

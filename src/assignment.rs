use std::collections::BTreeMap;

use ndarray::prelude::*;

use super::Demand;
use super::error::{OptimizationError, Result};
use super::extended_graph::{EdgeKind, ExtendedGraph};
use super::hyperpath::Hyperpaths;
use super::pt_system::{Direction, TransportNetwork};


static FLOW_TOLERANCE: f64 = 1e-6;


/// Passenger movements at each stop position of one route direction, in passengers/hour.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteFlows {
    pub boardings: Array<f64, Ix1>,
    pub alightings: Array<f64, Ix1>,
}

impl RouteFlows {
    fn new(num_stops: usize) -> RouteFlows {
        return RouteFlows {
            boardings: Array::zeros(num_stops),
            alightings: Array::zeros(num_stops),
        };
    }

    /// The load on board when leaving each stop.
    pub fn section_loads(&self) -> Array<f64, Ix1> {
        return float_cumsum(&(&self.boardings - &self.alightings));
    }

    pub fn max_load(&self) -> f64 {
        return self.section_loads().iter().cloned().fold(0., f64::max);
    }

    pub fn num_stops(&self) -> usize {
        return self.boardings.len();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteAssignment {
    pub route_id: String,
    pub outbound: RouteFlows,
    pub inbound: RouteFlows,
}

impl RouteAssignment {
    pub fn flows(&self, direction: Direction) -> &RouteFlows {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    fn flows_mut(&mut self, direction: Direction) -> &mut RouteFlows {
        match direction {
            Direction::Outbound => &mut self.outbound,
            Direction::Inbound => &mut self.inbound,
        }
    }

    /// The highest on-board load over every section of the route, in either direction.
    pub fn most_loaded_section(&self) -> f64 {
        return self.outbound.max_load().max(self.inbound.max_load());
    }

    pub fn total_boardings(&self) -> f64 {
        return self.outbound.boardings.sum() + self.inbound.boardings.sum();
    }
}

/// Result of loading the demand onto the hyperpaths.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    // in the network's route order
    pub routes: Vec<RouteAssignment>,
    // expected generalized cost of each OD pair with demand, in hours of in-vehicle time
    pub od_costs: BTreeMap<(usize, usize), f64>,
    // sum over OD pairs of demand times expected cost
    pub user_hours: f64,
    pub assigned_trips: f64,
}

impl Assignment {
    pub fn most_loaded_sections(&self) -> Vec<f64> {
        return self.routes.iter().map(|ra| ra.most_loaded_section()).collect();
    }
}


/// Pushes the demand toward each destination through its hyperpath.  Flow at a node is split
/// over the node's attractive edges according to their probabilities, visiting nodes so that
/// all the flow into a node has arrived before it is split.
pub fn assign(graph: &ExtendedGraph, network: &TransportNetwork, hyperpaths: &Hyperpaths,
              demand: &Demand) -> Result<Assignment> {
    let mut routes: Vec<RouteAssignment> = network.get_routes().iter().enumerate()
        .map(|(ri, route)| RouteAssignment {
            route_id: route.id.clone(),
            outbound: RouteFlows::new(graph.num_stops(ri, Direction::Outbound)),
            inbound: RouteFlows::new(graph.num_stops(ri, Direction::Inbound)),
        })
        .collect();
    let mut od_costs = BTreeMap::new();
    let mut user_hours = 0.;
    let mut assigned_trips = 0.;

    for dst in demand.destinations() {
        graph.check_city_node(dst)?;
        let hyperpath = match hyperpaths.get(dst) {
            Some(hp) => hp,
            None => return Err(OptimizationError::NonConvergent {
                destination: dst,
                node: graph.destination_node(dst).index(),
            }),
        };

        let mut volumes = vec![0.; graph.node_count()];
        let mut expected = 0.;
        for (org, rate) in demand.toward(dst) {
            graph.check_city_node(org)?;
            let label = hyperpath.origin_label(graph, org);
            od_costs.insert((org, dst), label);
            if org == dst {
                continue;
            }
            if !label.is_finite() {
                return Err(OptimizationError::Unreachable {
                    origin: org,
                    destination: dst,
                    demand: rate,
                });
            }
            volumes[graph.origin_node(org).index()] += rate;
            user_hours += rate * label;
            expected += rate;
        }

        for node in hyperpath.assignment_order() {
            let volume = volumes[node.index()];
            if volume == 0. {
                continue;
            }
            for (edge, next_node, prob) in hyperpath.successors(node) {
                let flow = volume * prob;
                volumes[next_node.index()] += flow;
                let ext_edge = graph.edge(edge);
                if let Some(rs) = ext_edge.route_stop {
                    let flows = routes[rs.route].flows_mut(rs.direction);
                    match ext_edge.kind {
                        EdgeKind::Boarding => flows.boardings[rs.position] += flow,
                        EdgeKind::Alighting | EdgeKind::Egress =>
                            flows.alightings[rs.position] += flow,
                        _ => (),
                    }
                }
            }
        }

        let arrived = volumes[graph.destination_node(dst).index()];
        if (arrived - expected).abs() > FLOW_TOLERANCE * expected.max(1.) {
            return Err(OptimizationError::FlowNotConserved {
                destination: dst,
                expected,
                assigned: arrived,
            });
        }
        assigned_trips += arrived;
    }

    log::debug!("assigned {} trips/h, {} user hours", assigned_trips, user_hours);
    return Ok(Assignment {
        routes,
        od_costs,
        user_hours,
        assigned_trips,
    });
}


fn float_cumsum(array: &Array<f64, Ix1>) -> Array<f64, Ix1> {
    let mut cumsum = Array::zeros(array.dim());
    let mut sum = 0.;
    for (ii, elem) in array.indexed_iter() {
        sum += *elem;
        cumsum[ii] = sum;
    }
    return cumsum;
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use super::super::City;
    use super::super::Passenger;
    use super::super::hyperpath::compute_hyperpaths;
    use super::super::pt_system::{Mode, Route};
    use super::super::test_utils;

    fn run_assignment(city: &City, demand: &Demand, passenger: &Passenger,
                      network: &TransportNetwork, freqs: &[f64]) -> Result<Assignment> {
        let graph = ExtendedGraph::build(city, network, passenger, freqs)?;
        let hyperpaths = compute_hyperpaths(&graph, passenger, demand)?;
        return assign(&graph, network, &hyperpaths, demand);
    }

    fn initial_freqs(network: &TransportNetwork) -> Vec<f64> {
        return network.get_routes().iter().map(|rr| rr.frequency).collect();
    }

    #[test]
    fn test_two_node_scenario() {
        let (city, demand, passenger, network) = test_utils::two_node_env(100.);
        let assignment = run_assignment(&city, &demand, &passenger, &network, &[5.]).unwrap();
        let r1 = &assignment.routes[0];
        assert_eq!(r1.route_id, "R1");
        assert_eq!(r1.outbound.boardings, array![100., 0.]);
        assert_eq!(r1.outbound.alightings, array![0., 100.]);
        assert_eq!(r1.outbound.section_loads(), array![100., 0.]);
        assert_eq!(r1.inbound.num_stops(), 0);
        assert_eq!(r1.most_loaded_section(), 100.);
        assert_eq!(assignment.assigned_trips, 100.);
        // wait 0.2 h and ride 0.5 h
        assert_relative_eq!(assignment.user_hours, 70., epsilon = 1e-9);
        assert_relative_eq!(assignment.od_costs[&(0, 1)], 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_flow_conservation_from_origin() {
        let (city, _, passenger, network) = test_utils::corridor_env();
        let mut demand = Demand::new();
        demand.set(0, 3, 120.).unwrap();
        let assignment = run_assignment(&city, &demand, &passenger, &network,
                                        &initial_freqs(&network)).unwrap();
        // every trip boards at node 0, which is the first outbound stop of both lines
        let boarded_at_origin: f64 = assignment.routes.iter()
            .map(|ra| ra.outbound.boardings[0])
            .sum();
        assert_relative_eq!(boarded_at_origin, 120., epsilon = 1e-9);
        let total_alighted: f64 = assignment.routes.iter()
            .map(|ra| ra.outbound.alightings.sum() + ra.inbound.alightings.sum())
            .sum();
        let total_boarded: f64 = assignment.routes.iter().map(|ra| ra.total_boardings()).sum();
        assert_relative_eq!(total_alighted, total_boarded, epsilon = 1e-9);
        // both lines are attractive at the origin, so both carry some of the demand
        assert!(assignment.routes[0].outbound.boardings[0] > 0.);
        assert!(assignment.routes[1].outbound.boardings[0] > 0.);
    }

    #[test]
    fn test_corridor_loads() {
        let (city, demand, passenger, network) = test_utils::corridor_env();
        let assignment = run_assignment(&city, &demand, &passenger, &network,
                                        &initial_freqs(&network)).unwrap();
        assert_relative_eq!(assignment.assigned_trips, demand.total(), epsilon = 1e-9);
        for ra in &assignment.routes {
            for direction in Direction::all().iter() {
                let loads = ra.flows(*direction).section_loads();
                // nothing is left on board at the end of the line
                if let Some(last) = loads.iter().last() {
                    assert!(last.abs() < 1e-9);
                }
                assert!(loads.iter().all(|ll| *ll > -1e-9));
            }
        }
        let sections = assignment.most_loaded_sections();
        assert_eq!(sections.len(), 3);
        assert!(sections[0] + sections[1] >= 120.);
    }

    #[test]
    fn test_zero_demand() {
        let (city, demand, passenger, network) = test_utils::two_node_env(0.);
        let assignment = run_assignment(&city, &demand, &passenger, &network, &[5.]).unwrap();
        assert_eq!(assignment.user_hours, 0.);
        assert_eq!(assignment.most_loaded_sections(), vec![0.]);
        assert!(assignment.od_costs.is_empty());
    }

    #[test]
    fn test_unreachable_origin() {
        let city = test_utils::line_city(3, 1.);
        let mut network = TransportNetwork::new();
        network.add_mode(Mode::new("bus", 50., 20., 1., 20.)).unwrap();
        network.add_route(Route::new("r", "bus", vec![0, 1], 5.)).unwrap();
        let mut demand = Demand::new();
        demand.set(0, 1, 10.).unwrap();
        demand.set(2, 1, 5.).unwrap();
        let passenger = test_utils::default_passenger();
        match run_assignment(&city, &demand, &passenger, &network, &[5.]) {
            Err(OptimizationError::Unreachable{origin, destination, demand}) => {
                assert_eq!((origin, destination), (2, 1));
                assert_eq!(demand, 5.);
            }
            other => panic!("expected an unreachable error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_origin() {
        let (city, demand, passenger, network) = test_utils::two_node_env(10.);
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[5.]).unwrap();
        let hyperpaths = compute_hyperpaths(&graph, &passenger, &demand).unwrap();
        let mut bad_demand = demand.clone();
        bad_demand.set(5, 1, 3.).unwrap();
        match assign(&graph, &network, &hyperpaths, &bad_demand) {
            Err(OptimizationError::UnknownNode(id)) => assert_eq!(id, "#5"),
            other => panic!("expected an unknown node error, got {:?}", other),
        }

        // a destination past the city's nodes must not alias a stop node
        let mut bad_demand = Demand::new();
        bad_demand.set(0, 2, 3.).unwrap();
        assert!(matches!(run_assignment(&city, &bad_demand, &passenger, &network, &[5.]),
                         Err(OptimizationError::UnknownNode(_))));
    }

    #[test]
    fn test_intra_zonal_demand_is_free() {
        let (city, mut demand, passenger, network) = test_utils::two_node_env(10.);
        demand.set(0, 0, 50.).unwrap();
        let assignment = run_assignment(&city, &demand, &passenger, &network, &[5.]).unwrap();
        assert_eq!(assignment.od_costs[&(0, 0)], 0.);
        assert_eq!(assignment.assigned_trips, 10.);
        assert_eq!(assignment.routes[0].most_loaded_section(), 10.);
    }

    #[test]
    fn test_float_cumsum() {
        assert_eq!(float_cumsum(&array![1., -2., 3.]), array![1., -1., 2.]);
        assert_eq!(float_cumsum(&Array::zeros(0)), Array::<f64, Ix1>::zeros(0));
    }
}

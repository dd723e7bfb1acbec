use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use priority_queue::PriorityQueue;
use rayon::prelude::*;

use super::Demand;
use super::Passenger;
use super::error::{OptimizationError, Result};
use super::extended_graph::ExtendedGraph;


/// Expected wait at a stop is this factor over the combined frequency of the attractive lines.
///
/// A factor of one corresponds to independent, exponentially distributed headways for every
/// line, which is what the common-lines formula assumes.  Regular headways would give 0.5, but
/// mixing lines with different regularity has no closed form; this should get a domain review
/// before being changed.
pub const HEADWAY_WAIT_FACTOR: f64 = 1.0;

static PROBABILITY_TOLERANCE: f64 = 1e-6;


/// The optimal strategy at one node of the extended graph: the edges a traveller is willing to
/// take from here, and the expected cost to the destination of doing so.
#[derive(Clone, Debug)]
pub struct NodeStrategy {
    // expected cost to the destination, in hours of in-vehicle time
    pub label: f64,
    // sum of the frequencies of the attractive edges; zero at nodes without waiting
    pub combined_frequency: f64,
    candidates: Vec<Candidate>,
    settled_at: Option<usize>,
}

#[derive(Clone, Debug)]
struct Candidate {
    edge: EdgeIndex,
    next_node: NodeIndex,
    frequency: Option<f64>,
}

impl NodeStrategy {
    fn new() -> NodeStrategy {
        return NodeStrategy {
            label: f64::INFINITY,
            combined_frequency: 0.,
            candidates: vec![],
            settled_at: None,
        };
    }

    fn add_frequency_edge(&mut self, edge: EdgeIndex, next_node: NodeIndex, frequency: f64,
                          postwait_cost: f64, wait_cost: f64) {
        let mut weighted_cost = wait_cost;
        if self.label < f64::INFINITY {
            weighted_cost = self.label * self.combined_frequency;
        }
        self.combined_frequency += frequency;
        self.label = (weighted_cost + frequency * postwait_cost) / self.combined_frequency;
        self.candidates.push(Candidate{edge, next_node, frequency: Some(frequency)});
    }

    fn set_direct_edge(&mut self, edge: EdgeIndex, next_node: NodeIndex, cost: f64) {
        self.label = cost;
        self.combined_frequency = 0.;
        self.candidates = vec![Candidate{edge, next_node, frequency: None}];
    }

    /// The attractive edges out of this node, with the share of travellers taking each.
    pub fn successors(&self) -> Vec<(EdgeIndex, NodeIndex, f64)> {
        return self.candidates.iter().map(|cc| {
            let prob = match cc.frequency {
                Some(freq) => freq / self.combined_frequency,
                None => 1.,
            };
            (cc.edge, cc.next_node, prob)
        }).collect();
    }

    pub fn has_successors(&self) -> bool {
        return !self.candidates.is_empty();
    }
}


#[derive(Clone, Debug)]
struct EdgeScore {
    edge_idx: usize,
    score: f64,
}

impl EdgeScore {
    fn new(edge_idx: usize, score: f64) -> EdgeScore {
        return EdgeScore{edge_idx, score};
    }
}

impl Ord for EdgeScore {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse the ordering so the priority queue pops the lowest score first
        if self.score < other.score {
            return Ordering::Greater;
        }
        else if self.score > other.score {
            return Ordering::Less;
        }
        else {
            return other.edge_idx.cmp(&self.edge_idx);
        }
    }
}

impl PartialOrd for EdgeScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl PartialEq for EdgeScore {
    fn eq(&self, other: &Self) -> bool {
        return self.cmp(other) == Ordering::Equal;
    }
}

impl Eq for EdgeScore{}


/// Optimal strategies from every node of the extended graph to one destination.
#[derive(Clone, Debug)]
pub struct Hyperpath {
    destination: usize,
    strategies: Vec<NodeStrategy>,
}

impl Hyperpath {
    pub fn destination(&self) -> usize {
        return self.destination;
    }

    pub fn label(&self, node: NodeIndex) -> f64 {
        return self.strategies[node.index()].label;
    }

    pub fn strategy(&self, node: NodeIndex) -> &NodeStrategy {
        return &self.strategies[node.index()];
    }

    pub fn successors(&self, node: NodeIndex) -> Vec<(EdgeIndex, NodeIndex, f64)> {
        return self.strategies[node.index()].successors();
    }

    /// Expected cost of travelling from a city node to the destination.
    pub fn origin_label(&self, graph: &ExtendedGraph, origin: usize) -> f64 {
        if origin == self.destination {
            return 0.;
        }
        if graph.check_city_node(origin).is_err() {
            return f64::INFINITY;
        }
        return self.label(graph.origin_node(origin));
    }

    /// Nodes that have a strategy, ordered so that every node comes before all the nodes its
    /// attractive edges lead to.  Flow can be pushed through the hyperpath in this order.
    pub fn assignment_order(&self) -> Vec<NodeIndex> {
        let mut settled: Vec<(usize, NodeIndex)> = self.strategies.iter().enumerate()
            .filter_map(|(ii, ss)| ss.settled_at.map(|at| (at, NodeIndex::new(ii))))
            .collect();
        settled.sort_by(|aa, bb| bb.0.cmp(&aa.0));
        return settled.into_iter().map(|(_, node)| node).collect();
    }

    /// The hyperpath of one OD pair: every edge reachable from the origin by following
    /// attractive edges.
    pub fn attractive_edges(&self, graph: &ExtendedGraph, origin: usize) -> BTreeSet<EdgeIndex> {
        let mut edges = BTreeSet::new();
        let mut seen = BTreeSet::new();
        if origin == self.destination || graph.check_city_node(origin).is_err() {
            return edges;
        }
        let mut to_visit = vec![graph.origin_node(origin)];
        while let Some(node) = to_visit.pop() {
            if !seen.insert(node) {
                continue;
            }
            for (edge, next_node, _) in self.successors(node) {
                edges.insert(edge);
                to_visit.push(next_node);
            }
        }
        return edges;
    }
}


/// Computes the optimal strategy of every node toward `destination` (a city node index).
///
/// Edges are scanned in increasing order of the cost of reaching the destination through them.
/// At a node where travellers wait for any of several lines, each new edge is added to the
/// attractive set as long as its cost is below the node's current expected cost, and the
/// expected cost is updated with the common-lines formula.  At any other node only the first,
/// cheapest edge is kept.
pub fn compute_hyperpath(graph: &ExtendedGraph, passenger: &Passenger, destination: usize)
                         -> Result<Hyperpath> {
    graph.check_city_node(destination)?;
    let routing_graph = graph.graph();
    let dest_node = graph.destination_node(destination);
    let wait_cost = HEADWAY_WAIT_FACTOR * passenger.wait_weight();

    let mut strategies = vec![NodeStrategy::new(); routing_graph.node_count()];
    strategies[dest_node.index()].label = 0.;
    strategies[dest_node.index()].settled_at = Some(0);
    let mut num_settled = 1;

    let mut cost_pqueue = PriorityQueue::new();
    for edge in routing_graph.edges_directed(dest_node, petgraph::Direction::Incoming) {
        cost_pqueue.push(edge.id(), EdgeScore::new(edge.id().index(), edge.weight().cost));
    }

    let mut num_pops = 0;
    while let Some((edge_idx, edge_score)) = cost_pqueue.pop() {
        let (tail, head) = match routing_graph.edge_endpoints(edge_idx) {
            Some(ends) => ends,
            None => continue,
        };
        // with non-negative costs each edge is scanned at most once
        num_pops += 1;
        if num_pops > routing_graph.edge_count() {
            return Err(OptimizationError::NonConvergent {
                destination,
                node: tail.index(),
            });
        }
        if tail == dest_node {
            continue;
        }

        let postwait_cost = edge_score.score;
        let strategy = &mut strategies[tail.index()];
        if !(postwait_cost < strategy.label) {
            // the edge can't improve this node's expected cost
            continue;
        }
        match routing_graph[edge_idx].frequency {
            Some(freq) => strategy.add_frequency_edge(edge_idx, head, freq, postwait_cost,
                                                      wait_cost),
            None => strategy.set_direct_edge(edge_idx, head, postwait_cost),
        }
        strategy.settled_at = Some(num_settled);
        num_settled += 1;

        // update the priorities of the edges leading into the improved node
        let label = strategy.label;
        for edge in routing_graph.edges_directed(tail, petgraph::Direction::Incoming) {
            let new_score = EdgeScore::new(edge.id().index(), label + edge.weight().cost);
            if let None = cost_pqueue.change_priority(&edge.id(), new_score.clone()) {
                cost_pqueue.push(edge.id(), new_score);
            }
        }
    }

    for (ii, strategy) in strategies.iter().enumerate() {
        if !strategy.has_successors() {
            continue;
        }
        let sum: f64 = strategy.successors().iter().map(|(_, _, prob)| prob).sum();
        if (sum - 1.).abs() > PROBABILITY_TOLERANCE {
            return Err(OptimizationError::ProbabilityNormalization {
                destination,
                node: ii,
                sum,
            });
        }
    }

    return Ok(Hyperpath {
        destination,
        strategies,
    });
}


/// Hyperpaths toward every destination with demand, keyed by destination city node.
#[derive(Clone, Debug, Default)]
pub struct Hyperpaths {
    by_destination: BTreeMap<usize, Hyperpath>,
}

impl Hyperpaths {
    pub fn get(&self, destination: usize) -> Option<&Hyperpath> {
        return self.by_destination.get(&destination);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &Hyperpath)> {
        return self.by_destination.iter();
    }

    pub fn len(&self) -> usize {
        return self.by_destination.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.by_destination.is_empty();
    }
}

pub fn compute_hyperpaths(graph: &ExtendedGraph, passenger: &Passenger, demand: &Demand)
                          -> Result<Hyperpaths> {
    let dests = demand.destinations();
    log::debug!("compute hyperpaths toward {} destinations", dests.len());
    // destinations are independent of each other, so do them in parallel
    let hyperpaths: Result<Vec<Hyperpath>> = dests.par_iter()
        .map(|dst| compute_hyperpath(graph, passenger, *dst))
        .collect();
    let by_destination = hyperpaths?.into_iter().map(|hp| (hp.destination, hp)).collect();
    return Ok(Hyperpaths{by_destination});
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_relative_eq, assert_ulps_eq};
    use super::super::City;
    use super::super::extended_graph::EdgeKind;
    use super::super::pt_system::{Mode, Route, TransportNetwork};
    use super::super::test_utils;

    #[test]
    fn test_hyperpath_minimal() {
        let (city, _, passenger, network) = test_utils::two_node_env(100.);
        let freq = 5.;
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[freq]).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 1).unwrap();

        // wait 1/f, then ride half an hour
        let correct_label = (1. + freq * 0.5) / freq;
        assert_ulps_eq!(hyperpath.origin_label(&graph, 0), correct_label);
        let stop = graph.stop_node(0).unwrap();
        assert_eq!(hyperpath.strategy(stop).combined_frequency, freq);
        let succs = hyperpath.successors(stop);
        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].2, 1.);
        assert_eq!(hyperpath.label(graph.destination_node(1)), 0.);
    }

    fn three_line_env() -> (City, Passenger, TransportNetwork) {
        let mut city = City::new();
        city.add_node("A").unwrap();
        city.add_node("B").unwrap();
        city.add_edge("A", "B", 30.).unwrap();
        let mut network = TransportNetwork::new();
        // 5, 6 and 7 hours to ride from A to B
        network.add_mode(Mode::new("fast", 50., 6., 0.1, 10.)).unwrap();
        network.add_mode(Mode::new("medium", 50., 5., 0.1, 10.)).unwrap();
        network.add_mode(Mode::new("slow", 50., 30. / 7., 0.1, 10.)).unwrap();
        network.add_route(Route::new("101", "fast", vec![0, 1], 0.5)).unwrap();
        network.add_route(Route::new("102", "medium", vec![0, 1], 0.25)).unwrap();
        network.add_route(Route::new("103", "slow", vec![0, 1], 1.)).unwrap();
        return (city, test_utils::default_passenger(), network);
    }

    #[test]
    fn test_hyperpath_common_lines() {
        let (city, passenger, network) = three_line_env();
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[0.5, 0.25, 1.]).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 1).unwrap();

        assert_relative_eq!(hyperpath.origin_label(&graph, 0), 20. / 3., epsilon = 1e-12);
        let stop = graph.stop_node(0).unwrap();
        assert_relative_eq!(hyperpath.strategy(stop).combined_frequency, 0.75);
        let mut probs: Vec<(usize, f64)> = hyperpath.successors(stop).iter()
            .map(|(edge, _, prob)| (graph.edge(*edge).route_stop.unwrap().route, *prob))
            .collect();
        probs.sort_by(|aa, bb| aa.0.cmp(&bb.0));
        // the slow line is never worth waiting for
        assert_eq!(probs.len(), 2);
        assert_eq!(probs[0].0, 0);
        assert_relative_eq!(probs[0].1, 2. / 3., epsilon = 1e-12);
        assert_eq!(probs[1].0, 1);
        assert_relative_eq!(probs[1].1, 1. / 3., epsilon = 1e-12);
    }

    #[test]
    fn test_hyperpath_probabilities_sum_to_one() {
        let (city, passenger, network) = three_line_env();
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[3., 2., 9.]).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 1).unwrap();
        for node in graph.graph().node_indices() {
            let succs = hyperpath.successors(node);
            if succs.is_empty() {
                continue;
            }
            let sum: f64 = succs.iter().map(|(_, _, pp)| pp).sum();
            assert_relative_eq!(sum, 1., epsilon = 1e-9);
        }
    }

    #[test]
    fn test_hyperpath_transfer() {
        let city = test_utils::line_city(3, 10.);
        let mut network = TransportNetwork::new();
        network.add_mode(Mode::new("bus", 50., 20., 1., 20.)).unwrap();
        network.add_route(Route::new("r1", "bus", vec![0, 1], 2.)).unwrap();
        network.add_route(Route::new("r2", "bus", vec![1, 2], 4.)).unwrap();
        let mut passenger = test_utils::default_passenger();
        passenger.transfer_penalty_min = 30.;
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[2., 4.]).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 2).unwrap();

        // wait 1/2, ride 1/2, transfer 1/2, wait 1/4, ride 1/2
        assert_relative_eq!(hyperpath.origin_label(&graph, 0), 2.25, epsilon = 1e-12);
        assert_relative_eq!(hyperpath.origin_label(&graph, 1), 0.75, epsilon = 1e-12);

        let edges = hyperpath.attractive_edges(&graph, 0);
        let kinds: Vec<EdgeKind> = edges.iter().map(|ee| graph.edge(*ee).kind).collect();
        assert_eq!(kinds.iter().filter(|kk| **kk == EdgeKind::Boarding).count(), 2);
        assert_eq!(kinds.iter().filter(|kk| **kk == EdgeKind::Alighting).count(), 1);
        assert_eq!(kinds.iter().filter(|kk| **kk == EdgeKind::Egress).count(), 1);
        assert_eq!(kinds.iter().filter(|kk| **kk == EdgeKind::InVehicle).count(), 2);
    }

    #[test]
    fn test_hyperpath_nopath() {
        let city = test_utils::line_city(3, 10.);
        let (_, _, passenger, _) = test_utils::two_node_env(1.);
        let mut network = TransportNetwork::new();
        network.add_mode(Mode::new("bus", 50., 20., 1., 20.)).unwrap();
        network.add_route(Route::new("r1", "bus", vec![0, 1], 2.)).unwrap();
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[2.]).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 1).unwrap();
        assert!(hyperpath.origin_label(&graph, 0).is_finite());
        assert_eq!(hyperpath.origin_label(&graph, 2), f64::INFINITY);
        assert!(!hyperpath.strategy(graph.origin_node(2)).has_successors());
        assert!(hyperpath.attractive_edges(&graph, 2).is_empty());
    }

    #[test]
    fn test_hyperpath_origin_is_destination() {
        let (city, _, passenger, network) = test_utils::two_node_env(1.);
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[5.]).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 0).unwrap();
        assert_eq!(hyperpath.origin_label(&graph, 0), 0.);
        assert!(hyperpath.attractive_edges(&graph, 0).is_empty());
        // the only route runs away from node 0
        assert_eq!(hyperpath.origin_label(&graph, 1), f64::INFINITY);
    }

    #[test]
    fn test_hyperpath_unknown_destination() {
        let (city, _, passenger, network) = test_utils::two_node_env(1.);
        let graph = ExtendedGraph::build(&city, &network, &passenger, &[5.]).unwrap();
        // index 2 is just past the city's nodes, 50 is far outside the graph
        for dst in &[2, 50] {
            match compute_hyperpath(&graph, &passenger, *dst) {
                Err(OptimizationError::UnknownNode(id)) => assert_eq!(id, format!("#{}", dst)),
                other => panic!("expected an unknown node error, got {:?}", other),
            }
        }
        let mut demand = Demand::new();
        demand.set(0, 2, 10.).unwrap();
        assert!(matches!(compute_hyperpaths(&graph, &passenger, &demand),
                         Err(OptimizationError::UnknownNode(_))));

        let hyperpath = compute_hyperpath(&graph, &passenger, 1).unwrap();
        assert_eq!(hyperpath.origin_label(&graph, 7), f64::INFINITY);
        assert!(hyperpath.attractive_edges(&graph, 7).is_empty());
    }

    #[test]
    fn test_assignment_order_is_topological() {
        let (city, _, passenger, network) = test_utils::corridor_env();
        let freqs: Vec<f64> = network.get_routes().iter().map(|rr| rr.frequency).collect();
        let graph = ExtendedGraph::build(&city, &network, &passenger, &freqs).unwrap();
        let hyperpath = compute_hyperpath(&graph, &passenger, 3).unwrap();
        let order = hyperpath.assignment_order();
        let position: BTreeMap<NodeIndex, usize> = order.iter().enumerate()
            .map(|(ii, nn)| (*nn, ii)).collect();
        assert_eq!(*order.last().unwrap(), graph.destination_node(3));
        for node in &order {
            for (_, next, _) in hyperpath.successors(*node) {
                assert!(position[node] < position[&next]);
            }
        }
    }

    #[test]
    fn test_more_frequency_never_costs_more() {
        let (city, passenger, network) = three_line_env();
        let mut prev_label = f64::INFINITY;
        for scale in &[0.5, 1., 2., 4.] {
            let freqs = [0.5 * scale, 0.25 * scale, 1. * scale];
            let graph = ExtendedGraph::build(&city, &network, &passenger, &freqs).unwrap();
            let label = compute_hyperpath(&graph, &passenger, 1).unwrap()
                .origin_label(&graph, 0);
            assert!(label <= prev_label);
            prev_label = label;
        }
    }
}

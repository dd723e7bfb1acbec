// The routing graph that hyperpaths are computed on.  Every stop position of every route
// direction gets its own node, so that riding, boarding, alighting and walking are all
// explicit edges.
use std::collections::BTreeSet;
use std::collections::HashMap;

use itertools::Itertools;
use petgraph::graph::DiGraph;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;

use super::City;
use super::Passenger;
use super::error::{OptimizationError, Result};
use super::pt_system::{Direction, TransportNetwork};


#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ExtendedNode {
    // trips start at origin nodes and end at destination nodes; keeping them apart means a
    // traveller can't leave a vehicle and walk back to the stop to dodge the transfer penalty
    Origin { node: usize },
    Destination { node: usize },
    Stop { node: usize },
    Route { node: usize, route: usize, direction: Direction, position: usize },
}

impl ExtendedNode {
    pub fn physical_node(&self) -> usize {
        match self {
            ExtendedNode::Origin{node} => *node,
            ExtendedNode::Destination{node} => *node,
            ExtendedNode::Stop{node} => *node,
            ExtendedNode::Route{node, ..} => *node,
        }
    }

    pub fn route(&self) -> Option<usize> {
        match self {
            ExtendedNode::Route{route, ..} => Some(*route),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum EdgeKind {
    Access,
    Boarding,
    InVehicle,
    Alighting,
    Egress,
}

/// The route stop an edge belongs to.  For boarding and in-vehicle edges it's the stop at the
/// tail, for alighting and egress edges the stop at which passengers get off.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct RouteStop {
    pub route: usize,
    pub direction: Direction,
    pub position: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ExtendedEdge {
    pub kind: EdgeKind,
    // generalized cost in hours of in-vehicle time, not counting any wait
    pub cost: f64,
    // only boarding edges have a frequency; the others are taken as soon as they're reached
    pub frequency: Option<f64>,
    pub route_stop: Option<RouteStop>,
}

impl ExtendedEdge {
    fn new(kind: EdgeKind, cost: f64) -> ExtendedEdge {
        return ExtendedEdge{kind, cost, frequency: None, route_stop: None};
    }

    fn on_route(mut self, route: usize, direction: Direction, position: usize) -> ExtendedEdge {
        self.route_stop = Some(RouteStop{route, direction, position});
        return self;
    }
}

pub struct ExtendedGraph {
    graph: DiGraph<ExtendedNode, ExtendedEdge>,
    num_city_nodes: usize,
    stop_nodes: HashMap<usize, NodeIndex>,
    // number of stop positions of each route, outbound then inbound
    route_positions: Vec<[usize; 2]>,
}

fn dir_idx(direction: Direction) -> usize {
    match direction {
        Direction::Outbound => 0,
        Direction::Inbound => 1,
    }
}

impl ExtendedGraph {
    /// Builds the graph for one frequency vector, given in the network's route order.
    pub fn build(city: &City, network: &TransportNetwork, passenger: &Passenger,
                 frequencies: &[f64]) -> Result<ExtendedGraph> {
        let routes = network.get_routes();
        if frequencies.len() != routes.len() {
            return Err(OptimizationError::FrequencyCountMismatch {
                expected: routes.len(),
                found: frequencies.len(),
            });
        }
        // reject bad frequencies before they reach any waiting time formula
        for (route, freq) in routes.iter().zip(frequencies) {
            if !freq.is_finite() || *freq <= 0. {
                return Err(OptimizationError::NonPositiveFrequency {
                    route: route.id.clone(),
                    frequency: *freq,
                });
            }
        }

        // work out each route's stop-to-stop legs and their riding times
        let mut route_legs = vec![];
        let mut served_nodes = BTreeSet::new();
        for route in routes {
            let mode = network.mode_of(route)?;
            if route.nodes(Direction::Outbound).is_empty() {
                return Err(OptimizationError::InvalidRoute {
                    route: route.id.clone(),
                    reason: String::from("outbound direction is empty"),
                });
            }
            let mut dir_legs = vec![];
            for direction in Direction::all().iter() {
                let mut legs = vec![];
                for leg in route.legs(*direction)? {
                    for node in &leg {
                        if *node >= city.num_nodes() {
                            return Err(OptimizationError::UnknownNode(format!("#{}", node)));
                        }
                    }
                    let length = city.path_length(&route.id, &leg)?;
                    let time = length / mode.speed_kmh + mode.stop_time_s / 3600.;
                    served_nodes.insert(leg[0]);
                    served_nodes.insert(leg[leg.len() - 1]);
                    legs.push((leg[0], leg[leg.len() - 1], time));
                }
                dir_legs.push(legs);
            }
            route_legs.push(dir_legs);
        }

        let mut graph = DiGraph::new();
        // origins come first, then destinations, so their indices follow from the city index
        for node in 0..city.num_nodes() {
            graph.add_node(ExtendedNode::Origin{node});
        }
        for node in 0..city.num_nodes() {
            graph.add_node(ExtendedNode::Destination{node});
        }
        let num_city_nodes = city.num_nodes();
        let access_cost = passenger.access_cost_h();
        let mut stop_nodes = HashMap::new();
        for node in served_nodes {
            let stop = graph.add_node(ExtendedNode::Stop{node});
            stop_nodes.insert(node, stop);
            graph.add_edge(NodeIndex::new(node), stop,
                           ExtendedEdge::new(EdgeKind::Access, access_cost));
        }

        let transfer_cost = passenger.transfer_penalty_h();
        let mut route_positions = vec![];
        for (ri, dir_legs) in route_legs.iter().enumerate() {
            let mut positions = [0; 2];
            for (direction, legs) in Direction::all().iter().zip(dir_legs) {
                if legs.is_empty() {
                    continue;
                }
                let mut stops: Vec<usize> = legs.iter().map(|(from, _, _)| *from).collect();
                stops.push(legs[legs.len() - 1].1);
                positions[dir_idx(*direction)] = stops.len();

                let route_nodes: Vec<NodeIndex> = stops.iter().enumerate()
                    .map(|(pos, node)| graph.add_node(ExtendedNode::Route {
                        node: *node,
                        route: ri,
                        direction: *direction,
                        position: pos,
                    }))
                    .collect();

                for (pos, (node, ext_node)) in stops.iter().zip(&route_nodes).enumerate() {
                    let stop_node = stop_nodes[node];
                    if pos + 1 < stops.len() {
                        let mut boarding = ExtendedEdge::new(EdgeKind::Boarding, 0.)
                            .on_route(ri, *direction, pos);
                        boarding.frequency = Some(frequencies[ri]);
                        graph.add_edge(stop_node, *ext_node, boarding);
                    }
                    if pos > 0 {
                        graph.add_edge(*ext_node, stop_node,
                                       ExtendedEdge::new(EdgeKind::Alighting, transfer_cost)
                                       .on_route(ri, *direction, pos));
                        graph.add_edge(*ext_node, NodeIndex::new(num_city_nodes + *node),
                                       ExtendedEdge::new(EdgeKind::Egress, access_cost)
                                       .on_route(ri, *direction, pos));
                    }
                }
                for (pos, ((tail, head), leg)) in route_nodes.iter().tuple_windows()
                    .zip(legs).enumerate() {
                    graph.add_edge(*tail, *head, ExtendedEdge::new(EdgeKind::InVehicle, leg.2)
                                   .on_route(ri, *direction, pos));
                }
            }
            route_positions.push(positions);
        }

        for edge in graph.edge_indices() {
            let cost = graph[edge].cost;
            if !cost.is_finite() || cost < 0. {
                return Err(OptimizationError::NegativeCost{edge: edge.index(), cost});
            }
        }

        log::debug!("built extended graph with {} nodes and {} edges", graph.node_count(),
                    graph.edge_count());
        return Ok(ExtendedGraph {
            graph,
            num_city_nodes,
            stop_nodes,
            route_positions,
        });
    }

    pub fn graph(&self) -> &DiGraph<ExtendedNode, ExtendedEdge> {
        return &self.graph;
    }

    pub fn node_count(&self) -> usize {
        return self.graph.node_count();
    }

    pub fn edge_count(&self) -> usize {
        return self.graph.edge_count();
    }

    pub fn num_city_nodes(&self) -> usize {
        return self.num_city_nodes;
    }

    /// Errors unless `node` is the index of a node of the city the graph was built on.
    pub fn check_city_node(&self, node: usize) -> Result<()> {
        if node >= self.num_city_nodes {
            return Err(OptimizationError::UnknownNode(format!("#{}", node)));
        }
        return Ok(());
    }

    /// Where trips starting at a city node enter the graph.
    pub fn origin_node(&self, node: usize) -> NodeIndex {
        return NodeIndex::new(node);
    }

    /// Where trips ending at a city node leave the graph.
    pub fn destination_node(&self, node: usize) -> NodeIndex {
        return NodeIndex::new(self.num_city_nodes + node);
    }

    pub fn stop_node(&self, node: usize) -> Option<NodeIndex> {
        return self.stop_nodes.get(&node).copied();
    }

    pub fn node(&self, idx: NodeIndex) -> &ExtendedNode {
        return &self.graph[idx];
    }

    pub fn edge(&self, idx: EdgeIndex) -> &ExtendedEdge {
        return &self.graph[idx];
    }

    /// Maps an extended node back to its physical node and route, if any.
    pub fn physical_node(&self, idx: NodeIndex) -> (usize, Option<usize>) {
        let node = &self.graph[idx];
        return (node.physical_node(), node.route());
    }

    /// How many stops a route direction has (zero if it doesn't run in that direction).
    pub fn num_stops(&self, route: usize, direction: Direction) -> usize {
        return self.route_positions[route][dir_idx(direction)];
    }

    pub fn num_routes(&self) -> usize {
        return self.route_positions.len();
    }
}

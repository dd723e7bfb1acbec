// The physical network of streets and tracks that routes run over.  It's a thin wrapper around
// a petgraph graph that keeps the mapping between node ids and node indices.
use std::collections::HashMap;
use std::error::Error;

use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use yaml_rust::Yaml;

use super::config_utils;
use super::error::{OptimizationError, Result};


#[derive(PartialEq, Debug, Clone)]
pub struct CityNode {
    pub id: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct CityEdge {
    pub length_km: f64,
}

#[derive(Debug, Clone)]
pub struct City {
    graph: DiGraph<CityNode, CityEdge>,
    node_idxs_by_id: HashMap<String, usize>,
}

impl City {
    pub fn new() -> City {
        return City {
            graph: DiGraph::new(),
            node_idxs_by_id: HashMap::new(),
        };
    }

    pub fn add_node(&mut self, id: &str) -> Result<usize> {
        if self.node_idxs_by_id.contains_key(id) {
            return Err(OptimizationError::DuplicateNode(String::from(id)));
        }
        let idx = self.graph.add_node(CityNode{id: String::from(id)}).index();
        self.node_idxs_by_id.insert(String::from(id), idx);
        return Ok(idx);
    }

    pub fn add_edge(&mut self, from: &str, to: &str, length_km: f64) -> Result<()> {
        let invalid = |reason: &str| OptimizationError::InvalidEdge {
            from: String::from(from),
            to: String::from(to),
            reason: String::from(reason),
        };
        let from_idx = self.require_node(from)?;
        let to_idx = self.require_node(to)?;
        if from_idx == to_idx {
            return Err(invalid("self-connections are not allowed"));
        }
        if !length_km.is_finite() || length_km <= 0. {
            return Err(invalid("length must be positive and finite"));
        }
        if self.edge_length(from_idx, to_idx).is_some() {
            return Err(invalid("edge is defined more than once"));
        }
        self.graph.add_edge(NodeIndex::new(from_idx), NodeIndex::new(to_idx),
                            CityEdge{length_km});
        return Ok(());
    }

    pub fn add_bidirectional_edge(&mut self, node_a: &str, node_b: &str, length_km: f64)
                                  -> Result<()> {
        self.add_edge(node_a, node_b, length_km)?;
        return self.add_edge(node_b, node_a, length_km);
    }

    fn require_node(&self, id: &str) -> Result<usize> {
        match self.get_node_idx_by_id(id) {
            Some(idx) => Ok(idx),
            None => Err(OptimizationError::UnknownNode(String::from(id))),
        }
    }

    pub fn get_node_idx_by_id(&self, node_id: &str) -> Option<usize> {
        return self.node_idxs_by_id.get(node_id).copied();
    }

    pub fn get_node_id_by_idx(&self, node_idx: usize) -> Option<&str> {
        return self.graph.node_weight(NodeIndex::new(node_idx)).map(|nn| nn.id.as_str());
    }

    pub fn num_nodes(&self) -> usize {
        return self.graph.node_count();
    }

    pub fn num_edges(&self) -> usize {
        return self.graph.edge_count();
    }

    pub fn edge_length(&self, from: usize, to: usize) -> Option<f64> {
        if from >= self.num_nodes() || to >= self.num_nodes() {
            return None;
        }
        let edge = self.graph.find_edge(NodeIndex::new(from), NodeIndex::new(to))?;
        return Some(self.graph[edge].length_km);
    }

    /// Total length of a path given as a sequence of node indices.  Every consecutive pair must
    /// be an edge of the graph.
    pub fn path_length(&self, route_id: &str, nodes: &[usize]) -> Result<f64> {
        let mut total = 0.;
        for pair in nodes.windows(2) {
            match self.edge_length(pair[0], pair[1]) {
                Some(length) => total += length,
                None => return Err(OptimizationError::MissingEdge {
                    route: String::from(route_id),
                    from: self.display_id(pair[0]),
                    to: self.display_id(pair[1]),
                }),
            }
        }
        return Ok(total);
    }

    /// The id of a node, or its index if it has none, for error messages.
    pub fn display_id(&self, node_idx: usize) -> String {
        match self.get_node_id_by_idx(node_idx) {
            Some(id) => String::from(id),
            None => format!("#{}", node_idx),
        }
    }

    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        return self.graph.edge_references()
            .map(|er| (er.source().index(), er.target().index(), er.weight().length_km))
            .collect();
    }

    /// Parses a `graph` block:
    ///   nodes: [A, B, ...]
    ///   edges: [[A, B, 1.5], ...]
    ///   bidirectional: true  (optional, default false)
    pub fn from_yaml(yaml_cfg: &Yaml) -> std::result::Result<City, Box<dyn Error>> {
        let mut city = City::new();
        let nodes = yaml_cfg["nodes"].as_vec().ok_or("graph has no nodes list")?;
        for node in nodes {
            city.add_node(&config_utils::yaml_to_id(node)?)?;
        }

        let bidirectional = yaml_cfg["bidirectional"].as_bool().unwrap_or(false);
        let edges = yaml_cfg["edges"].as_vec().ok_or("graph has no edges list")?;
        for edge in edges {
            let parts = edge.as_vec().ok_or("graph edges must be [from, to, length_km]")?;
            if parts.len() != 3 {
                return Err("graph edges must be [from, to, length_km]".into());
            }
            let from = config_utils::yaml_to_id(&parts[0])?;
            let to = config_utils::yaml_to_id(&parts[1])?;
            let length_km = config_utils::yaml_to_f64(&parts[2])
                .ok_or("edge length is not a number")?;
            if bidirectional {
                city.add_bidirectional_edge(&from, &to, length_km)?;
            } else {
                city.add_edge(&from, &to, length_km)?;
            }
        }
        log::debug!("loaded city with {} nodes and {} edges", city.num_nodes(), city.num_edges());
        return Ok(city);
    }
}

use std::collections::HashMap;
use std::error::Error;

use yaml_rust::Yaml;

use super::City;
use super::config_utils;
use super::error::{OptimizationError, Result};


/// Static parameters shared by every route of a mode (bus, metro...).
#[derive(PartialEq, Debug, Clone)]
pub struct Mode {
    pub name: String,
    // passengers per vehicle
    pub capacity: f64,
    pub speed_kmh: f64,
    // frequency bounds, vehicles per hour
    pub fmin: f64,
    pub fmax: f64,
    // seconds per boarding or alighting passenger
    pub boarding_time_s: f64,
    // boarding and alighting happen at the same time through separate doors
    pub simultaneous_boarding: bool,
    // dwell time at each stop, independent of passengers
    pub stop_time_s: f64,
    // layover at each terminal
    pub terminal_time_min: f64,
    // operator costs: per vehicle-hour, per vehicle-hour and unit of capacity, per vehicle-km
    pub fixed_cost: f64,
    pub capacity_cost: f64,
    pub distance_cost: f64,
    // infrastructure costs: per km-hour, and per km and vehicle/hour of frequency
    pub infra_fixed_cost: f64,
    pub infra_frequency_cost: f64,
}

impl Mode {
    /// A mode with the given capacity, speed and frequency bounds, and no costs or dwell times.
    pub fn new(name: &str, capacity: f64, speed_kmh: f64, fmin: f64, fmax: f64) -> Mode {
        return Mode {
            name: String::from(name),
            capacity,
            speed_kmh,
            fmin,
            fmax,
            boarding_time_s: 0.,
            simultaneous_boarding: false,
            stop_time_s: 0.,
            terminal_time_min: 0.,
            fixed_cost: 0.,
            capacity_cost: 0.,
            distance_cost: 0.,
            infra_fixed_cost: 0.,
            infra_frequency_cost: 0.,
        };
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(OptimizationError::InvalidMode {
            mode: self.name.clone(),
            reason: String::from(reason),
        });
        if !(self.capacity > 0.) || !self.capacity.is_finite() {
            return invalid("capacity must be positive");
        }
        if !(self.speed_kmh > 0.) || !self.speed_kmh.is_finite() {
            return invalid("speed must be positive");
        }
        // a zero fmin would let the expected waiting time blow up
        if !(self.fmin > 0.) {
            return invalid("fmin must be positive");
        }
        if !(self.fmin <= self.fmax) || !self.fmax.is_finite() {
            return invalid("fmin must not exceed fmax");
        }
        let non_negative = [self.boarding_time_s, self.stop_time_s, self.terminal_time_min,
                            self.fixed_cost, self.capacity_cost, self.distance_cost,
                            self.infra_fixed_cost, self.infra_frequency_cost];
        if non_negative.iter().any(|vv| !(*vv >= 0.) || !vv.is_finite()) {
            return invalid("times and costs must be finite and non-negative");
        }
        return Ok(());
    }

    pub fn from_yaml(yaml_cfg: &Yaml) -> std::result::Result<Mode, Box<dyn Error>> {
        let name = config_utils::get_str(yaml_cfg, "name")?;
        let mut mode = Mode::new(name,
                                 config_utils::get_f64(yaml_cfg, "capacity")?,
                                 config_utils::get_f64(yaml_cfg, "speed_kmh")?,
                                 config_utils::get_f64(yaml_cfg, "fmin")?,
                                 config_utils::get_f64(yaml_cfg, "fmax")?);
        mode.boarding_time_s = config_utils::get_f64_or(yaml_cfg, "boarding_time_s", 0.)?;
        mode.simultaneous_boarding = yaml_cfg["simultaneous_boarding"].as_bool().unwrap_or(false);
        mode.stop_time_s = config_utils::get_f64_or(yaml_cfg, "stop_time_s", 0.)?;
        mode.terminal_time_min = config_utils::get_f64_or(yaml_cfg, "terminal_time_min", 0.)?;
        mode.fixed_cost = config_utils::get_f64_or(yaml_cfg, "fixed_cost", 0.)?;
        mode.capacity_cost = config_utils::get_f64_or(yaml_cfg, "capacity_cost", 0.)?;
        mode.distance_cost = config_utils::get_f64_or(yaml_cfg, "distance_cost", 0.)?;
        mode.infra_fixed_cost = config_utils::get_f64_or(yaml_cfg, "infra_fixed_cost", 0.)?;
        mode.infra_frequency_cost =
            config_utils::get_f64_or(yaml_cfg, "infra_frequency_cost", 0.)?;
        mode.validate()?;
        return Ok(mode);
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn all() -> [Direction; 2] {
        return [Direction::Outbound, Direction::Inbound];
    }
}

/// A transit line.  The outbound direction is mandatory, the inbound one may be empty for
/// one-way or circular lines.  Node sequences are city node indices; stops are the subsequence
/// of nodes where the line can be boarded or left.
#[derive(PartialEq, Debug, Clone)]
pub struct Route {
    pub id: String,
    pub mode: String,
    outbound_nodes: Vec<usize>,
    outbound_stops: Vec<usize>,
    inbound_nodes: Vec<usize>,
    inbound_stops: Vec<usize>,
    // initial frequency, vehicles per hour
    pub frequency: f64,
}

impl Route {
    /// Creates a one-way route that stops at every node of its path.
    pub fn new(id: &str, mode: &str, outbound_nodes: Vec<usize>, frequency: f64) -> Route {
        return Route {
            id: String::from(id),
            mode: String::from(mode),
            outbound_stops: outbound_nodes.clone(),
            outbound_nodes,
            inbound_nodes: vec![],
            inbound_stops: vec![],
            frequency,
        };
    }

    pub fn with_inbound(mut self, inbound_nodes: Vec<usize>) -> Route {
        self.inbound_stops = inbound_nodes.clone();
        self.inbound_nodes = inbound_nodes;
        return self;
    }

    pub fn with_stops(mut self, direction: Direction, stops: Vec<usize>) -> Route {
        match direction {
            Direction::Outbound => self.outbound_stops = stops,
            Direction::Inbound => self.inbound_stops = stops,
        }
        return self;
    }

    pub fn nodes(&self, direction: Direction) -> &[usize] {
        match direction {
            Direction::Outbound => &self.outbound_nodes,
            Direction::Inbound => &self.inbound_nodes,
        }
    }

    pub fn stops(&self, direction: Direction) -> &[usize] {
        match direction {
            Direction::Outbound => &self.outbound_stops,
            Direction::Inbound => &self.inbound_stops,
        }
    }

    /// The directions this route actually runs in.
    pub fn directions(&self) -> Vec<Direction> {
        return Direction::all().iter()
            .filter(|dir| !self.nodes(**dir).is_empty())
            .copied()
            .collect();
    }

    /// Splits a direction's path into the node runs between consecutive stops.  Each run starts
    /// at one stop and ends at the next.
    pub fn legs(&self, direction: Direction) -> Result<Vec<Vec<usize>>> {
        let nodes = self.nodes(direction);
        let stops = self.stops(direction);
        let invalid = |reason: String| Err(OptimizationError::InvalidRoute {
            route: self.id.clone(),
            reason,
        });
        if nodes.is_empty() {
            return Ok(vec![]);
        }
        if stops.len() < 2 {
            return invalid(format!("{:?} direction needs at least two stops", direction));
        }
        if stops[0] != nodes[0] || stops[stops.len() - 1] != nodes[nodes.len() - 1] {
            return invalid(format!("{:?} direction must stop at both ends of its path",
                                   direction));
        }

        let mut legs = vec![];
        let mut leg = vec![nodes[0]];
        let mut next_stop = 1;
        for node in &nodes[1..] {
            leg.push(*node);
            if next_stop < stops.len() && *node == stops[next_stop] {
                legs.push(leg);
                leg = vec![*node];
                next_stop += 1;
            }
        }
        if next_stop != stops.len() || leg.len() > 1 {
            return invalid(format!("{:?} stops are not an ordered subsequence of the path",
                                   direction));
        }
        return Ok(legs);
    }

    /// Parses a route, resolving node ids against the city:
    ///   id, mode, nodes, stops (optional), inbound_nodes (optional),
    ///   inbound_stops (optional), frequency
    pub fn from_yaml(yaml_cfg: &Yaml, city: &City) -> std::result::Result<Route, Box<dyn Error>> {
        let id = config_utils::yaml_to_id(&yaml_cfg["id"])?;
        let mode = config_utils::get_str(yaml_cfg, "mode")?;
        let frequency = config_utils::get_f64(yaml_cfg, "frequency")?;
        let resolve = |key: &str| -> std::result::Result<Vec<usize>, Box<dyn Error>> {
            let mut idxs = vec![];
            for node_id in config_utils::get_id_list(yaml_cfg, key)? {
                match city.get_node_idx_by_id(&node_id) {
                    Some(idx) => idxs.push(idx),
                    None => return Err(OptimizationError::UnknownNode(node_id).into()),
                }
            }
            Ok(idxs)
        };

        let mut route = Route::new(&id, mode, resolve("nodes")?, frequency)
            .with_inbound(resolve("inbound_nodes")?);
        let stops = resolve("stops")?;
        if !stops.is_empty() {
            route = route.with_stops(Direction::Outbound, stops);
        }
        let inbound_stops = resolve("inbound_stops")?;
        if !inbound_stops.is_empty() {
            route = route.with_stops(Direction::Inbound, inbound_stops);
        }
        return Ok(route);
    }
}

/// The set of modes and routes being optimized.  Routes keep their insertion order, which is
/// the order of the positional frequency vector.
#[derive(Debug, Clone, Default)]
pub struct TransportNetwork {
    modes: Vec<Mode>,
    mode_idxs_by_name: HashMap<String, usize>,
    routes: Vec<Route>,
    route_idxs_by_id: HashMap<String, usize>,
}

impl TransportNetwork {
    pub fn new() -> TransportNetwork {
        return TransportNetwork::default();
    }

    pub fn add_mode(&mut self, mode: Mode) -> Result<()> {
        mode.validate()?;
        if self.mode_idxs_by_name.contains_key(&mode.name) {
            return Err(OptimizationError::InvalidMode {
                mode: mode.name,
                reason: String::from("mode is defined more than once"),
            });
        }
        self.mode_idxs_by_name.insert(mode.name.clone(), self.modes.len());
        self.modes.push(mode);
        return Ok(());
    }

    pub fn add_route(&mut self, route: Route) -> Result<()> {
        if self.route_idxs_by_id.contains_key(&route.id) {
            return Err(OptimizationError::DuplicateRoute(route.id));
        }
        if !self.mode_idxs_by_name.contains_key(&route.mode) {
            return Err(OptimizationError::UnknownMode {route: route.id, mode: route.mode});
        }
        self.route_idxs_by_id.insert(route.id.clone(), self.routes.len());
        self.routes.push(route);
        return Ok(());
    }

    pub fn get_routes(&self) -> &Vec<Route> {
        return &self.routes;
    }

    pub fn get_modes(&self) -> &Vec<Mode> {
        return &self.modes;
    }

    pub fn get_route(&self, route_id: &str) -> Option<&Route> {
        return self.route_idxs_by_id.get(route_id).map(|ri| &self.routes[*ri]);
    }

    pub fn get_mode(&self, name: &str) -> Option<&Mode> {
        return self.mode_idxs_by_name.get(name).map(|mi| &self.modes[*mi]);
    }

    pub fn get_mode_idx(&self, name: &str) -> Option<usize> {
        return self.mode_idxs_by_name.get(name).copied();
    }

    pub fn mode_of(&self, route: &Route) -> Result<&Mode> {
        match self.get_mode(&route.mode) {
            Some(mode) => Ok(mode),
            None => Err(OptimizationError::UnknownMode {
                route: route.id.clone(),
                mode: route.mode.clone(),
            }),
        }
    }

    pub fn num_routes(&self) -> usize {
        return self.routes.len();
    }

    /// Parses the `modes` and `routes` lists of a scenario.
    pub fn from_yaml(modes_cfg: &Yaml, routes_cfg: &Yaml, city: &City)
                     -> std::result::Result<TransportNetwork, Box<dyn Error>> {
        let mut network = TransportNetwork::new();
        for mode_cfg in modes_cfg.as_vec().ok_or("modes must be a list")? {
            network.add_mode(Mode::from_yaml(mode_cfg)?)?;
        }
        for route_cfg in routes_cfg.as_vec().ok_or("routes must be a list")? {
            network.add_route(Route::from_yaml(route_cfg, city)?)?;
        }
        log::debug!("loaded {} modes and {} routes", network.modes.len(), network.routes.len());
        return Ok(network);
    }
}

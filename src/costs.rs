use std::collections::BTreeMap;

use super::City;
use super::Passenger;
use super::assignment::{Assignment, RouteAssignment};
use super::error::Result;
use super::pt_system::{Mode, Route, TransportNetwork};


/// Everything a cost term may look at when pricing one frequency vector.
pub struct CostContext<'a> {
    pub city: &'a City,
    pub network: &'a TransportNetwork,
    pub passenger: &'a Passenger,
    // in the network's route order
    pub frequencies: &'a [f64],
    pub assignment: &'a Assignment,
}

/// One additive term of the total system cost, in monetary units per hour.
pub trait CostComponent {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &CostContext) -> Result<f64>;
}


#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct InfrastructureCost;

impl CostComponent for InfrastructureCost {
    fn name(&self) -> &'static str {
        return "infrastructure";
    }

    /// Each street a mode runs on is paid for once per mode, with a part that grows with the
    /// total frequency of the mode's lines on it.
    fn evaluate(&self, ctx: &CostContext) -> Result<f64> {
        // (from, to, mode) -> (length, total frequency)
        let mut edge_freqs: BTreeMap<(usize, usize, usize), (f64, f64)> = BTreeMap::new();
        let mut mode_of_idx = vec![];
        for (route, freq) in ctx.network.get_routes().iter().zip(ctx.frequencies) {
            let mode = ctx.network.mode_of(route)?;
            let mode_idx = match mode_of_idx.iter().position(|mm: &&Mode| mm.name == mode.name) {
                Some(idx) => idx,
                None => {
                    mode_of_idx.push(mode);
                    mode_of_idx.len() - 1
                }
            };
            for direction in route.directions() {
                for pair in route.nodes(direction).windows(2) {
                    let length = ctx.city.path_length(&route.id, pair)?;
                    let entry = edge_freqs.entry((pair[0], pair[1], mode_idx))
                        .or_insert((length, 0.));
                    entry.1 += freq;
                }
            }
        }

        let mut cost = 0.;
        for ((_, _, mode_idx), (length, total_freq)) in edge_freqs {
            let mode = mode_of_idx[mode_idx];
            cost += length * (mode.infra_fixed_cost + mode.infra_frequency_cost * total_freq);
        }
        return Ok(cost);
    }
}


#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct OperatorsCost;

impl OperatorsCost {
    /// Time for one vehicle to run every direction of the route and get back to its start,
    /// in hours.
    pub fn cycle_time_h(city: &City, route: &Route, mode: &Mode, flows: &RouteAssignment,
                        frequency: f64) -> Result<f64> {
        let mut cycle_time = 0.;
        for direction in route.directions() {
            let length = city.path_length(&route.id, route.nodes(direction))?;
            let num_stops = route.stops(direction).len();
            cycle_time += length / mode.speed_kmh;
            cycle_time += num_stops.saturating_sub(1) as f64 * mode.stop_time_s / 3600.;
            cycle_time += mode.terminal_time_min / 60.;

            // each vehicle carries 1/frequency of the passengers getting on and off
            let dir_flows = flows.flows(direction);
            let movements: f64 = dir_flows.boardings.iter().zip(dir_flows.alightings.iter())
                .map(|(vv, zz)| if mode.simultaneous_boarding {vv.max(*zz)} else {vv + zz})
                .sum();
            cycle_time += mode.boarding_time_s * movements / frequency / 3600.;
        }
        return Ok(cycle_time);
    }

    /// Vehicles needed to run the route at the given frequency, or at the frequency needed to
    /// carry its most loaded section, whichever is higher.
    pub fn fleet_size(mode: &Mode, frequency: f64, most_loaded_section: f64, cycle_time_h: f64)
                      -> f64 {
        return frequency.max(most_loaded_section / mode.capacity) * cycle_time_h;
    }

    pub fn route_length(city: &City, route: &Route) -> Result<f64> {
        let mut length = 0.;
        for direction in route.directions() {
            length += city.path_length(&route.id, route.nodes(direction))?;
        }
        return Ok(length);
    }
}

impl CostComponent for OperatorsCost {
    fn name(&self) -> &'static str {
        return "operators";
    }

    fn evaluate(&self, ctx: &CostContext) -> Result<f64> {
        let mut cost = 0.;
        let routes = ctx.network.get_routes();
        for ((route, freq), flows) in routes.iter().zip(ctx.frequencies)
                                            .zip(&ctx.assignment.routes) {
            let mode = ctx.network.mode_of(route)?;
            let cycle_time = OperatorsCost::cycle_time_h(ctx.city, route, mode, flows, *freq)?;
            let fleet = OperatorsCost::fleet_size(mode, *freq, flows.most_loaded_section(),
                                                  cycle_time);
            let length = OperatorsCost::route_length(ctx.city, route)?;
            cost += fleet * (mode.fixed_cost + mode.capacity_cost * mode.capacity);
            cost += mode.distance_cost * freq * length;
        }
        return Ok(cost);
    }
}


#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct UsersCost;

impl CostComponent for UsersCost {
    fn name(&self) -> &'static str {
        return "users";
    }

    fn evaluate(&self, ctx: &CostContext) -> Result<f64> {
        return Ok(ctx.passenger.in_vehicle_value * ctx.assignment.user_hours);
    }
}


/// The terms that make up the value of resources consumed.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum CostTerm {
    Infrastructure(InfrastructureCost),
    Operators(OperatorsCost),
    Users(UsersCost),
}

impl CostTerm {
    pub fn all() -> [CostTerm; 3] {
        return [
            CostTerm::Infrastructure(InfrastructureCost),
            CostTerm::Operators(OperatorsCost),
            CostTerm::Users(UsersCost),
        ];
    }
}

impl CostComponent for CostTerm {
    fn name(&self) -> &'static str {
        match self {
            CostTerm::Infrastructure(term) => term.name(),
            CostTerm::Operators(term) => term.name(),
            CostTerm::Users(term) => term.name(),
        }
    }

    fn evaluate(&self, ctx: &CostContext) -> Result<f64> {
        match self {
            CostTerm::Infrastructure(term) => term.evaluate(ctx),
            CostTerm::Operators(term) => term.evaluate(ctx),
            CostTerm::Users(term) => term.evaluate(ctx),
        }
    }
}

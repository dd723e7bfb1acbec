use super::City;
use super::Demand;
use super::Passenger;
use super::pt_system::{Direction, Mode, Route, TransportNetwork};


/// Checks that two slices of floats are equal up to a relative tolerance.
pub fn assert_all_close(query: &[f64], truth: &[f64], tolerance: f64) {
    assert_eq!(query.len(), truth.len());
    for (ii, (qq, tt)) in query.iter().zip(truth).enumerate() {
        let scale = tt.abs().max(1.);
        assert!((qq - tt).abs() <= tolerance * scale,
                "element {} differs: {} vs {}", ii, qq, tt);
    }
}

/// Walking is free, waiting weighs like riding, and transfers aren't penalized, so labels are
/// plain expected travel times.
pub fn default_passenger() -> Passenger {
    return Passenger::new(4., 0., 2., 2., 2., 0.);
}

/// A city whose nodes "0", "1", ... are joined in a line by two-way edges.
pub fn line_city(num_nodes: usize, edge_length_km: f64) -> City {
    let mut city = City::new();
    for ii in 0..num_nodes {
        city.add_node(&format!("{}", ii)).unwrap();
    }
    for ii in 1..num_nodes {
        city.add_bidirectional_edge(&format!("{}", ii - 1), &format!("{}", ii), edge_length_km)
            .unwrap();
    }
    return city;
}

/// Two nodes 10 km apart, one bus route from the first to the second at 5 veh/h, and the given
/// demand from the first to the second.
pub fn two_node_env(demand_ab: f64) -> (City, Demand, Passenger, TransportNetwork) {
    let mut city = City::new();
    city.add_node("A").unwrap();
    city.add_node("B").unwrap();
    city.add_edge("A", "B", 10.).unwrap();

    let mut demand = Demand::new();
    demand.set(0, 1, demand_ab).unwrap();

    let mut network = TransportNetwork::new();
    network.add_mode(Mode::new("bus", 50., 20., 1., 20.)).unwrap();
    network.add_route(Route::new("R1", "bus", vec![0, 1], 5.)).unwrap();
    return (city, demand, default_passenger(), network);
}

pub fn costly_bus() -> Mode {
    let mut mode = Mode::new("bus", 60., 20., 1., 30.);
    mode.boarding_time_s = 2.5;
    mode.stop_time_s = 10.;
    mode.terminal_time_min = 5.;
    mode.fixed_cost = 30.;
    mode.capacity_cost = 0.5;
    mode.distance_cost = 1.;
    mode.infra_fixed_cost = 5.;
    mode.infra_frequency_cost = 0.2;
    return mode;
}

/// A four-node corridor 0-1-2-3 with 2 km between nodes, served by an all-stops line and an
/// express line in both directions, plus a one-way shuttle between the middle nodes.
pub fn corridor_env() -> (City, Demand, Passenger, TransportNetwork) {
    let city = line_city(4, 2.);

    let mut demand = Demand::new();
    demand.set(0, 3, 120.).unwrap();
    demand.set(1, 3, 40.).unwrap();
    demand.set(0, 2, 30.).unwrap();
    demand.set(3, 0, 80.).unwrap();
    demand.set(2, 1, 10.).unwrap();

    let mut network = TransportNetwork::new();
    network.add_mode(costly_bus()).unwrap();
    network.add_route(Route::new("local", "bus", vec![0, 1, 2, 3], 6.)
                      .with_inbound(vec![3, 2, 1, 0])).unwrap();
    network.add_route(Route::new("express", "bus", vec![0, 1, 2, 3], 4.)
                      .with_stops(Direction::Outbound, vec![0, 3])
                      .with_inbound(vec![3, 2, 1, 0])
                      .with_stops(Direction::Inbound, vec![3, 0])).unwrap();
    network.add_route(Route::new("shuttle", "bus", vec![1, 2], 3.)).unwrap();

    let passenger = Passenger::new(4., 0.2, 2., 4., 4., 10.);
    return (city, demand, passenger, network);
}

// Constraint values of a frequency vector.  A value g is satisfied when g >= 0, so negative
// entries measure by how much a constraint is violated.
use super::assignment::Assignment;
use super::error::{OptimizationError, Result};
use super::pt_system::TransportNetwork;


/// Spare capacity on each route's most loaded section, in passengers/hour, in route order.
pub fn most_loaded_section_constrains(network: &TransportNetwork, frequencies: &[f64],
                                      assignment: &Assignment) -> Result<Vec<f64>> {
    check_len(network, frequencies)?;
    let mut constrains = vec![];
    for ((route, freq), flows) in network.get_routes().iter().zip(frequencies)
                                         .zip(&assignment.routes) {
        let mode = network.mode_of(route)?;
        constrains.push(mode.capacity * freq - flows.most_loaded_section());
    }
    return Ok(constrains);
}

/// Distance of each frequency to its mode's bounds: for every route, `f - fmin` followed by
/// `fmax - f`.
pub fn fmax_constrains(network: &TransportNetwork, frequencies: &[f64]) -> Result<Vec<f64>> {
    check_len(network, frequencies)?;
    let mut constrains = Vec::with_capacity(2 * frequencies.len());
    for (route, freq) in network.get_routes().iter().zip(frequencies) {
        let mode = network.mode_of(route)?;
        constrains.push(freq - mode.fmin);
        constrains.push(mode.fmax - freq);
    }
    return Ok(constrains);
}

pub fn count_violations(constrains: &[f64]) -> usize {
    return constrains.iter().filter(|gg| **gg < 0.).count();
}

fn check_len(network: &TransportNetwork, frequencies: &[f64]) -> Result<()> {
    if frequencies.len() != network.num_routes() {
        return Err(OptimizationError::FrequencyCountMismatch {
            expected: network.num_routes(),
            found: frequencies.len(),
        });
    }
    return Ok(());
}

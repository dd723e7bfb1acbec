use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::error::Error;
use std::path::Path;

use yaml_rust::Yaml;

use super::City;
use super::config_utils;
use super::error::{OptimizationError, Result};


/// Origin-destination trip rates (trips/hour) between city nodes, keyed by node index.
///
/// A BTreeMap is used rather than a HashMap so that every evaluation visits the pairs in the
/// same order and produces bit-identical sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Demand {
    trips: BTreeMap<(usize, usize), f64>,
}

impl Demand {
    pub fn new() -> Demand {
        return Demand{trips: BTreeMap::new()};
    }

    pub fn set(&mut self, origin: usize, destination: usize, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate < 0. {
            return Err(OptimizationError::InvalidDemand {
                origin,
                destination,
                reason: format!("trip rate {} must be finite and non-negative", rate),
            });
        }
        self.trips.insert((origin, destination), rate);
        return Ok(());
    }

    pub fn add(&mut self, origin: usize, destination: usize, rate: f64) -> Result<()> {
        let total = self.get(origin, destination) + rate;
        return self.set(origin, destination, total);
    }

    pub fn get(&self, origin: usize, destination: usize) -> f64 {
        return *self.trips.get(&(origin, destination)).unwrap_or(&0.);
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        return self.trips.iter().map(|(od, rate)| (*od, *rate));
    }

    /// Destinations with some positive demand toward them, in increasing order.
    pub fn destinations(&self) -> Vec<usize> {
        let dests: BTreeSet<usize> = self.iter()
            .filter(|((_, _), rate)| *rate > 0.)
            .map(|((_, dst), _)| dst)
            .collect();
        return dests.into_iter().collect();
    }

    /// Positive demand toward `destination`, as (origin, rate) pairs.
    pub fn toward(&self, destination: usize) -> Vec<(usize, f64)> {
        return self.iter()
            .filter(|((_, dst), rate)| *dst == destination && *rate > 0.)
            .map(|((org, _), rate)| (org, rate))
            .collect();
    }

    pub fn total(&self) -> f64 {
        return self.trips.values().sum();
    }

    pub fn is_empty(&self) -> bool {
        return self.total() == 0.;
    }

    /// Checks that every pair refers to a node of the city.
    pub fn validate(&self, city: &City) -> Result<()> {
        for ((org, dst), _) in self.iter() {
            if org >= city.num_nodes() || dst >= city.num_nodes() {
                return Err(OptimizationError::InvalidDemand {
                    origin: org,
                    destination: dst,
                    reason: String::from("node index is not in the city graph"),
                });
            }
        }
        return Ok(());
    }

    /// Reads a csv with columns origin,destination,trips, where the first two are node ids.
    /// Repeated pairs are summed.
    pub fn from_csv(path: &Path, city: &City) -> std::result::Result<Demand, Box<dyn Error>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut demand = Demand::new();
        for record in reader.records() {
            let record = record?;
            if record.len() < 3 {
                return Err(format!("demand row {:?} needs origin,destination,trips", record)
                    .into());
            }
            let origin = lookup_node(city, record[0].trim())?;
            let destination = lookup_node(city, record[1].trim())?;
            let rate: f64 = record[2].trim().parse()?;
            demand.add(origin, destination, rate)?;
        }
        log::debug!("read {} od pairs from {:?}", demand.trips.len(), path);
        return Ok(demand);
    }

    /// Parses an inline list of [origin, destination, trips] triples.
    pub fn from_yaml(yaml_cfg: &Yaml, city: &City) -> std::result::Result<Demand, Box<dyn Error>> {
        let mut demand = Demand::new();
        let rows = yaml_cfg.as_vec().ok_or("demand must be a list of [origin, destination, trips]")?;
        for row in rows {
            let parts = row.as_vec().ok_or("demand rows must be [origin, destination, trips]")?;
            if parts.len() != 3 {
                return Err("demand rows must be [origin, destination, trips]".into());
            }
            let origin = lookup_node(city, &config_utils::yaml_to_id(&parts[0])?)?;
            let destination = lookup_node(city, &config_utils::yaml_to_id(&parts[1])?)?;
            let rate = config_utils::yaml_to_f64(&parts[2]).ok_or("trip rate is not a number")?;
            demand.add(origin, destination, rate)?;
        }
        return Ok(demand);
    }
}

fn lookup_node(city: &City, node_id: &str) -> Result<usize> {
    match city.get_node_idx_by_id(node_id) {
        Some(idx) => Ok(idx),
        None => Err(OptimizationError::UnknownNode(String::from(node_id))),
    }
}

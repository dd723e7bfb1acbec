use std::error::Error;

use yaml_rust::Yaml;

use super::config_utils;
use super::error::{OptimizationError, Result};


/// Behavioural parameters of the travellers.  Monetary values are per hour; every generalized
/// cost in the engine is expressed in hours of equivalent in-vehicle time, using the ratios of
/// these values as weights.
#[derive(PartialEq, Debug, Clone)]
pub struct Passenger {
    pub walk_speed_kmh: f64,
    // mean walking distance between a node and its stop, at each end of a trip
    pub access_distance_km: f64,
    pub in_vehicle_value: f64,
    pub wait_value: f64,
    pub access_value: f64,
    // penalty per transfer, in minutes of in-vehicle time
    pub transfer_penalty_min: f64,
}

impl Passenger {
    pub fn new(walk_speed_kmh: f64, access_distance_km: f64, in_vehicle_value: f64,
               wait_value: f64, access_value: f64, transfer_penalty_min: f64) -> Passenger {
        return Passenger {
            walk_speed_kmh,
            access_distance_km,
            in_vehicle_value,
            wait_value,
            access_value,
            transfer_penalty_min,
        };
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.walk_speed_kmh > 0.) || !self.walk_speed_kmh.is_finite() {
            return Err(OptimizationError::InvalidPassenger(
                String::from("walking speed must be positive")));
        }
        if !(self.in_vehicle_value > 0.) || !self.in_vehicle_value.is_finite() {
            return Err(OptimizationError::InvalidPassenger(
                String::from("value of in-vehicle time must be positive")));
        }
        let others = [self.access_distance_km, self.wait_value, self.access_value,
                      self.transfer_penalty_min];
        if others.iter().any(|vv| !(*vv >= 0.) || !vv.is_finite()) {
            return Err(OptimizationError::InvalidPassenger(
                String::from("distances, values and penalties must be finite and non-negative")));
        }
        return Ok(());
    }

    pub fn wait_weight(&self) -> f64 {
        return self.wait_value / self.in_vehicle_value;
    }

    pub fn access_weight(&self) -> f64 {
        return self.access_value / self.in_vehicle_value;
    }

    pub fn access_time_h(&self) -> f64 {
        return self.access_distance_km / self.walk_speed_kmh;
    }

    /// Perceived cost of walking between a node and its stop.
    pub fn access_cost_h(&self) -> f64 {
        return self.access_time_h() * self.access_weight();
    }

    pub fn transfer_penalty_h(&self) -> f64 {
        return self.transfer_penalty_min / 60.;
    }

    pub fn from_yaml(yaml_cfg: &Yaml) -> std::result::Result<Passenger, Box<dyn Error>> {
        let in_vehicle_value = config_utils::get_f64(yaml_cfg, "in_vehicle_value")?;
        let passenger = Passenger {
            walk_speed_kmh: config_utils::get_f64_or(yaml_cfg, "walk_speed_kmh", 4.)?,
            access_distance_km: config_utils::get_f64_or(yaml_cfg, "access_distance_km", 0.)?,
            in_vehicle_value,
            wait_value: config_utils::get_f64_or(yaml_cfg, "wait_value", in_vehicle_value)?,
            access_value: config_utils::get_f64_or(yaml_cfg, "access_value", in_vehicle_value)?,
            transfer_penalty_min: config_utils::get_f64_or(yaml_cfg, "transfer_penalty_min", 0.)?,
        };
        passenger.validate()?;
        return Ok(passenger);
    }
}

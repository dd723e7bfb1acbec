use std::error::Error;
use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;
use yaml_rust::YamlLoader;

use super::City;
use super::Demand;
use super::Passenger;
use super::config_utils;
use super::error::Result;
use super::optimizer::Optimizer;
use super::pt_system::TransportNetwork;
use super::search::SearchConfig;


/// A complete optimization problem as read from a config file.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub city: City,
    pub demand: Demand,
    pub passenger: Passenger,
    pub network: TransportNetwork,
    pub cache_size: Option<usize>,
    pub search: SearchConfig,
}

impl Scenario {
    pub fn from_cfg(config_path_str: &str) -> std::result::Result<Scenario, Box<dyn Error>> {
        let mut config_path = PathBuf::new();
        config_path.push(config_path_str);
        let file_contents = std::fs::read_to_string(&config_path)
            .map_err(|ee| format!("failed to read {:?}: {}", config_path, ee))?;
        let base_dir = match config_path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        return Scenario::from_yaml_str(&file_contents, &base_dir);
    }

    /// Parses a scenario.  Relative paths in it are taken relative to `base_dir`.
    pub fn from_yaml_str(contents: &str, base_dir: &Path)
                         -> std::result::Result<Scenario, Box<dyn Error>> {
        let docs = YamlLoader::load_from_str(contents)?;
        let yaml_cfg = docs.get(0).ok_or("scenario config is empty")?;

        let passenger = Passenger::from_yaml(require(yaml_cfg, "passenger")?)?;
        let city = City::from_yaml(require(yaml_cfg, "graph")?)?;
        let demand_cfg = require(yaml_cfg, "demand")?;
        let demand = if !demand_cfg["csv_path"].is_badvalue() {
            let csv_path = config_utils::get_str(demand_cfg, "csv_path")?;
            let csv_path = config_utils::str_to_absolute_path(csv_path, base_dir);
            Demand::from_csv(&csv_path, &city)?
        } else {
            Demand::from_yaml(demand_cfg, &city)?
        };
        let network = TransportNetwork::from_yaml(require(yaml_cfg, "modes")?,
                                                  require(yaml_cfg, "routes")?, &city)?;

        let optimizer_cfg = &yaml_cfg["optimizer"];
        let cache_size = if optimizer_cfg["cache_size"].is_badvalue() {
            None
        } else {
            Some(config_utils::get_usize_or(optimizer_cfg, "cache_size", 0)?)
        };
        let search = SearchConfig::from_yaml(&yaml_cfg["search"])?;

        log::info!("loaded scenario with {} nodes, {} od pairs and {} routes", city.num_nodes(),
                   demand.iter().count(), network.num_routes());
        return Ok(Scenario {
            city,
            demand,
            passenger,
            network,
            cache_size,
            search,
        });
    }

    pub fn into_optimizer(self) -> Result<(Optimizer, SearchConfig)> {
        let mut optimizer = Optimizer::new(self.city, self.demand, self.passenger, self.network)?;
        if let Some(cache_size) = self.cache_size {
            optimizer = optimizer.with_cache_size(cache_size);
        }
        return Ok((optimizer, self.search));
    }
}

fn require<'a>(yaml_cfg: &'a Yaml, key: &str) -> std::result::Result<&'a Yaml, Box<dyn Error>> {
    let value = &yaml_cfg[key];
    if value.is_badvalue() {
        return Err(format!("scenario has no {:?} section", key).into());
    }
    return Ok(value);
}

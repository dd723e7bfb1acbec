use std::error::Error;
use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;


pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// yaml-rust keeps integers and reals apart; we accept either wherever a number is expected.
pub fn yaml_to_f64(value: &Yaml) -> Option<f64> {
    match value {
        Yaml::Real(_) => value.as_f64(),
        Yaml::Integer(ii) => Some(*ii as f64),
        _ => None,
    }
}

/// Node and route ids may be written as bare numbers in the config.
pub fn yaml_to_id(value: &Yaml) -> Result<String, Box<dyn Error>> {
    match value {
        Yaml::String(ss) => Ok(ss.clone()),
        Yaml::Integer(ii) => Ok(format!("{}", ii)),
        _ => Err(format!("{:?} is not a valid id", value).into()),
    }
}

pub fn get_f64(yaml_cfg: &Yaml, key: &str) -> Result<f64, Box<dyn Error>> {
    match yaml_to_f64(&yaml_cfg[key]) {
        Some(val) => Ok(val),
        None => Err(format!("missing or non-numeric value for {:?}", key).into()),
    }
}

pub fn get_f64_or(yaml_cfg: &Yaml, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
    if yaml_cfg[key].is_badvalue() {
        return Ok(default);
    }
    return get_f64(yaml_cfg, key);
}

pub fn get_usize_or(yaml_cfg: &Yaml, key: &str, default: usize) -> Result<usize, Box<dyn Error>> {
    if yaml_cfg[key].is_badvalue() {
        return Ok(default);
    }
    match yaml_cfg[key].as_i64() {
        Some(val) if val >= 0 => Ok(val as usize),
        _ => Err(format!("{:?} must be a non-negative integer", key).into()),
    }
}

pub fn get_str<'a>(yaml_cfg: &'a Yaml, key: &str) -> Result<&'a str, Box<dyn Error>> {
    match yaml_cfg[key].as_str() {
        Some(val) => Ok(val),
        None => Err(format!("missing or non-string value for {:?}", key).into()),
    }
}

/// Reads a list of ids, e.g. the node sequence of a route.  A missing key gives an empty list.
pub fn get_id_list(yaml_cfg: &Yaml, key: &str) -> Result<Vec<String>, Box<dyn Error>> {
    if yaml_cfg[key].is_badvalue() {
        return Ok(vec![]);
    }
    let values = yaml_cfg[key].as_vec().ok_or(format!("{:?} must be a list", key))?;
    let mut ids = vec![];
    for value in values {
        ids.push(yaml_to_id(value)?);
    }
    return Ok(ids);
}

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

/// Parses the boolean flags found in csv tables: 0/1, true/false, yes/no.  Empty means false.
pub fn parse_flag(value: &str) -> Result<bool, Box<dyn Error>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "" => Ok(false),
        other => Err(format!("invalid boolean flag {}", other).into()),
    }
}

pub fn yaml_required_str<'a>(yaml_cfg: &'a Yaml, key: &str) -> Result<&'a str, Box<dyn Error>> {
    match yaml_cfg[key].as_str() {
        Some(value) => Ok(value),
        None => Err(format!("config has no {} entry", key).into()),
    }
}

/// A required path entry, resolved relative to `config_dir`.
pub fn yaml_required_path(yaml_cfg: &Yaml, key: &str, config_dir: &Path)
                          -> Result<PathBuf, Box<dyn Error>> {
    let path = yaml_required_str(yaml_cfg, key)?;
    Ok(str_to_absolute_path(path, config_dir))
}

pub fn yaml_bool_or(yaml_cfg: &Yaml, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
    let value = &yaml_cfg[key];
    if value.is_badvalue() || value.is_null() {
        return Ok(default);
    }
    value.as_bool().ok_or_else(|| format!("config entry {} must be true or false", key).into())
}

/// Reads a number that may be written as an integer or as a real.
pub fn yaml_f64(yaml_cfg: &Yaml, key: &str) -> Result<Option<f64>, Box<dyn Error>> {
    let value = &yaml_cfg[key];
    if value.is_badvalue() || value.is_null() {
        return Ok(None);
    }
    match value.as_f64().or_else(|| value.as_i64().map(|vv| vv as f64)) {
        Some(vv) => Ok(Some(vv)),
        None => Err(format!("config entry {} must be a number", key).into()),
    }
}

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

use thiserror::Error;
use yaml_rust::{Yaml, YamlLoader};

use super::demand_cell::DemandCell;
use super::path::PathGroups;


/// Cost function key holding the exponent of the Abraham method.
pub static ABRAHAM_KEY: &str = "ABRAHAM";
pub const DEFAULT_ABRAHAM_EXPONENT: f64 = -10.;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum SplitError {
    #[error("unknown modal split method {0}, expected one of Proportional, MNL, Abraham")]
    UnknownMethod(String),

    #[error("invalid modal split configuration: {0}")]
    InvalidConfiguration(String),

    #[error("weights are too high, please calibrate the cost functions")]
    CalibrationWarning,
}

/// The tunable parameters of the cost functions, as flat key/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostFunctions {
    values: HashMap<String, f64>,
}

impl CostFunctions {
    pub fn new() -> CostFunctions {
        CostFunctions::default()
    }

    /// Reads a yaml mapping of names to numbers.
    pub fn from_yaml(yaml: &Yaml) -> Result<CostFunctions, Box<dyn Error>> {
        let mut cost_functions = CostFunctions::new();
        if yaml.is_null() || yaml.is_badvalue() {
            return Ok(cost_functions);
        }
        let hash = yaml.as_hash().ok_or("cost functions must be a mapping")?;
        for (key, value) in hash {
            let key = match key {
                Yaml::String(ss) => ss.clone(),
                Yaml::Integer(ii) => ii.to_string(),
                Yaml::Real(rr) => rr.clone(),
                other => return Err(format!("invalid cost function name {:?}", other).into()),
            };
            let value = match value {
                Yaml::Integer(ii) => *ii as f64,
                Yaml::Real(_) => value.as_f64().ok_or("unparsable real")?,
                Yaml::String(ss) => ss.trim().parse()?,
                other => return Err(
                    format!("cost function {} has a non-numeric value {:?}", key, other).into()),
            };
            cost_functions.insert(&key, value);
        }
        Ok(cost_functions)
    }

    pub fn from_file(path: &Path) -> Result<CostFunctions, Box<dyn Error>> {
        let file_contents = std::fs::read_to_string(path)?;
        let yaml_cfgs = YamlLoader::load_from_str(&file_contents)?;
        match yaml_cfgs.first() {
            Some(yaml_cfg) => CostFunctions::from_yaml(yaml_cfg),
            None => Ok(CostFunctions::new()),
        }
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.values.insert(String::from(key), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Looks up `<key>.<group>` first, then `key` alone.
    pub fn get_for_group(&self, key: &str, group: u8) -> Option<f64> {
        self.get(&format!("{}.{}", key, group)).or_else(|| self.get(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}


/// A discrete choice rule that shares the quantity of an OD cell between the available modes,
/// then between the paths of each mode.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitMethod {
    /// Shares are proportional to the inverse of the costs.
    Proportional,
    /// Shares follow a softmax of the negated costs.  `warned` records whether the calibration
    /// warning was already given since the last `initialize`.
    MultinomialLogit { warned: bool },
    /// Shares are proportional to the costs raised to a negative exponent.
    Abraham { exponent: f64 },
}

impl SplitMethod {
    pub fn from_name(name: &str) -> Result<SplitMethod, SplitError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "proportional" => Ok(SplitMethod::Proportional),
            "mnl" | "multinomial logit" | "multinomiallogit" =>
                Ok(SplitMethod::MultinomialLogit {warned: false}),
            "abraham" => Ok(SplitMethod::Abraham {exponent: DEFAULT_ABRAHAM_EXPONENT}),
            _ => Err(SplitError::UnknownMethod(String::from(name))),
        }
    }

    pub fn available_names() -> Vec<&'static str> {
        vec!["Proportional", "MNL", "Abraham"]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SplitMethod::Proportional => "Proportional",
            SplitMethod::MultinomialLogit {..} => "MNL",
            SplitMethod::Abraham {..} => "Abraham",
        }
    }

    pub fn pretty_name(&self) -> &'static str {
        match self {
            SplitMethod::Proportional => "Proportional",
            SplitMethod::MultinomialLogit {..} => "Multinomial logit",
            SplitMethod::Abraham {..} => "Abraham (Logarithmic logit)",
        }
    }

    /// Prepares the method to split the demand of commodity `group`.
    ///
    /// A non-negative Abraham exponent is reported as an `InvalidConfiguration` error, but the
    /// method keeps it and refuses every split until it is initialized with a valid one.
    pub fn initialize(&mut self, group: u8, cost_functions: &CostFunctions)
                      -> Result<(), SplitError> {
        match self {
            SplitMethod::Proportional => Ok(()),
            SplitMethod::MultinomialLogit {warned} => {
                *warned = false;
                Ok(())
            },
            SplitMethod::Abraham {exponent} => {
                *exponent = cost_functions.get_for_group(ABRAHAM_KEY, group)
                    .unwrap_or(DEFAULT_ABRAHAM_EXPONENT);
                if !(*exponent < 0.) {
                    let msg = format!(
                        "the exponent for the Abraham method must be a strict negative value, \
                         got {} for group {}", exponent, group);
                    log::error!("{}", msg);
                    return Err(SplitError::InvalidConfiguration(msg));
                }
                Ok(())
            },
        }
    }

    /// Whether the calibration warning has been given since the last initialization.
    pub fn calibration_warned(&self) -> bool {
        match self {
            SplitMethod::MultinomialLogit {warned} => *warned,
            _ => false,
        }
    }

    /// Computes the market share of every mode and path in `groups`.  Returns false, leaving
    /// the shares untouched, if the method can't split this cell.
    pub fn split(&mut self, cell: &DemandCell, groups: &mut PathGroups) -> bool {
        if groups.is_empty() {
            return false;
        }
        let shares = match self {
            SplitMethod::Proportional => compute_shares(groups, |cost| 1. / cost),
            SplitMethod::Abraham {exponent} => {
                if !(*exponent < 0.) {
                    return false;
                }
                let exponent = *exponent;
                compute_shares(groups, |cost| cost.powf(exponent))
            },
            SplitMethod::MultinomialLogit {warned} => {
                match compute_logit_shares(groups) {
                    Some(shares) => shares,
                    None => {
                        if !*warned {
                            log::warn!("{}", SplitError::CalibrationWarning);
                            *warned = true;
                        }
                        log::debug!("logit denominator vanished for {} -> {}, group {}",
                                    cell.origin_node_id(), cell.destination_node_id(),
                                    cell.group());
                        return false;
                    },
                }
            },
        };
        apply_shares(groups, shares);
        true
    }
}


struct Shares {
    modes: Vec<f64>,
    paths: Vec<Vec<f64>>,
}

/// Shares each level in proportion to `weight(cost)`, using the cheapest cost of each mode at
/// the mode level.
fn compute_shares<F>(groups: &PathGroups, weight: F) -> Shares
    where F: Fn(f64) -> f64
{
    let denominator: f64 = groups.values().map(|gg| weight(gg.cheapest_cost())).sum();
    let modes: Vec<f64> = groups.values()
        .map(|gg| weight(gg.cheapest_cost()) / denominator)
        .collect();

    let paths = groups.values().zip(modes.iter()).map(|(group, mode_share)| {
        let denominator: f64 = group.paths().iter().map(|pp| weight(pp.cost)).sum();
        group.paths().iter()
            .map(|pp| weight(pp.cost) / denominator * mode_share)
            .collect::<Vec<f64>>()
    }).collect();

    Shares {modes, paths}
}

/// Like `compute_shares` with weights `exp(-cost)`, but gives up if a denominator underflows
/// to zero.
fn compute_logit_shares(groups: &PathGroups) -> Option<Shares> {
    let utility = |cost: f64| (-cost).exp();
    let denominator: f64 = groups.values().map(|gg| utility(gg.cheapest_cost())).sum();
    if denominator == 0. {
        return None;
    }
    let modes: Vec<f64> = groups.values()
        .map(|gg| utility(gg.cheapest_cost()) / denominator)
        .collect();

    let mut paths = Vec::with_capacity(groups.len());
    for (group, mode_share) in groups.values().zip(modes.iter()) {
        let denominator: f64 = group.paths().iter().map(|pp| utility(pp.cost)).sum();
        if denominator == 0. {
            return None;
        }
        let path_shares: Vec<f64> = group.paths().iter().map(|pp| {
            let share = utility(pp.cost) / denominator * mode_share;
            if share.is_nan() { 0. } else { share }
        }).collect();
        paths.push(path_shares);
    }
    Some(Shares {modes, paths})
}

fn apply_shares(groups: &mut PathGroups, shares: Shares) {
    let per_group = shares.modes.into_iter().zip(shares.paths.into_iter());
    for (group, (mode_share, path_shares)) in groups.values_mut().zip(per_group) {
        group.market_share = mode_share;
        for (path, share) in group.paths_mut().iter_mut().zip(path_shares) {
            path.market_share = share;
        }
    }
}

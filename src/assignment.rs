use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use yaml_rust::YamlLoader;

use super::config_utils;
use super::demand_reader::{DemandQuery, DemandReader, DemandStats, ReadOutcome};
use super::demand_table::CsvDemandDatabase;
use super::modal_split::{CostFunctions, SplitError, SplitMethod};
use super::network::NodeList;
use super::path::{group_paths, Path as CandidatePath, PathFilter};
use super::progress::LogProgress;
use super::split_driver::{ODPaths, SplitDriver, SplitReport};


#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    pub demand_dir: PathBuf,
    pub od_table: String,
    pub filter: Option<String>,
    pub time_dependent: bool,
    pub limit_to_highlighted_area: bool,
    pub nodes_path: PathBuf,
    pub paths_path: PathBuf,
    pub modal_split_method: String,
    pub path_filter: PathFilter,
    pub cost_functions: CostFunctions,
}

impl AssignmentConfig {
    /// Reads a yaml config file.  Relative paths in it are relative to the file's directory.
    pub fn from_file(path: &str) -> Result<AssignmentConfig, Box<dyn Error>> {
        let file_contents = std::fs::read_to_string(path)?;
        let yaml_cfgs = YamlLoader::load_from_str(&file_contents)?;
        let yaml_cfg = yaml_cfgs.first().ok_or("assignment config is empty")?;
        let config_dir = Path::new(path).parent().unwrap_or_else(|| Path::new("."));

        let filter = match yaml_cfg["where"].as_str() {
            Some(ss) if !ss.trim().is_empty() => Some(String::from(ss)),
            _ => None,
        };
        let modal_split_method = match yaml_cfg["modal_split_method"].as_str() {
            Some(name) => String::from(name),
            None => String::from("MNL"),
        };
        // either a mapping, or the path of a yaml file holding one
        let cost_functions = match yaml_cfg["cost_functions"].as_str() {
            Some(cf_path) => {
                let cf_path = config_utils::str_to_absolute_path(cf_path, config_dir);
                CostFunctions::from_file(&cf_path)?
            },
            None => CostFunctions::from_yaml(&yaml_cfg["cost_functions"])?,
        };

        Ok(AssignmentConfig {
            demand_dir: config_utils::yaml_required_path(yaml_cfg, "demand_dir", config_dir)?,
            od_table: String::from(config_utils::yaml_required_str(yaml_cfg, "od_table")?),
            filter,
            time_dependent: config_utils::yaml_bool_or(yaml_cfg, "time_dependent", false)?,
            limit_to_highlighted_area:
                config_utils::yaml_bool_or(yaml_cfg, "limit_to_highlighted_area", false)?,
            nodes_path: config_utils::yaml_required_path(yaml_cfg, "nodes_path", config_dir)?,
            paths_path: config_utils::yaml_required_path(yaml_cfg, "paths_path", config_dir)?,
            modal_split_method,
            path_filter: PathFilter {
                max_detour: config_utils::yaml_f64(yaml_cfg, "max_detour")?,
                keep_only_cheapest_intermodal:
                    config_utils::yaml_bool_or(yaml_cfg, "keep_only_cheapest_intermodal", false)?,
            },
            cost_functions,
        })
    }

    pub fn demand_query(&self) -> DemandQuery {
        let mut query = DemandQuery::new(&self.od_table)
            .time_dependent(self.time_dependent)
            .limited_to_highlighted_area(self.limit_to_highlighted_area);
        if let Some(filter) = &self.filter {
            query = query.with_filter(filter);
        }
        query
    }
}


// candidate paths of each (origin, destination, group)
type CandidatePaths = HashMap<(i32, i32, u8), Vec<CandidatePath>>;

// A convenience type for parsing csv data
type Row = HashMap<String, String>;

fn get_field<'a>(row: &'a Row, column: &str) -> Result<&'a str, Box<dyn Error>> {
    match row.get(column) {
        Some(value) => Ok(value),
        None => Err(format!("path table has no {} column", column).into()),
    }
}

/// Reads the candidate paths produced by the path search.
pub fn read_candidate_paths(csvpath: &Path) -> Result<CandidatePaths, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(csvpath)?;
    let mut candidates = CandidatePaths::new();
    let mut n_paths = 0;
    for result in reader.deserialize() {
        let row: Row = result?;
        let origin: i32 = get_field(&row, "org")?.parse()?;
        let destination: i32 = get_field(&row, "dst")?.parse()?;
        let group: u8 = get_field(&row, "grp")?.parse()?;
        let mut path = CandidatePath::new(
            get_field(&row, "cost")?.parse()?,
            get_field(&row, "duration")?.parse()?,
            get_field(&row, "length")?.parse()?,
            get_field(&row, "mode")?.parse()?,
            get_field(&row, "means")?.parse()?,
        );
        if let Some(flag) = row.get("intermodal") {
            path.intermodal = config_utils::parse_flag(flag)?;
        }
        if let Some(route) = row.get("route") {
            if !route.is_empty() {
                path.route_key = Some(route.parse()?);
            }
        }
        candidates.entry((origin, destination, group)).or_insert(vec![]).push(path);
        n_paths += 1;
    }
    log::info!("read {} candidate paths for {} OD pairs from {}", n_paths, candidates.len(),
               csvpath.display());
    Ok(candidates)
}


pub struct AssignmentResults {
    pub stats: DemandStats,
    pub od_paths: Vec<ODPaths>,
    pub reports: BTreeMap<u8, SplitReport>,
    /// Configuration problems met while initializing the split method, per group.  The cells
    /// of these groups were not split.
    pub config_errors: Vec<(u8, SplitError)>,
}

impl AssignmentResults {
    pub fn total_assigned_quantity(&self) -> f64 {
        self.od_paths.iter()
            .flat_map(|od| od.path_quantities())
            .map(|(_, _, quantity)| quantity)
            .sum()
    }

    /// Writes one row per path with a non-zero share.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), Box<dyn Error>> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&["org", "dst", "grp", "class", "mode", "means", "cost",
                              "market_share", "quantity"])?;
        for od in &self.od_paths {
            for (mode, path, quantity) in od.path_quantities() {
                if path.market_share == 0. {
                    continue;
                }
                writer.write_record(&[
                    od.cell.origin_node_id().to_string(),
                    od.cell.destination_node_id().to_string(),
                    od.cell.group().to_string(),
                    od.cell.class_id().to_string(),
                    mode.to_string(),
                    path.loading_means.to_string(),
                    path.cost.to_string(),
                    path.market_share.to_string(),
                    quantity.to_string(),
                ])?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}


/// Loads the demand of a scenario and splits it over the candidate paths.
pub struct ModalSplitAssignment {
    cfg: AssignmentConfig,
    nodes: NodeList,
    db: CsvDemandDatabase,
    cancel: Arc<AtomicBool>,
}

impl ModalSplitAssignment {
    pub fn new(cfg: AssignmentConfig) -> Result<ModalSplitAssignment, Box<dyn Error>> {
        // fail early on a bad method name
        SplitMethod::from_name(&cfg.modal_split_method)?;
        let nodes = NodeList::from_csv(&cfg.nodes_path)?;
        let db = CsvDemandDatabase::new(&cfg.demand_dir);
        Ok(ModalSplitAssignment {
            cfg,
            nodes,
            db,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_cfg(config_path: &str) -> Result<ModalSplitAssignment, Box<dyn Error>> {
        ModalSplitAssignment::new(AssignmentConfig::from_file(config_path)?)
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.cfg
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    /// Setting this flag stops the demand read at the next row.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs the whole assignment.  Returns `None` if it was cancelled.
    pub fn run(&mut self) -> Result<Option<AssignmentResults>, Box<dyn Error>> {
        self.nodes.clear_demands();
        let reader = DemandReader::new(&self.db, self.cfg.demand_query())?;
        let mut progress = LogProgress::with_cancel_flag("O-D matrix", self.cancel.clone());
        let stats = match reader.load_demand(&mut self.nodes, &mut progress)? {
            ReadOutcome::Completed(stats) => stats,
            ReadOutcome::Cancelled => return Ok(None),
        };

        let candidates = read_candidate_paths(&self.cfg.paths_path)?;
        let mut driver = SplitDriver::new(SplitMethod::from_name(&self.cfg.modal_split_method)?);
        log::info!("splitting demand with the {} method", driver.method().pretty_name());

        let mut results = AssignmentResults {
            stats,
            od_paths: vec![],
            reports: BTreeMap::new(),
            config_errors: vec![],
        };
        let groups = results.stats.groups_with_demand.clone();
        for group in groups {
            if let Err(err) = driver.initialize(group, &self.cfg.cost_functions) {
                results.config_errors.push((group, err));
            }
            let mut batch: Vec<ODPaths> = self.nodes.demand_cells().into_iter()
                .filter(|cell| cell.group() == group)
                .map(|cell| {
                    let key = (cell.origin_node_id(), cell.destination_node_id(), group);
                    let paths = match candidates.get(&key) {
                        Some(paths) => paths.clone(),
                        None => vec![],
                    };
                    ODPaths::new(cell.clone(), group_paths(paths, &self.cfg.path_filter))
                })
                .collect();
            let report = driver.run(&mut batch);
            results.reports.insert(group, report);
            results.od_paths.append(&mut batch);
        }

        log::info!("assigned {} of {} units of demand", results.total_assigned_quantity(),
                   results.stats.total_quantity);
        Ok(Some(results))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    use super::*;

    fn write_env(dir: &Path, config: &str) -> String {
        std::fs::create_dir(dir.join("od")).unwrap();
        std::fs::write(dir.join("od").join("demand.csv"),
                       "grp,org,dst,qty\n0,1,2,10\n0,1,2,2\n1,2,3,4\n0,3,3,7\n").unwrap();
        std::fs::write(dir.join("nodes.csv"), "num,loading,highlighted\n1,1,0\n2,1,1\n3,1,1\n")
            .unwrap();
        std::fs::write(dir.join("paths.csv"),
                       "org,dst,grp,mode,means,cost,duration,length,intermodal,route\n\
                        1,2,0,1,1,10,3600,100,0,\n\
                        1,2,0,2,1,30,7200,120,0,\n\
                        2,3,1,1,1,5,600,50,0,\n").unwrap();
        let cfg_path = dir.join("config.yaml");
        std::fs::write(&cfg_path, config).unwrap();
        String::from(cfg_path.to_str().unwrap())
    }

    static BASE_CONFIG: &str = "demand_dir: od\nod_table: demand\nnodes_path: nodes.csv\n\
                                paths_path: paths.csv\n";

    #[test]
    fn test_config_defaults() {
        let dir = tempdir().unwrap();
        let cfg_path = write_env(dir.path(), BASE_CONFIG);
        let cfg = AssignmentConfig::from_file(&cfg_path).unwrap();
        assert_eq!(cfg.demand_dir, dir.path().join("od"));
        assert_eq!(cfg.od_table, "demand");
        assert_eq!(cfg.filter, None);
        assert!(!cfg.time_dependent);
        assert!(!cfg.limit_to_highlighted_area);
        assert_eq!(cfg.modal_split_method, "MNL");
        assert_eq!(cfg.path_filter, PathFilter::default());
        assert!(cfg.cost_functions.is_empty());
    }

    #[test]
    fn test_config_errors() {
        let dir = tempdir().unwrap();
        let cfg_path = write_env(dir.path(), "od_table: demand\n");
        assert!(AssignmentConfig::from_file(&cfg_path).is_err());

        let cfg_path = dir.path().join("bad_method.yaml");
        std::fs::write(&cfg_path, format!("{}modal_split_method: Gravity\n", BASE_CONFIG))
            .unwrap();
        assert!(ModalSplitAssignment::from_cfg(cfg_path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_cost_functions_file() {
        let dir = tempdir().unwrap();
        let config = format!("{}modal_split_method: Abraham\ncost_functions: costs.yaml\n\
                              max_detour: 2\n", BASE_CONFIG);
        let cfg_path = write_env(dir.path(), &config);
        std::fs::write(dir.path().join("costs.yaml"), "ABRAHAM: -1\n").unwrap();
        let cfg = AssignmentConfig::from_file(&cfg_path).unwrap();
        assert_eq!(cfg.cost_functions.get("ABRAHAM"), Some(-1.));
        assert_eq!(cfg.path_filter.max_detour, Some(2.));
    }

    #[test]
    fn test_run_proportional() {
        let dir = tempdir().unwrap();
        let config = format!("{}modal_split_method: Proportional\n", BASE_CONFIG);
        let cfg_path = write_env(dir.path(), &config);
        let mut assignment = ModalSplitAssignment::from_cfg(&cfg_path).unwrap();
        let results = assignment.run().unwrap().unwrap();

        assert_eq!(results.stats.groups_with_demand, vec![0, 1]);
        assert_abs_diff_eq!(results.stats.total_quantity, 16., epsilon = 1e-12);
        assert_eq!(results.od_paths.len(), 2);
        assert_eq!(results.reports[&0].cells_split, 1);
        assert_eq!(results.reports[&1].cells_split, 1);
        assert!(results.config_errors.is_empty());
        assert_abs_diff_eq!(results.total_assigned_quantity(), 16., epsilon = 1e-9);

        let od = &results.od_paths[0];
        assert_eq!(od.cell.quantity(), 12.);
        assert_abs_diff_eq!(od.groups[&1].market_share, 0.75, epsilon = 1e-12);

        let mut output = vec![];
        results.write_csv(&mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "org,dst,grp,class,mode,means,cost,market_share,quantity");
        assert!(lines[1].starts_with("1,2,0,0,1,1,10,"));
        let quantity: f64 = lines[1].rsplit(',').next().unwrap().parse().unwrap();
        assert_abs_diff_eq!(quantity, 9., epsilon = 1e-9);
        assert_eq!(lines[3], "2,3,1,0,1,1,5,1,4");
    }

    #[test]
    fn test_run_reports_invalid_exponent() {
        let dir = tempdir().unwrap();
        let config = format!("{}modal_split_method: Abraham\ncost_functions:\n  ABRAHAM.1: 2\n",
                             BASE_CONFIG);
        let cfg_path = write_env(dir.path(), &config);
        let mut assignment = ModalSplitAssignment::from_cfg(&cfg_path).unwrap();
        let results = assignment.run().unwrap().unwrap();
        assert_eq!(results.config_errors.len(), 1);
        assert_eq!(results.config_errors[0].0, 1);
        assert_eq!(results.reports[&0].cells_split, 1);
        assert_eq!(results.reports[&1].cells_refused, 1);
        assert_abs_diff_eq!(results.total_assigned_quantity(), 12., epsilon = 1e-9);
    }

    #[test]
    fn test_run_cancelled() {
        let dir = tempdir().unwrap();
        let cfg_path = write_env(dir.path(), BASE_CONFIG);
        let mut assignment = ModalSplitAssignment::from_cfg(&cfg_path).unwrap();
        assignment.cancel_flag().store(true, Ordering::Relaxed);
        assert!(assignment.run().unwrap().is_none());
    }
}

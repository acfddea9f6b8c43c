use super::demand_cell::DemandCell;
use super::modal_split::{CostFunctions, SplitError, SplitMethod};
use super::path::{Path, PathGroups};


/// An OD cell with the candidate paths found for it, by loading mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ODPaths {
    pub cell: DemandCell,
    pub groups: PathGroups,
}

impl ODPaths {
    pub fn new(cell: DemandCell, groups: PathGroups) -> ODPaths {
        ODPaths {cell, groups}
    }

    /// The quantity sent along each path, with the path's loading mode.
    pub fn path_quantities(&self) -> Vec<(u8, &Path, f64)> {
        let quantity = self.cell.quantity();
        self.groups.iter()
            .flat_map(|(mode, group)| group.paths().iter().map(move |pp| (*mode, pp)))
            .map(|(mode, path)| (mode, path, quantity * path.market_share))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitReport {
    pub cells_split: usize,
    pub cells_refused: usize,
    pub cells_without_paths: usize,
    pub calibration_warning: Option<SplitError>,
}

/// Applies one split method to a batch of OD cells, one cell at a time.
pub struct SplitDriver {
    method: SplitMethod,
}

impl SplitDriver {
    pub fn new(method: SplitMethod) -> SplitDriver {
        SplitDriver {method}
    }

    pub fn method(&self) -> &SplitMethod {
        &self.method
    }

    pub fn initialize(&mut self, group: u8, cost_functions: &CostFunctions)
                      -> Result<(), SplitError> {
        self.method.initialize(group, cost_functions)
    }

    /// Splits a single cell.  Cells without any path are never split.
    pub fn split_cell(&mut self, od_paths: &mut ODPaths) -> bool {
        if od_paths.groups.is_empty() {
            return false;
        }
        self.method.split(&od_paths.cell, &mut od_paths.groups)
    }

    /// Splits every cell of `batch`.  A refused cell keeps whatever shares its paths had
    /// and doesn't stop the others from being split.
    pub fn run(&mut self, batch: &mut [ODPaths]) -> SplitReport {
        let mut report = SplitReport::default();
        for od_paths in batch.iter_mut() {
            if od_paths.groups.is_empty() {
                report.cells_without_paths += 1;
                continue;
            }
            if self.split_cell(od_paths) {
                report.cells_split += 1;
            } else {
                log::debug!("{} refused to split {} -> {} (group {})", self.method.name(),
                            od_paths.cell.origin_node_id(), od_paths.cell.destination_node_id(),
                            od_paths.cell.group());
                report.cells_refused += 1;
            }
        }
        if self.method.calibration_warned() {
            report.calibration_warning = Some(SplitError::CalibrationWarning);
        }
        log::info!("{}: {} cells split, {} refused, {} without paths", self.method.pretty_name(),
                   report.cells_split, report.cells_refused, report.cells_without_paths);
        report
    }
}


#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use super::super::path::{group_paths, PathFilter};

    fn od_paths(org: i32, quantity: f64, mode_costs: &[(u8, f64)]) -> ODPaths {
        let paths = mode_costs.iter()
            .map(|(mode, cost)| Path::new(*cost, 60., 100., *mode, 1))
            .collect();
        ODPaths::new(DemandCell::new(0, org, 99, quantity),
                     group_paths(paths, &PathFilter::default()))
    }

    #[test]
    fn test_run_counts_cells() {
        let mut batch = vec![
            od_paths(1, 10., &[(1, 10.), (2, 10.)]),
            od_paths(2, 5., &[]),
            od_paths(3, 8., &[(1, 1000.), (2, 1000.)]),
            od_paths(4, 4., &[(1, 1.)]),
            od_paths(5, 4., &[(1, 2000.)]),
        ];
        let mut driver = SplitDriver::new(SplitMethod::from_name("MNL").unwrap());
        driver.initialize(0, &CostFunctions::new()).unwrap();
        let report = driver.run(&mut batch);

        assert_eq!(report, SplitReport {
            cells_split: 2,
            cells_refused: 2,
            cells_without_paths: 1,
            calibration_warning: Some(SplitError::CalibrationWarning),
        });
        // refused cells are left alone
        assert!(batch[2].groups.values().all(|gg| gg.market_share == 0.));
        assert_abs_diff_eq!(batch[0].groups[&1].market_share, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_path_quantities() {
        let mut cell = od_paths(1, 12., &[(1, 10.), (2, 30.), (2, 60.)]);
        let mut driver = SplitDriver::new(SplitMethod::Proportional);
        assert!(driver.split_cell(&mut cell));

        let quantities = cell.path_quantities();
        assert_eq!(quantities.len(), 3);
        assert_eq!(quantities[0].0, 1);
        assert_abs_diff_eq!(quantities[0].2, 9., epsilon = 1e-9);
        assert_abs_diff_eq!(quantities[1].2, 2., epsilon = 1e-9);
        assert_abs_diff_eq!(quantities[2].2, 1., epsilon = 1e-9);
        let total: f64 = quantities.iter().map(|qq| qq.2).sum();
        assert_abs_diff_eq!(total, 12., epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_configuration_refuses_everything() {
        let mut cost_functions = CostFunctions::new();
        cost_functions.insert("ABRAHAM.0", 1.5);
        let mut driver = SplitDriver::new(SplitMethod::from_name("Abraham").unwrap());
        assert!(driver.initialize(0, &cost_functions).is_err());

        let mut batch = vec![od_paths(1, 1., &[(1, 10.)]), od_paths(2, 1., &[(1, 10.)])];
        let report = driver.run(&mut batch);
        assert_eq!(report.cells_refused, 2);
        assert_eq!(report.cells_split, 0);
        assert_eq!(report.calibration_warning, None);
    }

    #[test]
    fn test_no_paths_is_not_split() {
        let mut cell = od_paths(1, 1., &[]);
        let mut driver = SplitDriver::new(SplitMethod::Proportional);
        assert!(!driver.split_cell(&mut cell));
        assert!(cell.path_quantities().is_empty());
    }
}

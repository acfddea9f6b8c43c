// imports of other modules from this crate
mod config_utils;

mod demand_cell;
pub use demand_cell::DemandCell;

mod row_filter;
pub use row_filter::RowFilter;

mod demand_table;
pub use demand_table::{valid_demand_tables, CsvDemandDatabase, DemandRows, DemandTable};
pub use demand_table::{CLASS_COLUMN, DESTINATION_COLUMN, GROUP_COLUMN, MANDATORY_COLUMNS,
                       ORIGIN_COLUMN, QUANTITY_COLUMN, TIME_COLUMN};

mod network;
pub use network::{DemandNetwork, DemandNode, NodeList};

mod progress;
pub use progress::{LogProgress, NoProgress};

mod demand_reader;
pub use demand_reader::{DemandError, DemandQuery, DemandReader, DemandStats, ReadOutcome,
                        MAX_GROUPS};

mod path;
pub use path::{group_paths, Path, PathDetailedCosts, PathFilter, PathGroup, PathGroups};

mod modal_split;
pub use modal_split::{CostFunctions, SplitError, SplitMethod, ABRAHAM_KEY,
                      DEFAULT_ABRAHAM_EXPONENT};

mod split_driver;
pub use split_driver::{ODPaths, SplitDriver, SplitReport};

mod assignment;
pub use assignment::{read_candidate_paths, AssignmentConfig, AssignmentResults,
                     ModalSplitAssignment};

#[cfg(test)]
mod test_utils;


/// Receives progress reports from long-running reads, and tells them whether to go on.
pub trait ProgressMonitor {
    /// Called once before the work starts, with the number of records to expect.
    fn start(&mut self, total: usize);

    /// Called before each record.  Returning false cancels the work.
    fn tick(&mut self) -> bool;

    fn stop(&mut self);
}

use std::str::FromStr;

use itertools::Itertools;
use thiserror::Error;

use super::demand_cell::DemandCell;
use super::demand_table::{DemandTable, CLASS_COLUMN, MANDATORY_COLUMNS, TIME_COLUMN};
use super::network::DemandNetwork;
use super::ProgressMonitor;


/// Commodity groups are numbered from 0 to `MAX_GROUPS - 1`.
pub const MAX_GROUPS: u8 = 100;

#[derive(Error, Debug)]
pub enum DemandError {
    #[error("table {0} not found")]
    TableNotFound(String),

    #[error("invalid O-D table structure: {table} has no {} column", .missing.iter().join(", "))]
    InvalidSchema { table: String, missing: Vec<String> },

    #[error("time dependent O-D table {0} must contain a time column")]
    MissingTimeColumn(String),

    #[error("invalid record found in O-D table at row {row}: {column} = {value:?}")]
    MalformedRow { row: usize, column: String, value: String },

    #[error("O-D query failed: {0}")]
    QueryFailed(String),
}

impl From<csv::Error> for DemandError {
    fn from(err: csv::Error) -> DemandError {
        DemandError::QueryFailed(err.to_string())
    }
}

impl From<std::io::Error> for DemandError {
    fn from(err: std::io::Error) -> DemandError {
        DemandError::QueryFailed(err.to_string())
    }
}

/// Which demand to read, and how.
#[derive(PartialEq, Debug, Clone)]
pub struct DemandQuery {
    pub table: String,
    pub filter: Option<String>,
    pub time_dependent: bool,
    pub limit_to_highlighted_area: bool,
}

impl DemandQuery {
    pub fn new(table: &str) -> DemandQuery {
        DemandQuery {
            table: String::from(table),
            filter: None,
            time_dependent: false,
            limit_to_highlighted_area: false,
        }
    }

    pub fn with_filter(mut self, filter: &str) -> DemandQuery {
        self.filter = Some(String::from(filter));
        self
    }

    pub fn time_dependent(mut self, time_dependent: bool) -> DemandQuery {
        self.time_dependent = time_dependent;
        self
    }

    pub fn limited_to_highlighted_area(mut self, limit: bool) -> DemandQuery {
        self.limit_to_highlighted_area = limit;
        self
    }
}

/// Aggregates of one completed reading pass.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DemandStats {
    /// Groups for which at least one demand cell was loaded, in increasing order.
    pub groups_with_demand: Vec<u8>,
    /// Highest class of all parsed rows, including the ones that were skipped.
    pub max_class_seen: u8,
    pub total_quantity: f64,
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub skipped_self_loops: usize,
    pub skipped_invalid: usize,
    pub skipped_unresolved: usize,
    pub skipped_outside_area: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub enum ReadOutcome {
    Completed(DemandStats),
    /// The caller asked the read to stop.  Whatever was loaded before that is left in the
    /// network.
    Cancelled,
}

struct DemandRow {
    group: i64,
    origin: i32,
    destination: i32,
    quantity: f64,
    starting_time_s: Option<u32>,
    class_id: u8,
}

/// Validates a demand table and loads its rows into a network.
pub struct DemandReader<'a, T> {
    table: &'a T,
    query: DemandQuery,
    has_classes: bool,
    n_records: usize,
}

impl<'a, T> DemandReader<'a, T> where T: DemandTable {
    /// Checks the table and its structure, and counts the rows to read.
    pub fn new(table: &'a T, query: DemandQuery) -> Result<DemandReader<'a, T>, DemandError> {
        if !table.table_exists(&query.table) {
            return Err(DemandError::TableNotFound(query.table.clone()));
        }

        let mut missing = vec![];
        for column in MANDATORY_COLUMNS.iter() {
            if !table.has_column(&query.table, column)? {
                missing.push(String::from(*column));
            }
        }
        if !missing.is_empty() {
            return Err(DemandError::InvalidSchema {table: query.table.clone(), missing});
        }

        // time dependent assignments need starting times
        if query.time_dependent && !table.has_column(&query.table, TIME_COLUMN)? {
            return Err(DemandError::MissingTimeColumn(query.table.clone()));
        }
        let has_classes = table.has_column(&query.table, CLASS_COLUMN)?;

        log::debug!("counting rows of {}", query.table);
        let n_records = table.count_rows(&query.table, query.filter.as_deref())?;

        Ok(DemandReader {
            table,
            query,
            has_classes,
            n_records,
        })
    }

    /// The number of rows the query will return.
    pub fn n_records(&self) -> usize {
        self.n_records
    }

    pub fn has_classes(&self) -> bool {
        self.has_classes
    }

    /// Streams the demand rows into `network`.  Self-loops, rows with a node the network can't
    /// resolve and, if requested, rows leaving the highlighted area are skipped.  A row that
    /// can't be parsed aborts the whole read.
    pub fn load_demand<N, P>(&self, network: &mut N, progress: &mut P)
                             -> Result<ReadOutcome, DemandError>
        where N: DemandNetwork, P: ProgressMonitor
    {
        let mut columns = MANDATORY_COLUMNS.to_vec();
        if self.query.time_dependent {
            columns.push(TIME_COLUMN);
        }
        if self.has_classes {
            columns.push(CLASS_COLUMN);
        }

        log::info!("loading {} O-D records from {}", self.n_records, self.query.table);
        let rows = self.table.query(&self.query.table, &columns, self.query.filter.as_deref())?;
        progress.start(self.n_records);

        let mut stats = DemandStats::default();
        let mut demand_for_group = [false; MAX_GROUPS as usize];
        for (row_idx, fields) in rows.enumerate() {
            if !progress.tick() {
                progress.stop();
                log::info!("loading of {} cancelled after {} rows", self.query.table, row_idx);
                return Ok(ReadOutcome::Cancelled);
            }

            let row = match fields.and_then(|ff| self.parse_row(&ff, &columns, row_idx + 1)) {
                Ok(row) => row,
                Err(err) => {
                    progress.stop();
                    return Err(err);
                }
            };
            stats.rows_read += 1;
            stats.max_class_seen = stats.max_class_seen.max(row.class_id);

            // do not consider demand from a node to itself
            if row.origin == row.destination {
                stats.skipped_self_loops += 1;
                continue;
            }
            if row.group < 0 || row.group >= MAX_GROUPS as i64 || !(row.quantity > 0.) {
                stats.skipped_invalid += 1;
                continue;
            }

            // both nodes must exist
            let (org_idx, dst_idx) = match (network.resolve(row.origin, true),
                                            network.resolve(row.destination, true)) {
                (Some(org_idx), Some(dst_idx)) => (org_idx, dst_idx),
                _ => {
                    stats.skipped_unresolved += 1;
                    continue;
                }
            };

            if self.query.limit_to_highlighted_area &&
               !(network.is_in_highlighted_area(org_idx) &&
                 network.is_in_highlighted_area(dst_idx)) {
                stats.skipped_outside_area += 1;
                continue;
            }

            let group = row.group as u8;
            let mut cell = DemandCell::new(group, row.origin, row.destination, row.quantity)
                .with_class(row.class_id);
            if let Some(starting_time_s) = row.starting_time_s {
                cell = cell.with_starting_time(starting_time_s);
            }
            network.add_demand(org_idx, cell);

            demand_for_group[group as usize] = true;
            stats.total_quantity += row.quantity;
            stats.rows_loaded += 1;
        }
        progress.stop();

        stats.groups_with_demand = (0..MAX_GROUPS)
            .filter(|gg| demand_for_group[*gg as usize])
            .collect();
        log::debug!("skipped rows: {} self-loops, {} invalid, {} unresolved, {} outside area",
                    stats.skipped_self_loops, stats.skipped_invalid, stats.skipped_unresolved,
                    stats.skipped_outside_area);
        log::info!("loaded {} O-D records, total quantity {}", stats.rows_loaded,
                   stats.total_quantity);
        Ok(ReadOutcome::Completed(stats))
    }

    fn parse_row(&self, fields: &[String], columns: &[&str], row: usize)
                 -> Result<DemandRow, DemandError> {
        let group = parse_field(fields, columns, 0, row)?;
        let origin = parse_field(fields, columns, 1, row)?;
        let destination = parse_field(fields, columns, 2, row)?;
        let quantity: f64 = parse_field(fields, columns, 3, row)?;
        if !quantity.is_finite() {
            return Err(malformed(fields, columns, 3, row));
        }

        let mut next_idx = 4;
        let starting_time_s = if self.query.time_dependent {
            // times are expressed in minutes after midnight
            let minutes: u32 = parse_field(fields, columns, next_idx, row)?;
            let seconds = minutes.checked_mul(60)
                .ok_or_else(|| malformed(fields, columns, next_idx, row))?;
            next_idx += 1;
            Some(seconds)
        } else {
            None
        };
        let class_id = if self.has_classes {
            parse_field(fields, columns, next_idx, row)?
        } else {
            0
        };

        Ok(DemandRow {group, origin, destination, quantity, starting_time_s, class_id})
    }
}

fn parse_field<F: FromStr>(fields: &[String], columns: &[&str], idx: usize, row: usize)
                           -> Result<F, DemandError> {
    match fields.get(idx) {
        Some(value) => value.trim().parse().map_err(|_| malformed(fields, columns, idx, row)),
        None => Err(malformed(fields, columns, idx, row)),
    }
}

fn malformed(fields: &[String], columns: &[&str], idx: usize, row: usize) -> DemandError {
    DemandError::MalformedRow {
        row,
        column: String::from(columns.get(idx).copied().unwrap_or("?")),
        value: fields.get(idx).cloned().unwrap_or_default(),
    }
}

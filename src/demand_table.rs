use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::demand_reader::DemandError;
use super::row_filter::RowFilter;


pub static GROUP_COLUMN: &str = "grp";
pub static ORIGIN_COLUMN: &str = "org";
pub static DESTINATION_COLUMN: &str = "dst";
pub static QUANTITY_COLUMN: &str = "qty";
pub static TIME_COLUMN: &str = "time";
pub static CLASS_COLUMN: &str = "class";

/// Columns every demand table must have.
pub static MANDATORY_COLUMNS: [&str; 4] =
    [GROUP_COLUMN, ORIGIN_COLUMN, DESTINATION_COLUMN, QUANTITY_COLUMN];

/// A streaming cursor over the raw fields of a query, in the requested column order.
pub type DemandRows<'a> = Box<dyn Iterator<Item = Result<Vec<String>, DemandError>> + 'a>;

/// A queryable source of tabular demand data.
pub trait DemandTable {
    fn table_exists(&self, table: &str) -> bool;

    fn table_names(&self) -> Result<Vec<String>, DemandError>;

    fn column_names(&self, table: &str) -> Result<Vec<String>, DemandError>;

    /// Counts the rows of `table` that satisfy `filter`.
    fn count_rows(&self, table: &str, filter: Option<&str>) -> Result<usize, DemandError>;

    /// Streams the given columns of the rows of `table` that satisfy `filter`.
    fn query<'a>(&'a self, table: &str, columns: &[&str], filter: Option<&str>)
                 -> Result<DemandRows<'a>, DemandError>;

    /// Column names are matched without regard to case.
    fn has_column(&self, table: &str, column: &str) -> Result<bool, DemandError> {
        let columns = self.column_names(table)?;
        Ok(columns.iter().any(|cc| cc.eq_ignore_ascii_case(column)))
    }
}

/// Lists the tables of `db` that have all the mandatory demand columns.
pub fn valid_demand_tables<T: DemandTable>(db: &T) -> Result<Vec<String>, DemandError> {
    let mut valid = vec![];
    for table in db.table_names()? {
        let columns = match db.column_names(&table) {
            Ok(columns) => columns,
            Err(err) => {
                log::debug!("skipping table {}: {}", table, err);
                continue;
            }
        };
        let is_valid = MANDATORY_COLUMNS.iter().all(
            |mc| columns.iter().any(|cc| cc.eq_ignore_ascii_case(mc)));
        if is_valid {
            valid.push(table);
        }
    }
    valid.sort();
    Ok(valid)
}


/// A directory of csv files, each one being a table named after the file stem.
pub struct CsvDemandDatabase {
    dir: PathBuf,
}

impl CsvDemandDatabase {
    pub fn new(dir: &Path) -> CsvDemandDatabase {
        CsvDemandDatabase {dir: dir.to_path_buf()}
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }

    fn open(&self, table: &str) -> Result<csv::Reader<File>, DemandError> {
        if !self.table_exists(table) {
            return Err(DemandError::TableNotFound(String::from(table)));
        }
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(self.table_path(table))?;
        Ok(reader)
    }

    fn open_filtered(&self, table: &str, filter: Option<&str>)
                     -> Result<(csv::Reader<File>, Vec<String>, Option<RowFilter>),
                               DemandError> {
        let mut reader = self.open(table)?;
        let header: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let row_filter = match filter.map(str::trim) {
            Some(expression) if !expression.is_empty() => {
                Some(RowFilter::parse(expression, &header)?)
            },
            _ => None,
        };
        Ok((reader, header, row_filter))
    }
}

impl DemandTable for CsvDemandDatabase {
    fn table_exists(&self, table: &str) -> bool {
        self.table_path(table).is_file()
    }

    fn table_names(&self) -> Result<Vec<String>, DemandError> {
        let mut names = vec![];
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_csv = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|ss| ss.to_str()) {
                names.push(String::from(stem));
            }
        }
        names.sort();
        Ok(names)
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>, DemandError> {
        let mut reader = self.open(table)?;
        let header = reader.headers()?;
        Ok(header.iter().map(String::from).collect())
    }

    fn count_rows(&self, table: &str, filter: Option<&str>) -> Result<usize, DemandError> {
        let (mut reader, _, row_filter) = self.open_filtered(table, filter)?;
        let mut count = 0;
        for record in reader.records() {
            let record = record?;
            let fields: Vec<&str> = record.iter().collect();
            if row_filter.as_ref().map_or(true, |rf| rf.matches(&fields)) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn query<'a>(&'a self, table: &str, columns: &[&str], filter: Option<&str>)
                 -> Result<DemandRows<'a>, DemandError> {
        let (reader, header, row_filter) = self.open_filtered(table, filter)?;
        let mut column_idxs = vec![];
        for column in columns {
            match header.iter().position(|hh| hh.eq_ignore_ascii_case(column)) {
                Some(idx) => column_idxs.push(idx),
                None => return Err(DemandError::QueryFailed(
                    format!("no column {} in table {}", column, table))),
            }
        }

        let rows = reader.into_records().filter_map(move |record| {
            let record = match record {
                Ok(record) => record,
                Err(err) => return Some(Err(DemandError::from(err))),
            };
            let fields: Vec<&str> = record.iter().collect();
            if let Some(rf) = &row_filter {
                if !rf.matches(&fields) {
                    return None;
                }
            }
            let selected = column_idxs.iter()
                .map(|idx| String::from(fields.get(*idx).copied().unwrap_or("")))
                .collect();
            Some(Ok(selected))
        });
        Ok(Box::new(rows))
    }
}


#[cfg(test)]
mod tests {
    use std::io::Write;
    use tempfile::tempdir;

    use super::*;

    fn write_table(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(format!("{}.csv", name))).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_schema_introspection() {
        let dir = tempdir().unwrap();
        write_table(dir.path(), "od", "GRP,Org,dst,qty,time\n0,1,2,5.0,30\n");
        write_table(dir.path(), "nodes", "num,loading\n1,1\n");
        std::fs::write(dir.path().join("readme.txt"), "not a table").unwrap();

        let db = CsvDemandDatabase::new(dir.path());
        assert!(db.table_exists("od"));
        assert!(!db.table_exists("missing"));
        assert_eq!(db.table_names().unwrap(), vec!["nodes", "od"]);
        assert_eq!(db.column_names("od").unwrap(), vec!["GRP", "Org", "dst", "qty", "time"]);
        assert!(db.has_column("od", "grp").unwrap());
        assert!(db.has_column("od", "TIME").unwrap());
        assert!(!db.has_column("od", "class").unwrap());
        assert_eq!(valid_demand_tables(&db).unwrap(), vec!["od"]);

        match db.column_names("missing") {
            Err(DemandError::TableNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_count_and_query() {
        let dir = tempdir().unwrap();
        write_table(dir.path(), "od",
                    "grp,org,dst,qty\n0,1,2,5\n1,1,3,7.5\n0, 4 ,2,1\n2,5,6,0\n");
        let db = CsvDemandDatabase::new(dir.path());

        assert_eq!(db.count_rows("od", None).unwrap(), 4);
        assert_eq!(db.count_rows("od", Some("  ")).unwrap(), 4);
        assert_eq!(db.count_rows("od", Some("grp = 0")).unwrap(), 2);
        assert_eq!(db.count_rows("od", Some("qty > 1 AND grp < 2")).unwrap(), 2);

        // columns come back in the requested order, trimmed
        let rows: Vec<Vec<String>> = db.query("od", &["qty", "org"], Some("grp = 0")).unwrap()
            .collect::<Result<_, _>>().unwrap();
        assert_eq!(rows, vec![vec!["5", "1"], vec!["1", "4"]]);

        match db.query("od", &["class"], None) {
            Err(DemandError::QueryFailed(msg)) => assert!(msg.contains("class")),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("query on a missing column should fail"),
        }
        assert!(db.count_rows("od", Some("nope = 1")).is_err());
    }

    #[test]
    fn test_ragged_rows_fail() {
        let dir = tempdir().unwrap();
        write_table(dir.path(), "od", "grp,org,dst,qty\n0,1,2,5\n0,1\n");
        let db = CsvDemandDatabase::new(dir.path());
        let rows: Vec<Result<Vec<String>, DemandError>> =
            db.query("od", &["grp", "qty"], None).unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        match &rows[1] {
            Err(DemandError::QueryFailed(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}

//! CSV table loading.

use std::path::Path;

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};

use crate::error::{IngestError, Result};

/// Reads a CSV file with one header row into a DataFrame.
///
/// Every column is read as text. Participant ids such as `007` keep their
/// leading zeros and item columns mixing numbers with `NA` are parsed later,
/// cell by cell, by the harmonizer.
pub fn read_csv_table(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let table = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(SerReader::finish)
        .map_err(|e| IngestError::csv(path, e))?;
    check_shape(&table, path)?;

    tracing::debug!(
        path = %path.display(),
        rows = table.height(),
        columns = table.width(),
        "loaded CSV table"
    );
    Ok(table)
}

fn check_shape(table: &DataFrame, path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    if table.height() == 0 {
        return Err(IngestError::EmptyCsv { path });
    }
    let blank_header = table
        .get_column_names()
        .iter()
        .any(|name| name.trim().is_empty());
    if blank_header {
        return Err(IngestError::EmptyColumnName { path });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::AnyValue;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write csv");
        file
    }

    #[test]
    fn test_ids_read_as_text() {
        let file = csv_file("pid,visit,K6_1\n007,Baseline,3\n008,Week 6,NA\n");
        let table = read_csv_table(file.path()).expect("read csv");
        assert_eq!(table.height(), 2);
        let pid = table.column("pid").expect("pid column").get(0).expect("first cell");
        assert_eq!(pid, AnyValue::String("007"));
    }

    #[test]
    fn test_header_only_rejected() {
        let file = csv_file("pid,visit\n");
        assert!(matches!(
            read_csv_table(file.path()),
            Err(IngestError::EmptyCsv { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = read_csv_table(Path::new("/nonexistent/k6.csv"));
        assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
    }
}

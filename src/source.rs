//! Positional access to spreadsheet-like input tables.
//!
//! The planning stages only ever ask for "row R, columns [C1, C2) of sheet S"
//! style slices. [`FrameSource`] answers those questions from polars
//! DataFrames loaded header-less from CSV, one frame per sheet.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::PlanError;

/// Narrow read contract between the planner and whatever holds the input tables.
pub trait TableSource {
    /// Numeric cell. Blank cells read as zero.
    fn cell(&self, sheet: &str, row: usize, col: usize) -> Result<f64, PlanError>;

    /// Text cell, trimmed. Blank cells read as an empty string.
    fn label(&self, sheet: &str, row: usize, col: usize) -> Result<String, PlanError>;

    fn row(&self, sheet: &str, row: usize, cols: Range<usize>) -> Result<Vec<f64>, PlanError> {
        cols.map(|col| self.cell(sheet, row, col)).collect()
    }

    fn column(&self, sheet: &str, col: usize, rows: Range<usize>) -> Result<Vec<f64>, PlanError> {
        rows.map(|row| self.cell(sheet, row, col)).collect()
    }
}

/// In-memory workbook: sheet name → all-string DataFrame.
#[derive(Debug, Clone, Default)]
pub struct FrameSource {
    sheets: HashMap<String, DataFrame>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sheet: &str, frame: DataFrame) {
        self.sheets.insert(sheet.to_string(), frame);
    }

    /// Load `<base>/<sheet>.csv` for every named sheet.
    pub fn from_csv_dir<P: AsRef<Path>>(base: P, sheets: &[&str]) -> Result<Self, PlanError> {
        let mut source = Self::new();
        for sheet in sheets {
            let path = base.as_ref().join(format!("{sheet}.csv"));
            source.insert(sheet, read_sheet_csv(path)?);
        }
        Ok(source)
    }

    /// Build a sheet from literal rows; short rows are padded with blanks.
    pub fn insert_rows(&mut self, sheet: &str, rows: &[Vec<String>]) -> Result<(), PlanError> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let columns = (0..width)
            .map(|c| {
                let values: Vec<String> = rows
                    .iter()
                    .map(|r| r.get(c).cloned().unwrap_or_default())
                    .collect();
                Column::new(format!("column_{}", c + 1).into(), &values)
            })
            .collect::<Vec<_>>();
        let frame = DataFrame::new(columns)?;
        self.insert(sheet, frame);
        Ok(())
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sheets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn raw(&self, sheet: &str, row: usize, col: usize) -> Result<Option<&str>, PlanError> {
        let frame = self
            .sheets
            .get(sheet)
            .ok_or_else(|| PlanError::malformed(format!("sheet '{sheet}' not loaded")))?;
        if row >= frame.height() {
            return Err(PlanError::malformed(format!(
                "sheet '{sheet}': row {row} out of range ({} rows)",
                frame.height()
            )));
        }
        let column = frame.get_columns().get(col).ok_or_else(|| {
            PlanError::malformed(format!(
                "sheet '{sheet}': column {col} out of range ({} columns)",
                frame.width()
            ))
        })?;
        Ok(column.str()?.get(row))
    }
}

impl TableSource for FrameSource {
    fn cell(&self, sheet: &str, row: usize, col: usize) -> Result<f64, PlanError> {
        match self.raw(sheet, row, col)?.map(str::trim) {
            None | Some("") => Ok(0.0),
            Some(text) => match text.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(PlanError::malformed(format!(
                    "sheet '{sheet}' cell ({row}, {col}): '{text}' is not a number"
                ))),
            },
        }
    }

    fn label(&self, sheet: &str, row: usize, col: usize) -> Result<String, PlanError> {
        Ok(self
            .raw(sheet, row, col)?
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }
}

/// Read a header-less CSV with every column as String dtype.
pub fn read_sheet_csv(path: PathBuf) -> Result<DataFrame, PlanError> {
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path))?
        .finish()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn reads_cells_rows_and_columns() {
        let mut source = FrameSource::new();
        source
            .insert_rows("s", &rows(&[&["name", "1", "2"], &["P01", " 3.5 ", ""], &["P02"]]))
            .unwrap();

        assert_eq!(source.cell("s", 1, 1).unwrap(), 3.5);
        assert_eq!(source.cell("s", 1, 2).unwrap(), 0.0);
        assert_eq!(source.cell("s", 2, 2).unwrap(), 0.0);
        assert_eq!(source.row("s", 0, 1..3).unwrap(), vec![1.0, 2.0]);
        assert_eq!(source.column("s", 1, 1..3).unwrap(), vec![3.5, 0.0]);
        assert_eq!(source.label("s", 2, 0).unwrap(), "P02");
    }

    #[test]
    fn bad_coordinates_and_text_are_malformed() {
        let mut source = FrameSource::new();
        source.insert_rows("s", &rows(&[&["abc"]])).unwrap();

        assert!(matches!(source.cell("s", 0, 0), Err(PlanError::MalformedInput(_))));
        assert!(matches!(source.cell("s", 1, 0), Err(PlanError::MalformedInput(_))));
        assert!(matches!(source.cell("s", 0, 1), Err(PlanError::MalformedInput(_))));
        assert!(matches!(source.cell("t", 0, 0), Err(PlanError::MalformedInput(_))));
    }

    #[test]
    fn non_finite_text_is_malformed() {
        let mut source = FrameSource::new();
        source
            .insert_rows("s", &rows(&[&["nan", "inf", "-infinity", "1e400", "-2.5"]]))
            .unwrap();

        for col in 0..4 {
            assert!(
                matches!(source.cell("s", 0, col), Err(PlanError::MalformedInput(_))),
                "column {col}"
            );
        }
        assert_eq!(source.cell("s", 0, 4).unwrap(), -2.5);
    }

    #[test]
    fn loads_sheets_from_csv_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("grove.csv")).unwrap();
        writeln!(file, "label,1.5,2").unwrap();
        writeln!(file, "x,,7").unwrap();

        let source = FrameSource::from_csv_dir(dir.path(), &["grove"]).unwrap();
        assert_eq!(source.sheet_names(), vec!["grove"]);
        assert_eq!(source.row("grove", 0, 1..3).unwrap(), vec![1.5, 2.0]);
        assert_eq!(source.cell("grove", 1, 1).unwrap(), 0.0);
        assert_eq!(source.label("grove", 1, 0).unwrap(), "x");
    }
}

//! Posted tables
//!
//! A [`Table`] is the generic 2-D structure the spreadsheet reader hands to
//! the engine: ordered column headers and rows of [`Cell`]s.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt::{self, Display, Formatter};

/// Header of identifier columns
pub const UID_COLUMN: &str = "UID";

/// One cell value
///
/// `Blank` is the sentinel for empty cells. Whitespace-only text and NaN
/// numbers are also blank; `0` and `false` are not.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// Empty cell
    #[default]
    Blank,
    /// Text
    Text(String),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Number(f64),
    /// Boolean
    Bool(bool),
}

impl Cell {
    /// True for the blank sentinel and its equivalents
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Blank => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Integer(_) | Self::Bool(_) => false,
        }
    }

    /// Normalized copy: trimmed text, whole floats as integers, blanks as [`Cell::Blank`]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn clean(&self) -> Self {
        if self.is_blank() {
            return Self::Blank;
        }
        match self {
            Self::Text(s) => Self::Text(s.trim().to_string()),
            Self::Number(n)
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 =>
            {
                Self::Integer(*n as i64)
            }
            other => other.clone(),
        }
    }

    /// Display string used for entity names
    #[must_use]
    pub fn display(&self) -> String {
        match self.clean() {
            Self::Blank => String::new(),
            Self::Text(s) => s,
            Self::Integer(i) => i.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// YAML value for serialized documents; blanks become empty strings
    #[must_use]
    pub fn to_yaml(&self) -> Value {
        match self.clean() {
            Self::Blank => Value::String(String::new()),
            Self::Text(s) => Value::String(s),
            Self::Integer(i) => Value::Number(i.into()),
            Self::Number(n) => Value::Number(n.into()),
            Self::Bool(b) => Value::Bool(b),
        }
    }

    /// Cell from a YAML scalar, `None` for sequences and mappings
    #[must_use]
    pub fn from_yaml(value: &Value) -> Option<Self> {
        let cell = match value {
            Value::Null => Self::Blank,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Text(s.clone()),
            Value::Tagged(tagged) => return Self::from_yaml(&tagged.value),
            Value::Sequence(_) | Value::Mapping(_) => return None,
        };
        Some(cell.clean())
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Header with the spreadsheet duplicate suffix removed (`Name.1` -> `Name`)
#[must_use]
pub fn base_name(column: &str) -> &str {
    match column.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => column,
    }
}

/// True for identifier columns (`UID`, `UID.1`, ...)
#[must_use]
pub fn is_uid_column(column: &str) -> bool {
    base_name(column).trim() == UID_COLUMN
}

/// Where a table came from, for error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSource {
    /// Sheet name, if read from a workbook
    pub sheet: Option<String>,
    /// Cell range, e.g. `B2:F40`
    pub range: Option<String>,
    /// Spreadsheet row number of the first data row
    pub first_row_number: usize,
}

impl Default for TableSource {
    fn default() -> Self {
        // Header on row 1, data from row 2
        Self {
            sheet: None,
            range: None,
            first_row_number: 2,
        }
    }
}

impl Display for TableSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.sheet, &self.range) {
            (Some(sheet), Some(range)) => write!(f, "sheet '{sheet}' range '{range}'"),
            (Some(sheet), None) => write!(f, "sheet '{sheet}'"),
            (None, Some(range)) => write!(f, "range '{range}'"),
            (None, None) => f.write_str("the posted table"),
        }
    }
}

/// Ordered columns and rows of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    source: TableSource,
}

impl Table {
    /// Create a table, checking every row has one cell per column
    ///
    /// # Errors
    /// Returns [`TableError::RaggedRow`] on a width mismatch
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: idx,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            columns,
            rows,
            source: TableSource::default(),
        })
    }

    /// Attach source metadata
    #[must_use]
    pub fn with_source(mut self, source: TableSource) -> Self {
        self.source = source;
        self
    }

    /// Parse the YAML posting format used by the CLI and fixtures
    ///
    /// ```yaml
    /// sheet: Posting
    /// range: A1:C3
    /// columns: [Big Rock, Effort]
    /// rows:
    ///   - [Rock one, 3]
    /// ```
    ///
    /// # Errors
    /// Returns error on invalid YAML, non-scalar cells or ragged rows
    pub fn from_yaml_str(text: &str) -> Result<Self, TableError> {
        let file: TableFile =
            serde_yaml::from_str(text).map_err(|e| TableError::Format(e.to_string()))?;
        let mut rows = Vec::with_capacity(file.rows.len());
        for (r, raw) in file.rows.iter().enumerate() {
            let mut row = Vec::with_capacity(raw.len());
            for (c, value) in raw.iter().enumerate() {
                let cell = Cell::from_yaml(value).ok_or(TableError::NonScalarCell { row: r, column: c })?;
                row.push(cell);
            }
            // Short rows are padded, as spreadsheet readers drop trailing blanks
            while row.len() < file.columns.len() {
                row.push(Cell::Blank);
            }
            rows.push(row);
        }
        let source = TableSource {
            sheet: file.sheet,
            range: file.range,
            first_row_number: file.first_row.unwrap_or(2),
        };
        Ok(Self::new(file.columns, rows)?.with_source(source))
    }

    /// Write the YAML posting format read by [`Table::from_yaml_str`]
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml_string(&self) -> Result<String, TableError> {
        let file = TableFile {
            sheet: self.source.sheet.clone(),
            range: self.source.range.clone(),
            first_row: Some(self.source.first_row_number),
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().map(Cell::to_yaml).collect())
                .collect(),
        };
        serde_yaml::to_string(&file).map_err(|e| TableError::Format(e.to_string()))
    }

    /// Column headers, in order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no data rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Source metadata
    #[inline]
    #[must_use]
    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// Position of the first column with this exact header
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at (row, column index); out-of-range reads are blank
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static BLANK: Cell = Cell::Blank;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&BLANK)
    }

    /// Cell at (row, column header)
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        self.column_index(column).map(|c| self.cell(row, c))
    }

    /// Cells of one row
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Overwrite one cell; out-of-range writes are ignored
    pub fn set_cell(&mut self, row: usize, col: usize, value: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *slot = value;
        }
    }

    /// Spreadsheet row number of data row `row`
    #[inline]
    #[must_use]
    pub fn row_number(&self, row: usize) -> usize {
        self.source.first_row_number + row
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_row: Option<usize>,
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

/// Errors related to table construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum TableError {
    /// Row width differs from header width
    #[error("row {row} has {actual} cells but the table has {expected} columns")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// A cell holds a list or mapping
    #[error("cell at row {row}, column {column} is not a scalar value")]
    NonScalarCell { row: usize, column: usize },

    /// Malformed table file
    #[error("invalid table format: {0}")]
    Format(String),
}

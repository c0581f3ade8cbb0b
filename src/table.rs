use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// A single cell value in a [`Table`]
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Numeric view of the value, `None` for text and missing cells
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Missing => f.write_str("NaN"),
        }
    }
}

// JSON has no NaN/inf, those become null like missing cells.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Number(_) | Value::Missing => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Column type, inferred once when the table is built
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Every non-missing value is a number (an all-missing column counts too)
    Numeric,
    Text,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    fn new(name: String, values: Vec<Value>) -> Self {
        let kind = if values
            .iter()
            .all(|v| matches!(v, Value::Number(_) | Value::Missing))
        {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        };
        Column { name, kind, values }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    /// Non-missing numeric values in row order
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(Value::as_f64)
    }
}

/// Rectangular, column-named table
///
/// All columns have the same length and column names are unique. A table is
/// never mutated after construction; a new upload builds a new one.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Builds a table from a header row and row-major data
    ///
    /// Blank header cells are named `Unnamed: <index>` and repeated names get a
    /// `.1`, `.2`... suffix so that names stay unique. Rows shorter than the
    /// header are padded with [`Value::Missing`]; callers reject longer rows.
    ///
    /// # Arguments
    /// * `header` - Column names in order
    /// * `rows` - Data rows, each at most `header.len()` long
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let names = unique_names(header);
        let row_count = rows.len();

        let mut columns: Vec<Vec<Value>> = names
            .iter()
            .map(|_| Vec::with_capacity(row_count))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or(Value::Missing));
            }
        }

        Table {
            columns: names
                .into_iter()
                .zip(columns)
                .map(|(name, values)| Column::new(name, values))
                .collect(),
            rows: row_count,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cells of row `index` in column order
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }
}

fn unique_names(header: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len());

    for (i, raw) in header.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            raw
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

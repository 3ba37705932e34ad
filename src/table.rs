//! Tabular data for the delimited and spreadsheet exporters.

use std::fmt;

type Formatter<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// One output column: an optional header and a cell formatter.
pub struct Column<T> {
    pub header: Option<String>,
    formatter: Formatter<T>,
}

impl<T> Column<T> {
    /// A column whose formatter always yields text.
    pub fn new<F>(header: impl Into<String>, formatter: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            header: Some(header.into()),
            formatter: Box::new(move |row| Some(formatter(row))),
        }
    }

    /// A column whose formatter may yield no value; `None` is an empty cell.
    pub fn optional<F>(header: Option<String>, formatter: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            header,
            formatter: Box::new(formatter),
        }
    }

    /// Cell text for `row`.
    pub fn format(&self, row: &T) -> String {
        (self.formatter)(row).unwrap_or_default()
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column").field("header", &self.header).finish_non_exhaustive()
    }
}

/// Rows of `T` rendered through an ordered list of columns.
#[derive(Debug)]
pub struct Table<T> {
    pub name: Option<String>,
    pub include_header: bool,
    pub rows: Vec<T>,
    pub columns: Vec<Column<T>>,
}

impl<T> Table<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            name: None,
            include_header: true,
            rows,
            columns: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>, rows: Vec<T>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(rows)
        }
    }

    /// Append a column with a text formatter.
    pub fn column<F>(mut self, header: impl Into<String>, formatter: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.columns.push(Column::new(header, formatter));
        self
    }

    pub fn with_column(mut self, column: Column<T>) -> Self {
        self.columns.push(column);
        self
    }

    pub fn without_header(mut self) -> Self {
        self.include_header = false;
        self
    }

    /// Evaluate every formatter into plain cell text.
    pub fn materialize(&self) -> TableData {
        let header = self.include_header.then(|| {
            self.columns
                .iter()
                .map(|c| c.header.clone().unwrap_or_default())
                .collect()
        });
        let rows = self
            .rows
            .iter()
            .map(|row| self.columns.iter().map(|c| c.format(row)).collect())
            .collect();
        TableData {
            name: self.name.clone(),
            header,
            rows,
        }
    }
}

/// A table with every cell already formatted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableData {
    pub name: Option<String>,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    /// Header (when present) followed by the data rows.
    pub fn all_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.header.iter().chain(self.rows.iter())
    }

    pub fn column_count(&self) -> usize {
        self.all_rows().map(Vec::len).max().unwrap_or(0)
    }

    /// Longest cell text per column, in characters.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0; self.column_count()];
        for row in self.all_rows() {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        widths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        a: String,
        b: Option<String>,
    }

    fn table() -> Table<Item> {
        Table::named(
            "T",
            vec![
                Item {
                    a: "1".into(),
                    b: Some("long value".into()),
                },
                Item {
                    a: "22".into(),
                    b: None,
                },
            ],
        )
        .column("A", |x: &Item| x.a.clone())
        .with_column(Column::optional(Some("B".into()), |x: &Item| x.b.clone()))
    }

    #[test]
    fn materialize_formats_cells_in_column_order() {
        let data = table().materialize();
        assert_eq!(data.name.as_deref(), Some("T"));
        assert_eq!(data.header, Some(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(data.rows[0], vec!["1", "long value"]);
        assert_eq!(data.rows[1], vec!["22", ""]);
    }

    #[test]
    fn header_is_optional() {
        let data = table().without_header().materialize();
        assert!(data.header.is_none());
        assert_eq!(data.all_rows().count(), 2);
    }

    #[test]
    fn widths_cover_header_and_cells() {
        assert_eq!(table().materialize().column_widths(), vec![2, 10]);
    }
}

pub use crate::config::*;

/// A builder for assembling a raw table row by row.
///
/// Loaders usually produce a [`RawTable`] directly; the builder is handy when
/// records come from code.
///
/// ```
/// use ordinance_stats::builder::TableBuilder;
/// use ordinance_stats::*;
///
/// let mut builder = TableBuilder::new(&[
///     "province", "municipality", "subjectField", "councilTerm", "delegationRaw",
/// ]);
/// builder.add_text_row(&["A", "A", "Welfare", "Council Term 1", "yes"])?;
/// builder.add_text_row(&["A", "B", "Safety", "Council Term 1", "no"])?;
///
/// let table = ingest(&builder.build(), &PipelineConfig::default())?;
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.classification_diagnostics.delegated, 1);
/// # Ok::<(), OrdinanceError>(())
/// ```
pub struct TableBuilder {
    pub(crate) _columns: Vec<String>,
    pub(crate) _rows: Vec<Vec<RawValue>>,
}

impl TableBuilder {
    pub fn new(columns: &[&str]) -> TableBuilder {
        TableBuilder {
            _columns: columns.iter().map(|c| c.to_string()).collect(),
            _rows: Vec::new(),
        }
    }

    /// Adds a row of text cells. Empty strings become empty cells.
    pub fn add_text_row(&mut self, cells: &[&str]) -> OrdinanceResult<()> {
        let row = cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    RawValue::Empty
                } else {
                    RawValue::Text(s.to_string())
                }
            })
            .collect();
        self.add_row(row)
    }

    /// Adds a row of raw cells. The row must have one cell per column.
    pub fn add_row(&mut self, cells: Vec<RawValue>) -> OrdinanceResult<()> {
        if cells.len() != self._columns.len() {
            return Err(OrdinanceError::RaggedRow {
                row: self._rows.len(),
                expected: self._columns.len(),
                found: cells.len(),
            });
        }
        self._rows.push(cells);
        Ok(())
    }

    pub fn build(self) -> RawTable {
        RawTable {
            columns: self._columns,
            rows: self._rows,
        }
    }
}

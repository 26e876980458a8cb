use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::error::AsyncPoolError;
use crate::types::RowValues;

/// A result set from a database query
///
/// Rows share one column-name vector and one name-to-index map.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements) or returned (for selects)
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Create a result set whose rows will share `column_names`.
    #[must_use]
    pub fn with_columns(column_names: Arc<Vec<String>>, capacity: usize) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(capacity);
        result_set.set_column_names(column_names);
        result_set
    }

    /// Add a row to the result set
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::QueryExecution`] if no column names have been
    /// set yet; the row is not added.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) -> Result<(), AsyncPoolError> {
        let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        else {
            return Err(AsyncPoolError::QueryExecution(
                "row values added before column names were set".into(),
            ));
        };
        self.results.push(CustomDbRow::with_index(
            Arc::clone(column_names),
            Arc::clone(column_index),
            row_values,
        ));
        self.rows_affected += 1;
        Ok(())
    }

    /// Add a pre-built row; the first row added supplies the column names.
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.set_column_names(Arc::clone(&row.column_names));
        }

        self.results.push(row);
        self.rows_affected += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_lookup() {
        let mut rs = ResultSet::with_columns(Arc::new(vec!["id".into(), "name".into()]), 2);
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("alice".into())])
            .unwrap();
        rs.add_row_values(vec![RowValues::Int(2), RowValues::Text("bob".into())])
            .unwrap();

        assert_eq!(rs.rows_affected, 2);
        assert_eq!(rs.results[1].get("name"), Some(&RowValues::Text("bob".into())));
        assert_eq!(rs.results[0].get_by_index(0), Some(&RowValues::Int(1)));
        assert!(rs.results[0].get("missing").is_none());
    }

    #[test]
    fn rows_without_columns_are_an_error() {
        let mut rs = ResultSet::default();
        let err = rs.add_row_values(vec![RowValues::Null]).unwrap_err();
        assert!(matches!(err, AsyncPoolError::QueryExecution(_)));
        assert!(rs.results.is_empty());
        assert_eq!(rs.rows_affected, 0);

        rs.set_column_names(Arc::new(vec!["value".into()]));
        assert!(rs.add_row_values(vec![RowValues::Null]).is_ok());
        assert!(rs.results[0].get("value").is_some_and(RowValues::is_null));
    }
}

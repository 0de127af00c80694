//! Result sets as returned by the backends.

use std::fmt;

/// One row: an ordered sequence of nullable fields.
pub type Row = Vec<Option<String>>;

/// Rows of a query, in backend order, without any type coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet(pub Vec<Row>);

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.0.iter()
    }

    /// The first field of the first row, if both exist and are not NULL.
    pub fn first_field(&self) -> Option<&str> {
        self.0.first()?.first()?.as_deref()
    }

    /// The first field of each row, NULLs skipped.
    pub fn first_column(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|row| row.first()?.as_deref())
            .collect()
    }

    pub fn into_inner(self) -> Vec<Row> {
        self.0
    }
}

impl FromIterator<Row> for RowSet {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for RowSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No rows.");
        }
        for row in &self.0 {
            let fields: Vec<&str> = row
                .iter()
                .map(|field| field.as_deref().unwrap_or("NULL"))
                .collect();
            writeln!(f, "| {} |", fields.join(" | "))?;
        }
        Ok(())
    }
}

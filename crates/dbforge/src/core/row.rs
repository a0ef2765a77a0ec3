//! Materialized result rows and the result-set helpers that operate on them.
//!
//! Helpers never touch the database: they filter, search, project and edit a
//! [`ResultSet`] that has already been fetched.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;

use super::value::{Params, SqlValue};

/// One result row: ordered column names with their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from parallel column/value vectors.
    pub fn from_parts(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Append (or replace) a column value.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.position(&column) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Value for `column`; exact match first, then case-insensitive.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.position(column).map(|idx| &self.values[idx])
    }

    /// Value at a column position.
    pub fn get_index(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    /// Text value for `column`, or `None` when absent, NULL or not text.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Integer value for `column`.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Take the first column's value (scalar queries).
    pub fn into_first(self) -> Option<SqlValue> {
        self.values.into_iter().next()
    }

    /// Whether every `key` entry matches this row (loose equality).
    pub fn matches(&self, key: &Params) -> bool {
        key.iter().all(|(column, expected)| {
            self.get(column)
                .map(|actual| actual.loosely_equals(expected))
                .unwrap_or(false)
        })
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::with_capacity(self.columns.len());
        for (column, value) in self.iter() {
            map.insert(column.to_string(), value.to_json());
        }
        JsonValue::Object(map)
    }

    /// Map the row onto a deserializable type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Build a row from a JSON object; non-objects yield an empty row.
    pub fn from_json(value: &JsonValue) -> Row {
        let mut row = Row::new();
        if let JsonValue::Object(map) = value {
            for (k, v) in map {
                row.push(k.clone(), SqlValue::from_json(v));
            }
        }
        row
    }
}

/// An ordered, materialized sequence of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Rows matching every key/value pair.
    pub fn filter(&self, key: &Params) -> ResultSet {
        ResultSet::new(self.rows.iter().filter(|r| r.matches(key)).cloned().collect())
    }

    /// Position of the first row matching every key/value pair.
    pub fn index_of(&self, key: &Params) -> Option<usize> {
        self.rows.iter().position(|r| r.matches(key))
    }

    /// Projection onto the given columns; missing columns become NULL.
    pub fn select(&self, columns: &[&str]) -> ResultSet {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut projected = Row::new();
                for column in columns {
                    projected.push(*column, row.get(column).cloned().unwrap_or(SqlValue::Null));
                }
                projected
            })
            .collect();
        ResultSet::new(rows)
    }

    /// Replace the first row matching `key` with `row`, moving it to the end.
    ///
    /// Returns `false` (leaving the set untouched) when nothing matches.
    pub fn replace(&mut self, key: &Params, row: Row) -> bool {
        match self.index_of(key) {
            Some(idx) => {
                self.rows.remove(idx);
                self.rows.push(row);
                true
            }
            None => false,
        }
    }

    /// Remove every row matching all key/value pairs; returns how many were removed.
    pub fn remove(&mut self, key: &Params) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !r.matches(key));
        before - self.rows.len()
    }

    /// Map every row onto a deserializable type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(Row::deserialize).collect()
    }

    /// Render as a JSON array of objects.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.rows.iter().map(Row::to_json).collect())
    }
}

impl From<Vec<Row>> for ResultSet {
    fn from(rows: Vec<Row>) -> Self {
        ResultSet::new(rows)
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn people() -> ResultSet {
        ResultSet::new(vec![
            Row::new().with("id", 1).with("name", "Ana").with("role", "admin"),
            Row::new().with("id", 2).with("name", "Bo").with("role", "user"),
            Row::new().with("id", 3).with("name", "Cy").with("role", "user"),
        ])
    }

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let row = Row::new().with("COLUMN_NAME", "id");
        assert_eq!(row.get_str("column_name"), Some("id"));
        assert_eq!(row.get_str("COLUMN_NAME"), Some("id"));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_filter_and_index_of() {
        let set = people();
        let users = set.filter(&Params::new().with("role", "user"));
        assert_eq!(users.len(), 2);
        assert_eq!(set.index_of(&Params::new().with("name", "Cy")), Some(2));
        assert_eq!(set.index_of(&Params::new().with("name", "Zed")), None);
    }

    #[test]
    fn test_select_projects_columns() {
        let projected = people().select(&["name", "nickname"]);
        let first = projected.first().unwrap();
        assert_eq!(first.columns(), &["name".to_string(), "nickname".to_string()]);
        assert_eq!(first.get("nickname"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_replace_moves_row_to_end() {
        let mut set = people();
        let replaced = set.replace(
            &Params::new().with("id", 1i64),
            Row::new().with("id", 1).with("name", "Ana Maria").with("role", "admin"),
        );
        assert!(replaced);
        assert_eq!(set.len(), 3);
        assert_eq!(set.rows()[2].get_str("name"), Some("Ana Maria"));
        assert_eq!(set.rows()[0].get_str("name"), Some("Bo"));
    }

    #[test]
    fn test_remove_all_matching() {
        let mut set = people();
        assert_eq!(set.remove(&Params::new().with("role", "user")), 2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.remove(&Params::new().with("role", "user")), 0);
    }

    #[test]
    fn test_deserialize_rows() {
        #[derive(Deserialize)]
        struct Person {
            id: i64,
            name: String,
        }

        let people: Vec<Person> = people().deserialize().unwrap();
        assert_eq!(people.len(), 3);
        assert_eq!(people[1].id, 2);
        assert_eq!(people[1].name, "Bo");
    }
}

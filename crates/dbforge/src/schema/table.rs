//! Table descriptors.
//!
//! A [`Table`] owns its columns, constraints and indexes. It is either built
//! fluently (`column()`, `add_primary_key()`, `foreign_key()`, ...), parsed
//! from a schema definition, or reconstructed from introspection rows with the
//! `accept_*` methods.

use serde::{Deserialize, Serialize};

use crate::core::row::ResultSet;
use crate::core::traits::{Dialect, DEFAULT_STRING_LENGTH};
use crate::error::{DbError, Result};

use super::column::{Column, ColumnBuilder, DataType};
use super::constraint::{
    column_foreign_key_name, foreign_key_name, Constraint, ConstraintKind, ForeignKeyDef,
    ReferentialAction,
};

/// Table metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name (optionally `schema.table`).
    pub name: String,

    /// Registered connection this table belongs to.
    pub connection_name: String,

    /// Column definitions in declaration order.
    pub columns: Vec<Column>,

    /// Primary key, unique and foreign key constraints.
    pub constraints: Vec<Constraint>,

    /// Indexes, created after the table.
    pub indexes: Vec<Constraint>,
}

impl Table {
    /// Create an empty table on the `default` connection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection_name: "default".to_string(),
            ..Default::default()
        }
    }

    /// Set the connection name.
    #[must_use]
    pub fn on_connection(mut self, connection_name: impl Into<String>) -> Self {
        self.connection_name = connection_name.into();
        self
    }

    /// Append a new column and return a builder for it.
    ///
    /// Re-declaring an existing column returns a builder for that column.
    pub fn column(&mut self, name: &str) -> ColumnBuilder<'_> {
        let index = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(Column::new(name, self.name.clone()));
                self.columns.len() - 1
            }
        };
        ColumnBuilder::new(self, index)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.column_index(name).map(move |idx| &mut self.columns[idx])
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// The primary key constraint, if any.
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|c| matches!(c.kind, ConstraintKind::PrimaryKey))
    }

    /// Primary key column names in key order.
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.primary_key()
            .map(|pk| pk.columns.clone())
            .unwrap_or_default()
    }

    /// First auto-increment column.
    pub fn identity_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_auto_increment)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::ForeignKey(_)))
    }

    /// Add a column to the primary key, creating it when absent.
    pub fn add_primary_key(&mut self, column: &str) {
        if let Some(col) = self.column_mut(column) {
            col.is_primary_key = true;
            col.is_nullable = false;
        }
        let table = self.name.clone();
        match self
            .constraints
            .iter_mut()
            .find(|c| matches!(c.kind, ConstraintKind::PrimaryKey))
        {
            Some(pk) => pk.extend(column),
            None => self
                .constraints
                .push(Constraint::primary_key(&table, vec![column.to_string()])),
        }
    }

    /// Add a unique constraint over `columns`.
    pub fn add_unique(&mut self, columns: &[&str]) {
        for name in columns {
            if let Some(col) = self.column_mut(name) {
                col.is_unique = true;
            }
        }
        let constraint = Constraint::unique(&self.name, to_owned(columns));
        merge_into(&mut self.constraints, constraint);
    }

    /// Add an index over `columns`.
    pub fn add_index(&mut self, columns: &[&str]) {
        for name in columns {
            if let Some(col) = self.column_mut(name) {
                col.is_indexed = true;
            }
        }
        let index = Constraint::index(&self.name, to_owned(columns));
        merge_into(&mut self.indexes, index);
    }

    /// Map `local_column` onto `referenced_table.referenced_column`.
    ///
    /// Creates the `fk_<table>_<referenced>` constraint or extends it with a
    /// new column pair. When `referenced_column` is already mapped there, the
    /// pair is an independent key and gets its own
    /// `fk_<table>_<referenced>_<local>` constraint. Mapping the same local
    /// column onto one referenced table twice is an error.
    pub fn foreign_key(
        &mut self,
        referenced_table: &str,
        local_column: &str,
        referenced_column: &str,
    ) -> Result<()> {
        if let Some(existing) = self.constraints.iter().find(|c| {
            c.foreign_key_def().is_some_and(|fk| {
                fk.referenced_table == referenced_table
                    && fk.column_map.iter().any(|(l, _)| l == local_column)
            })
        }) {
            return Err(DbError::DuplicateForeignKey {
                table: self.name.clone(),
                column: local_column.to_string(),
                constraint: existing.name.clone(),
            });
        }

        let base = foreign_key_name(&self.name, referenced_table);
        let idx = match self.constraints.iter().position(|c| c.name == base) {
            Some(idx)
                if !self.constraints[idx].foreign_key_def().is_some_and(|fk| {
                    fk.column_map.iter().any(|(_, r)| r == referenced_column)
                }) =>
            {
                idx
            }
            found => {
                let name = match found {
                    Some(_) => column_foreign_key_name(&self.name, referenced_table, local_column),
                    None => base,
                };
                self.constraints
                    .push(Constraint::named_foreign_key(name, referenced_table));
                self.constraints.len() - 1
            }
        };

        let target = &mut self.constraints[idx];
        target.columns.push(local_column.to_string());
        if let Some(def) = target.foreign_key_def_mut() {
            def.column_map
                .push((local_column.to_string(), referenced_column.to_string()));
        }

        if let Some(col) = self.column_mut(local_column) {
            col.is_foreign_key = true;
        }
        Ok(())
    }

    /// Set actions on the foreign key that maps `local_column`.
    pub fn set_foreign_key_actions(
        &mut self,
        local_column: &str,
        on_update: Option<ReferentialAction>,
        on_delete: Option<ReferentialAction>,
    ) -> bool {
        let Some(def) = self
            .constraints
            .iter_mut()
            .filter_map(Constraint::foreign_key_def_mut)
            .find(|fk| fk.column_map.iter().any(|(l, _)| l == local_column))
        else {
            return false;
        };
        if let Some(action) = on_update {
            def.on_update = action;
        }
        if let Some(action) = on_delete {
            def.on_delete = action;
        }
        true
    }

    /// Render `CREATE TABLE` for `dialect` (columns plus PK/unique/FK constraints).
    pub fn create_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        if self.columns.is_empty() {
            return Err(DbError::SchemaDefinition(format!(
                "Table {} has no columns",
                self.name
            )));
        }

        let mut parts = Vec::with_capacity(self.columns.len() + self.constraints.len());
        for column in &self.columns {
            parts.push(dialect.column_definition(column)?);
        }
        for constraint in &self.constraints {
            parts.push(constraint.sql(dialect, &self.name)?);
        }

        Ok(format!(
            "CREATE TABLE {} (\n  {}\n)",
            dialect.quote_ident(&self.name)?,
            parts.join(",\n  ")
        ))
    }

    /// Render one `CREATE INDEX` statement per index.
    pub fn index_sql(&self, dialect: &dyn Dialect) -> Result<Vec<String>> {
        self.indexes
            .iter()
            .map(|idx| idx.sql(dialect, &self.name))
            .collect()
    }

    /// Render a dialect-independent `CREATE TABLE` with a fixed type mapping.
    ///
    /// Used by the line-oriented schema format.
    pub fn go(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(DbError::SchemaDefinition(format!(
                "Table {} has no columns",
                self.name
            )));
        }

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", c.name, generic_type(c));
                def.push_str(if c.is_nullable && !c.is_primary_key {
                    " NULL"
                } else {
                    " NOT NULL"
                });
                if c.is_auto_increment {
                    def.push_str(" AUTO_INCREMENT");
                }
                def
            })
            .collect();

        let pk = self.primary_key_columns();
        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        for unique in self
            .constraints
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Unique))
        {
            parts.push(format!("UNIQUE ({})", unique.columns.join(", ")));
        }

        Ok(format!("CREATE TABLE {} ({})", self.name, parts.join(", ")))
    }

    // ===== Introspection =====

    /// Populate columns from `get_columns` rows.
    pub fn accept_columns(&mut self, rows: &ResultSet) {
        for row in rows {
            let Some(name) = row.get_str("COLUMN_NAME") else {
                continue;
            };
            let data_type = row
                .get_str("DATA_TYPE")
                .map(DataType::from_sql_name)
                .unwrap_or(DataType::Text);

            let mut column = Column::new(name, self.name.clone());
            column.character_length = row
                .get_i64("CHARACTER_MAXIMUM_LENGTH")
                .and_then(|len| u32::try_from(len).ok());
            column.data_type = Some(data_type);
            column.is_nullable = row
                .get_str("IS_NULLABLE")
                .is_some_and(|v| v.eq_ignore_ascii_case("YES"));
            column.is_auto_increment = row.get_i64("IS_IDENTITY").unwrap_or(0) == 1;

            match self.column_index(name) {
                Some(idx) => self.columns[idx] = column,
                None => self.columns.push(column),
            }
        }
    }

    /// Populate primary key and unique constraints from constraint-column rows.
    ///
    /// Foreign keys are read by [`accept_foreign_keys`](Self::accept_foreign_keys);
    /// other constraint types are ignored.
    pub fn accept_constraints(&mut self, rows: &ResultSet) {
        for row in rows {
            let (Some(name), Some(kind), Some(column)) = (
                row.get_str("CONSTRAINT_NAME"),
                row.get_str("CONSTRAINT_TYPE"),
                row.get_str("COLUMN_NAME"),
            ) else {
                continue;
            };

            let kind = match kind.to_uppercase().as_str() {
                "PRIMARY KEY" => ConstraintKind::PrimaryKey,
                "UNIQUE" => ConstraintKind::Unique,
                _ => continue,
            };

            if let Some(col) = self.column_mut(column) {
                match kind {
                    ConstraintKind::PrimaryKey => col.is_primary_key = true,
                    _ => col.is_unique = true,
                }
            }

            match self.constraints.iter_mut().find(|c| c.name == name) {
                Some(existing) => existing.extend(column),
                None => self.constraints.push(Constraint {
                    name: name.to_string(),
                    columns: vec![column.to_string()],
                    kind,
                }),
            }
        }
    }

    /// Populate foreign keys from `get_foreign_keys` rows.
    pub fn accept_foreign_keys(&mut self, rows: &ResultSet) {
        for row in rows {
            let (Some(name), Some(column), Some(ref_table), Some(ref_column)) = (
                row.get_str("CONSTRAINT_NAME"),
                row.get_str("COLUMN_NAME"),
                row.get_str("REFERENCED_TABLE_NAME"),
                row.get_str("REFERENCED_COLUMN_NAME"),
            ) else {
                continue;
            };
            let on_update = ReferentialAction::parse(row.get_str("UPDATE_RULE").unwrap_or(""));
            let on_delete = ReferentialAction::parse(row.get_str("DELETE_RULE").unwrap_or(""));

            if let Some(col) = self.column_mut(column) {
                col.is_foreign_key = true;
            }

            match self.constraints.iter_mut().find(|c| c.name == name) {
                Some(existing) => {
                    if let Some(def) = existing.foreign_key_def_mut() {
                        if !def.column_map.iter().any(|(l, _)| l == column) {
                            def.column_map
                                .push((column.to_string(), ref_column.to_string()));
                        }
                    }
                    existing.extend(column);
                }
                None => self.constraints.push(Constraint {
                    name: name.to_string(),
                    columns: vec![column.to_string()],
                    kind: ConstraintKind::ForeignKey(ForeignKeyDef {
                        referenced_table: ref_table.to_string(),
                        column_map: vec![(column.to_string(), ref_column.to_string())],
                        on_update,
                        on_delete,
                    }),
                }),
            }
        }
    }
}

fn to_owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Insert `constraint` or extend the same-named one with its columns.
fn merge_into(list: &mut Vec<Constraint>, constraint: Constraint) {
    match list.iter_mut().find(|c| c.name == constraint.name) {
        Some(existing) => {
            for column in &constraint.columns {
                existing.extend(column);
            }
        }
        None => list.push(constraint),
    }
}

/// Fixed type mapping used by [`Table::go`].
fn generic_type(column: &Column) -> String {
    match column.data_type_or_default() {
        DataType::String => format!(
            "VARCHAR({})",
            column.character_length.unwrap_or(DEFAULT_STRING_LENGTH)
        ),
        DataType::Text => "TEXT".to_string(),
        DataType::SmallInt => "SMALLINT".to_string(),
        DataType::Int => "INT".to_string(),
        DataType::BigInt => "BIGINT".to_string(),
        DataType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        DataType::Float => "FLOAT".to_string(),
        DataType::Bool => "BOOLEAN".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Timestamp => "TIMESTAMP".to_string(),
        DataType::Uuid => "CHAR(36)".to_string(),
        DataType::Point => "POINT".to_string(),
        DataType::Other(name) => name.to_uppercase(),
    }
}

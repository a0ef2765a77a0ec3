//! Column descriptors and the fluent column builder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::constraint::ReferentialAction;
use super::table::Table;

/// Logical column type.
///
/// Dialects map these onto concrete DDL types; introspected types that have
/// no logical counterpart are kept verbatim in [`DataType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Text,
    SmallInt,
    Int,
    BigInt,
    Decimal { precision: u32, scale: u32 },
    Float,
    Bool,
    Date,
    Timestamp,
    Uuid,
    Point,
    Other(String),
}

impl DataType {
    /// Whether the type belongs to the integer family.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::SmallInt | DataType::Int | DataType::BigInt)
    }

    /// Map an introspected `DATA_TYPE` onto a logical type.
    pub fn from_sql_name(name: &str) -> DataType {
        match name.trim().to_lowercase().as_str() {
            "varchar" | "nvarchar" | "char" | "nchar" | "character varying" | "character"
            | "bpchar" => DataType::String,
            "text" | "ntext" | "mediumtext" | "longtext" | "tinytext" => DataType::Text,
            "smallint" | "tinyint" | "int2" => DataType::SmallInt,
            "int" | "integer" | "mediumint" | "int4" => DataType::Int,
            "bigint" | "int8" => DataType::BigInt,
            "decimal" | "numeric" | "money" => DataType::Decimal {
                precision: 18,
                scale: 2,
            },
            "float" | "double" | "real" | "double precision" | "float4" | "float8" => {
                DataType::Float
            }
            "bit" | "bool" | "boolean" => DataType::Bool,
            "date" => DataType::Date,
            "datetime" | "datetime2" | "smalldatetime" | "timestamp"
            | "timestamp without time zone" | "timestamp with time zone" | "timestamptz" => {
                DataType::Timestamp
            }
            "uuid" | "uniqueidentifier" => DataType::Uuid,
            "point" | "geography" | "geometry" => DataType::Point,
            other => DataType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Text => write!(f, "text"),
            DataType::SmallInt => write!(f, "smallint"),
            DataType::Int => write!(f, "int"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
            DataType::Float => write!(f, "float"),
            DataType::Bool => write!(f, "bool"),
            DataType::Date => write!(f, "date"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::Uuid => write!(f, "uuid"),
            DataType::Point => write!(f, "point"),
            DataType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Name of the table that owns this column.
    pub owner_table: String,

    /// Logical type; `None` until a type method has been called.
    pub data_type: Option<DataType>,

    /// Maximum character length for string types.
    pub character_length: Option<u32>,

    pub is_nullable: bool,
    pub is_auto_increment: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub is_unique: bool,
    pub is_indexed: bool,
}

impl Column {
    /// New NOT NULL column without a type.
    pub fn new(name: impl Into<String>, owner_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_table: owner_table.into(),
            data_type: None,
            character_length: None,
            is_nullable: false,
            is_auto_increment: false,
            is_primary_key: false,
            is_foreign_key: false,
            is_unique: false,
            is_indexed: false,
        }
    }

    /// The column's type, or `Text` when none was set.
    pub fn data_type_or_default(&self) -> DataType {
        self.data_type.clone().unwrap_or(DataType::Text)
    }

    fn set_type(&mut self, data_type: DataType, length: Option<u32>) {
        self.data_type = Some(data_type);
        self.character_length = length;
    }
}

/// Fluent builder over one column of a [`Table`].
///
/// Holds the owning table mutably so constraint methods can register their
/// constraint objects on it.
pub struct ColumnBuilder<'t> {
    table: &'t mut Table,
    index: usize,
}

impl<'t> ColumnBuilder<'t> {
    pub(crate) fn new(table: &'t mut Table, index: usize) -> Self {
        Self { table, index }
    }

    fn column(&mut self) -> &mut Column {
        &mut self.table.columns[self.index]
    }

    fn name(&self) -> String {
        self.table.columns[self.index].name.clone()
    }

    /// Read the column being built.
    pub fn get(&self) -> &Column {
        &self.table.columns[self.index]
    }

    // ===== Type methods =====

    /// Variable-length string; `None` uses the dialect default length.
    pub fn string(mut self, length: Option<u32>) -> Self {
        self.column().set_type(DataType::String, length);
        self
    }

    pub fn text(mut self) -> Self {
        self.column().set_type(DataType::Text, None);
        self
    }

    pub fn smallint(mut self) -> Self {
        self.column().set_type(DataType::SmallInt, None);
        self
    }

    pub fn int(mut self) -> Self {
        self.column().set_type(DataType::Int, None);
        self
    }

    pub fn bigint(mut self) -> Self {
        self.column().set_type(DataType::BigInt, None);
        self
    }

    /// DECIMAL(18,2).
    pub fn decimal(self) -> Self {
        self.decimal_with(18, 2)
    }

    pub fn decimal_with(mut self, precision: u32, scale: u32) -> Self {
        self.column()
            .set_type(DataType::Decimal { precision, scale }, None);
        self
    }

    pub fn float(mut self) -> Self {
        self.column().set_type(DataType::Float, None);
        self
    }

    pub fn bool(mut self) -> Self {
        self.column().set_type(DataType::Bool, None);
        self
    }

    pub fn date(mut self) -> Self {
        self.column().set_type(DataType::Date, None);
        self
    }

    pub fn timestamp(mut self) -> Self {
        self.column().set_type(DataType::Timestamp, None);
        self
    }

    pub fn uuid(mut self) -> Self {
        self.column().set_type(DataType::Uuid, None);
        self
    }

    pub fn point(mut self) -> Self {
        self.column().set_type(DataType::Point, None);
        self
    }

    /// Auto-increment INT.
    pub fn serial(mut self) -> Self {
        let column = self.column();
        column.set_type(DataType::Int, None);
        column.is_auto_increment = true;
        self
    }

    /// Auto-increment BIGINT.
    pub fn bigserial(mut self) -> Self {
        let column = self.column();
        column.set_type(DataType::BigInt, None);
        column.is_auto_increment = true;
        self
    }

    /// Alias of [`serial`](Self::serial).
    pub fn identity(self) -> Self {
        self.serial()
    }

    /// Mark as auto-increment, keeping an integer type or switching to INT.
    pub fn auto_increment(mut self) -> Self {
        let column = self.column();
        if !column.data_type.as_ref().is_some_and(DataType::is_integer) {
            column.set_type(DataType::Int, None);
        }
        column.is_auto_increment = true;
        self
    }

    // ===== Constraint methods =====

    /// Add this column to the table's primary key.
    pub fn primary_key(mut self) -> Self {
        let name = self.name();
        self.column().is_nullable = false;
        self.table.add_primary_key(&name);
        self
    }

    /// Single-column unique constraint.
    pub fn unique(self) -> Self {
        let name = self.name();
        self.table.add_unique(&[name.as_str()]);
        self
    }

    /// Single-column index.
    pub fn index(self) -> Self {
        let name = self.name();
        self.table.add_index(&[name.as_str()]);
        self
    }

    /// Allow NULL.
    pub fn null(mut self) -> Self {
        self.column().is_nullable = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.column().is_nullable = false;
        self
    }

    /// Reference `referenced_table.referenced_column`.
    pub fn references(self, referenced_table: &str, referenced_column: &str) -> Result<Self> {
        let name = self.name();
        self.table
            .foreign_key(referenced_table, &name, referenced_column)?;
        Ok(self)
    }

    /// ON DELETE action for this column's foreign key.
    pub fn on_delete(self, action: ReferentialAction) -> Self {
        let name = self.name();
        self.table.set_foreign_key_actions(&name, None, Some(action));
        self
    }

    /// ON UPDATE action for this column's foreign key.
    pub fn on_update(self, action: ReferentialAction) -> Self {
        let name = self.name();
        self.table.set_foreign_key_actions(&name, Some(action), None);
        self
    }
}

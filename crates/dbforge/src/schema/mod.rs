//! Schema descriptors and the schema definition/migration engine.
//!
//! - [`column`], [`constraint`], [`table`]: table metadata and fluent builders
//! - [`definition`]: declarative YAML schema parser and migrator
//! - [`legacy`]: line-oriented schema parser

pub mod column;
pub mod constraint;
pub mod definition;
pub mod legacy;
pub mod table;

pub use column::{Column, ColumnBuilder, DataType};
pub use constraint::{Constraint, ConstraintKind, ForeignKeyDef, ReferentialAction};
pub use definition::{MigrationReport, Migrator, SchemaDefinition};
pub use legacy::LegacySchema;
pub use table::Table;

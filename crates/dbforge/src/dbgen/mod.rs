//! CRUD stored-procedure generation.
//!
//! - [`MysqlProcedures`]: `CREATE PROCEDURE ... BEGIN ... END` bodies
//! - [`PostgresProcedures`]: `CREATE OR REPLACE FUNCTION ... LANGUAGE sql`
//!
//! Generators are pure text renderers over a [`Table`] descriptor. [`DbGen`]
//! pairs one with a [`Db`] to introspect tables and install the procedures.
//!
//! Every procedure is named `<table>_<action>` and takes one `p_<column>`
//! parameter per column it reads or writes.

mod mysql;
mod postgres;

use tracing::{info, warn};

pub use mysql::MysqlProcedures;
pub use postgres::PostgresProcedures;

use crate::core::traits::Dialect;
use crate::drivers::Driver;
use crate::error::{DbError, Result};
use crate::query::Db;
use crate::schema::{Column, Table};

/// The five generated CRUD procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureKind {
    SelectAll,
    SelectByKey,
    Insert,
    Update,
    Delete,
}

impl ProcedureKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ProcedureKind::SelectAll => "select_all",
            ProcedureKind::SelectByKey => "select_by_key",
            ProcedureKind::Insert => "insert",
            ProcedureKind::Update => "update",
            ProcedureKind::Delete => "delete",
        }
    }

    fn needs_key(&self) -> bool {
        matches!(
            self,
            ProcedureKind::SelectByKey | ProcedureKind::Update | ProcedureKind::Delete
        )
    }
}

/// One rendered procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    pub table: String,
    pub name: String,
    pub kind: ProcedureKind,
    pub sql: String,
}

/// Per-dialect procedure text generator.
pub trait ProcedureGenerator: Send + Sync {
    /// Dialect used for quoting and parameter types.
    fn dialect(&self) -> &dyn Dialect;

    /// Parameter type for `column`.
    fn parameter_type(&self, column: &Column) -> String {
        self.dialect().column_type(column)
    }

    /// Comma-separated parameter declarations for `columns`.
    fn column_names_parameters(&self, columns: &[&Column]) -> String;

    fn select_all(&self, table: &Table) -> Result<String>;
    fn select_by_key(&self, table: &Table) -> Result<String>;
    fn insert(&self, table: &Table) -> Result<String>;
    fn update(&self, table: &Table) -> Result<String>;
    fn delete(&self, table: &Table) -> Result<String>;

    /// Statement removing an existing procedure before it is recreated.
    fn drop_statement(&self, table: &Table, kind: ProcedureKind) -> Result<String>;

    /// `<table>_<action>` with any schema qualifier folded in.
    fn procedure_name(&self, table: &Table, kind: ProcedureKind) -> String {
        format!("{}_{}", table.name.replace('.', "_"), kind.suffix())
    }

    fn parameter_name(&self, column: &str) -> String {
        format!("p_{}", column)
    }

    /// Quoted, comma-separated column list.
    fn column_names(&self, columns: &[&Column]) -> Result<String> {
        Ok(columns
            .iter()
            .map(|c| self.dialect().quote_ident(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", "))
    }

    /// Parameter references in column order, for a VALUES list.
    fn parameter_list(&self, columns: &[&Column]) -> String {
        columns
            .iter()
            .map(|c| self.parameter_name(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `col = p_col [AND ...]` over the primary key.
    fn primary_key_where(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        self.assignments(&keys, " AND ")
    }

    /// `col = p_col` pairs joined by `separator`.
    fn assignments(&self, columns: &[&Column], separator: &str) -> Result<String> {
        Ok(columns
            .iter()
            .map(|c| {
                Ok(format!(
                    "{} = {}",
                    self.dialect().quote_ident(&c.name)?,
                    self.parameter_name(&c.name)
                ))
            })
            .collect::<Result<Vec<_>>>()?
            .join(separator))
    }

    fn render(&self, table: &Table, kind: ProcedureKind) -> Result<String> {
        match kind {
            ProcedureKind::SelectAll => self.select_all(table),
            ProcedureKind::SelectByKey => self.select_by_key(table),
            ProcedureKind::Insert => self.insert(table),
            ProcedureKind::Update => self.update(table),
            ProcedureKind::Delete => self.delete(table),
        }
    }

    /// Every procedure that applies to `table`.
    ///
    /// Tables without a primary key only get `select_all` and `insert`;
    /// tables whose columns are all keys get no `update`.
    fn procedures(&self, table: &Table) -> Result<Vec<Procedure>> {
        let keyed = !table.primary_key_columns().is_empty();
        let updatable = !updatable_columns(table).is_empty();
        if !keyed {
            warn!("{} has no primary key, only select_all and insert generated", table.name);
        }

        let kinds = [
            ProcedureKind::SelectAll,
            ProcedureKind::SelectByKey,
            ProcedureKind::Insert,
            ProcedureKind::Update,
            ProcedureKind::Delete,
        ];
        kinds
            .into_iter()
            .filter(|kind| keyed || !kind.needs_key())
            .filter(|kind| updatable || *kind != ProcedureKind::Update)
            .map(|kind| {
                Ok(Procedure {
                    table: table.name.clone(),
                    name: self.procedure_name(table, kind),
                    kind,
                    sql: self.render(table, kind)?,
                })
            })
            .collect()
    }
}

/// Primary key columns in key order.
pub(crate) fn key_columns(table: &Table) -> Result<Vec<&Column>> {
    let keys: Vec<&Column> = table
        .primary_key_columns()
        .iter()
        .filter_map(|k| table.get_column(k))
        .collect();
    if keys.is_empty() {
        return Err(DbError::SchemaDefinition(format!(
            "{} has no primary key",
            table.name
        )));
    }
    Ok(keys)
}

/// Columns an INSERT supplies: all but the auto-increment column.
pub(crate) fn insertable_columns(table: &Table) -> Vec<&Column> {
    table.columns.iter().filter(|c| !c.is_auto_increment).collect()
}

/// Columns an UPDATE sets: neither key nor auto-increment.
pub(crate) fn updatable_columns(table: &Table) -> Vec<&Column> {
    table
        .columns
        .iter()
        .filter(|c| !c.is_primary_key && !c.is_auto_increment)
        .collect()
}

pub(crate) fn all_columns(table: &Table) -> Vec<&Column> {
    table.columns.iter().collect()
}

/// Generates CRUD procedures from live table metadata.
pub struct DbGen<'a> {
    db: &'a mut Db,
    generator: Box<dyn ProcedureGenerator>,
}

impl<'a> DbGen<'a> {
    /// Pick the generator for `db`'s driver.
    ///
    /// # Errors
    ///
    /// `UnsupportedDriver` for SQL Server and dblib connections.
    pub fn new(db: &'a mut Db) -> Result<Self> {
        let generator: Box<dyn ProcedureGenerator> = match db.driver() {
            Driver::Mysql => Box::new(MysqlProcedures::new()),
            Driver::Postgres => Box::new(PostgresProcedures::new()),
            other => {
                return Err(DbError::UnsupportedDriver(format!(
                    "{} (procedure generation)",
                    other
                )))
            }
        };
        Ok(Self { db, generator })
    }

    pub fn generator(&self) -> &dyn ProcedureGenerator {
        self.generator.as_ref()
    }

    /// Render procedures for `tables`, or for every table when empty.
    pub async fn render(&mut self, tables: &[String]) -> Result<Vec<Procedure>> {
        let names = if tables.is_empty() {
            self.db.get_tables().await?
        } else {
            tables.to_vec()
        };

        let mut procedures = Vec::new();
        for name in &names {
            let table = self.db.describe_table(name).await?;
            procedures.extend(self.generator.procedures(&table)?);
        }
        Ok(procedures)
    }

    /// Render and install procedures, replacing existing ones.
    pub async fn generate_procedures(&mut self, tables: &[String]) -> Result<Vec<Procedure>> {
        let names = if tables.is_empty() {
            self.db.get_tables().await?
        } else {
            tables.to_vec()
        };

        let mut installed = Vec::new();
        for name in &names {
            let table = self.db.describe_table(name).await?;
            for procedure in self.generator.procedures(&table)? {
                let drop = self.generator.drop_statement(&table, procedure.kind)?;
                self.db.batch(&drop).await?;
                self.db.batch(&procedure.sql).await?;
                info!("Installed procedure {}", procedure.name);
                installed.push(procedure);
            }
        }
        Ok(installed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::tests::db;

    /// `users(id serial pk, name string(100), email string(255) null)`
    pub(crate) fn users() -> Table {
        let mut table = Table::new("users");
        table.column("id").serial().primary_key();
        table.column("name").string(Some(100));
        table.column("email").string(Some(255)).null();
        table
    }

    #[test]
    fn test_new_rejects_sql_server() {
        let mut mssql = db(Driver::SqlServer);
        assert!(matches!(DbGen::new(&mut mssql), Err(DbError::UnsupportedDriver(_))));
        let mut dblib = db(Driver::Dblib);
        assert!(matches!(DbGen::new(&mut dblib), Err(DbError::UnsupportedDriver(_))));
    }

    #[test]
    fn test_new_picks_generator_by_driver() {
        let mut mysql = db(Driver::Mysql);
        let gen = DbGen::new(&mut mysql).unwrap();
        assert_eq!(gen.generator().dialect().name(), "mysql");

        let mut pg = db(Driver::Postgres);
        let gen = DbGen::new(&mut pg).unwrap();
        assert_eq!(gen.generator().dialect().name(), "postgres");
    }

    #[test]
    fn test_column_partitions() {
        let table = users();
        let names = |cols: Vec<&Column>| cols.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(key_columns(&table).unwrap()), vec!["id"]);
        assert_eq!(names(insertable_columns(&table)), vec!["name", "email"]);
        assert_eq!(names(updatable_columns(&table)), vec!["name", "email"]);
        assert_eq!(all_columns(&table).len(), 3);
    }

    #[test]
    fn test_procedures_skip_keyed_actions_without_pk() {
        let mut log = Table::new("event_log");
        log.column("message").text();
        let procedures = MysqlProcedures::new().procedures(&log).unwrap();
        let kinds: Vec<ProcedureKind> = procedures.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProcedureKind::SelectAll, ProcedureKind::Insert]);
    }

    #[test]
    fn test_procedures_skip_update_when_all_columns_are_keys() {
        let mut link = Table::new("user_roles");
        link.column("user_id").int().primary_key();
        link.column("role_id").int().primary_key();
        let procedures = PostgresProcedures::new().procedures(&link).unwrap();
        assert!(procedures.iter().all(|p| p.kind != ProcedureKind::Update));
        assert_eq!(procedures.len(), 4);
    }

    #[test]
    fn test_procedure_names() {
        let gen = MysqlProcedures::new();
        let names: Vec<String> = gen
            .procedures(&users())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "users_select_all",
                "users_select_by_key",
                "users_insert",
                "users_update",
                "users_delete"
            ]
        );

        let qualified = Table::new("sales.orders");
        assert_eq!(
            gen.procedure_name(&qualified, ProcedureKind::Delete),
            "sales_orders_delete"
        );
    }

    #[test]
    fn test_primary_key_where_composite() {
        let mut link = Table::new("user_roles");
        link.column("user_id").int().primary_key();
        link.column("role_id").int().primary_key();
        let gen = MysqlProcedures::new();
        assert_eq!(
            gen.primary_key_where(&link).unwrap(),
            "`user_id` = p_user_id AND `role_id` = p_role_id"
        );
        assert!(gen.primary_key_where(&Table::new("t")).is_err());
    }
}

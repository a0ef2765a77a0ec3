//! Declarative schema definitions and the additive migrator.
//!
//! A definition is a YAML mapping of table name to a list of column
//! definitions, in declaration order:
//!
//! ```yaml
//! users:
//!   - id serial pk
//!   - name string(100)
//!   - email string(255) unique
//!   - "~index name email"
//! posts:
//!   - id serial pk
//!   - users_id int fk
//!   - parent_id int null fk|_self
//! ~data:
//!   users:
//!     - "'Ana', 'ana@example.com'"
//! ```
//!
//! Each column definition is `name type [constraint...]`. A bare `fk`
//! resolves against the tables declared before it; `fk|<table>` and
//! `fk|_self` name the referenced table explicitly.
//!
//! Migration is additive at table granularity: existing tables are skipped,
//! never altered.

use std::path::Path;

use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, info, warn};

use crate::core::traits::Dialect;
use crate::core::value::{Params, SqlValue};
use crate::error::{DbError, Result};
use crate::query::Db;

use super::constraint::ReferentialAction;
use super::legacy::{LegacySchema, LegacyStatement};
use super::table::Table;

/// Directive key holding seed rows.
const DATA_DIRECTIVE: &str = "~data";
const SELF_REFERENCE: &str = "_self";

/// One seed row mapped onto its table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub table: String,
    pub values: Params,
}

/// A parsed schema definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDefinition {
    tables: Vec<Table>,
    seeds: Vec<Seed>,
}

impl SchemaDefinition {
    /// Load a definition from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a YAML definition.
    pub fn parse(yaml: &str) -> Result<Self> {
        let root: YamlValue = serde_yaml::from_str(yaml)?;
        let YamlValue::Mapping(root) = root else {
            return Err(DbError::SchemaDefinition(
                "top level must be a mapping of table names".into(),
            ));
        };

        let mut definition = SchemaDefinition::default();
        let mut data: Option<&Mapping> = None;

        for (key, value) in &root {
            let key = yaml_str(key, "table name")?;
            if key == DATA_DIRECTIVE {
                data = Some(value.as_mapping().ok_or_else(|| {
                    DbError::SchemaDefinition("~data must map table names to rows".into())
                })?);
            } else if key.starts_with('~') {
                return Err(DbError::SchemaDefinition(format!(
                    "unknown directive {}",
                    key
                )));
            } else {
                let table = definition.parse_table(key, value)?;
                definition.tables.push(table);
            }
        }

        if let Some(data) = data {
            definition.parse_data(data)?;
        }

        debug!(
            "Parsed schema definition: {} table(s), {} seed row(s)",
            definition.tables.len(),
            definition.seeds.len()
        );
        Ok(definition)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }

    /// Seed rows for `table`, in file order.
    pub fn seeds_for<'s>(&'s self, table: &'s str) -> impl Iterator<Item = &'s Seed> + 's {
        self.seeds
            .iter()
            .filter(move |s| s.table.eq_ignore_ascii_case(table))
    }

    fn parse_table(&self, name: &str, value: &YamlValue) -> Result<Table> {
        let entries = value.as_sequence().ok_or_else(|| {
            DbError::SchemaDefinition(format!("table {} must be a list of columns", name))
        })?;

        let mut table = Table::new(name);
        for entry in entries {
            let line = yaml_str(entry, "column definition")?.trim();
            if let Some(rest) = line.strip_prefix('~') {
                apply_table_directive(&mut table, rest)?;
            } else {
                self.apply_column(&mut table, line)?;
            }
        }
        Ok(table)
    }

    fn apply_column(&self, table: &mut Table, line: &str) -> Result<()> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Err(DbError::SchemaDefinition(format!(
                "empty column definition in table {}",
                table.name
            )));
        };
        table.column(name);

        let mut typed = false;
        for token in tokens {
            if apply_type_token(table, name, token)? {
                if typed {
                    return Err(DbError::SchemaDefinition(format!(
                        "{}.{} has more than one type",
                        table.name, name
                    )));
                }
                typed = true;
            } else if !apply_constraint_token(table, name, token)? {
                self.apply_reference_token(table, name, token)?;
            }
        }

        if !typed {
            return Err(DbError::SchemaDefinition(format!(
                "{}.{} has no type",
                table.name, name
            )));
        }
        Ok(())
    }

    /// `fk`, `fk|<table>`, `fk|_self` and `cascade`.
    fn apply_reference_token(&self, table: &mut Table, column: &str, token: &str) -> Result<()> {
        let lower = token.to_lowercase();
        if lower == "cascade" {
            if !table.set_foreign_key_actions(column, None, Some(ReferentialAction::Cascade)) {
                return Err(DbError::SchemaDefinition(format!(
                    "{}.{}: cascade must follow a foreign key",
                    table.name, column
                )));
            }
            return Ok(());
        }

        let (referenced, key) = if lower == "fk" {
            self.resolve_implicit_reference(table, column)?
        } else if let Some(target) = token.strip_prefix("fk|").or_else(|| token.strip_prefix("FK|")) {
            resolve_explicit_reference(self, table, column, target)?
        } else {
            return Err(DbError::SchemaDefinition(format!(
                "{}.{}: unknown token '{}'",
                table.name, column, token
            )));
        };

        table.column(column).references(&referenced, &key)?;
        Ok(())
    }

    /// Find the one earlier table whose primary key matches `column`, either
    /// by name or as `<table>_<key>`.
    fn resolve_implicit_reference(&self, table: &Table, column: &str) -> Result<(String, String)> {
        let candidates: Vec<&Table> = self
            .tables
            .iter()
            .filter(|t| {
                t.primary_key_columns().iter().any(|pk| {
                    column.eq_ignore_ascii_case(pk)
                        || column.eq_ignore_ascii_case(&format!("{}_{}", t.name, pk))
                })
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(DbError::NoSuchReferencedTable {
                table: table.name.clone(),
                column: column.to_string(),
                reason: "no earlier table has a matching primary key".into(),
            }),
            [only] => single_key(table, column, only),
            many => Err(DbError::AmbiguousForeignKey {
                table: table.name.clone(),
                column: column.to_string(),
                candidates: many.iter().map(|t| t.name.clone()).collect(),
            }),
        }
    }

    fn parse_data(&mut self, data: &Mapping) -> Result<()> {
        for (key, rows) in data {
            let name = yaml_str(key, "seed table name")?;
            let table = self.table(name).cloned().ok_or_else(|| {
                DbError::SchemaDefinition(format!("~data refers to undeclared table {}", name))
            })?;
            let rows = rows.as_sequence().ok_or_else(|| {
                DbError::SchemaDefinition(format!("~data.{} must be a list of rows", name))
            })?;
            for row in rows {
                let line = yaml_str(row, "seed row")?;
                let values = parse_seed_values(line)?;
                self.seeds.push(Seed {
                    table: table.name.clone(),
                    values: map_seed_row(&table, values)?,
                });
            }
        }
        Ok(())
    }
}

fn yaml_str<'v>(value: &'v YamlValue, what: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| DbError::SchemaDefinition(format!("{} must be a string, got {:?}", what, value)))
}

fn resolve_explicit_reference(
    definition: &SchemaDefinition,
    table: &Table,
    column: &str,
    target: &str,
) -> Result<(String, String)> {
    let referenced = if target == SELF_REFERENCE {
        Some(table)
    } else {
        definition.table(target)
    };
    match referenced {
        Some(referenced) => single_key(table, column, referenced),
        None => Err(DbError::NoSuchReferencedTable {
            table: table.name.clone(),
            column: column.to_string(),
            reason: format!("table {} is not declared", target),
        }),
    }
}

/// The referenced table's only primary key column.
fn single_key(table: &Table, column: &str, referenced: &Table) -> Result<(String, String)> {
    let keys = referenced.primary_key_columns();
    match keys.as_slice() {
        [key] => Ok((referenced.name.clone(), key.clone())),
        [] => Err(DbError::NoSuchReferencedTable {
            table: table.name.clone(),
            column: column.to_string(),
            reason: format!("table {} has no primary key", referenced.name),
        }),
        _ => Err(DbError::CompositeKeyUnsupported(referenced.name.clone())),
    }
}

/// `~index a b` / `~unique a b`.
fn apply_table_directive(table: &mut Table, directive: &str) -> Result<()> {
    let mut tokens = directive.split_whitespace();
    let kind = tokens.next().unwrap_or_default().to_lowercase();
    let columns: Vec<&str> = tokens.collect();
    if columns.is_empty() {
        return Err(DbError::SchemaDefinition(format!(
            "~{} on table {} needs at least one column",
            kind, table.name
        )));
    }
    if let Some(missing) = columns.iter().find(|c| table.get_column(c).is_none()) {
        return Err(DbError::SchemaDefinition(format!(
            "~{} on table {} names unknown column {}",
            kind, table.name, missing
        )));
    }
    match kind.as_str() {
        "index" => table.add_index(&columns),
        "unique" => table.add_unique(&columns),
        other => {
            return Err(DbError::SchemaDefinition(format!(
                "unknown table directive ~{} on {}",
                other, table.name
            )))
        }
    }
    Ok(())
}

/// Apply a type token; returns `false` when `token` is not a type.
pub(crate) fn apply_type_token(table: &mut Table, column: &str, token: &str) -> Result<bool> {
    let table_name = table.name.clone();
    let lower = token.to_lowercase();
    let (base, args) = match lower.split_once('(') {
        Some((base, rest)) => {
            let args = rest.strip_suffix(')').ok_or_else(|| {
                DbError::SchemaDefinition(format!("{}.{}: malformed type '{}'", table_name, column, token))
            })?;
            (base, Some(args))
        }
        None => (lower.as_str(), None),
    };
    let numbers = |args: &str| -> Result<Vec<u32>> {
        args.split(',')
            .map(|n| {
                n.trim().parse::<u32>().map_err(|_| {
                    DbError::SchemaDefinition(format!(
                        "{}.{}: bad type argument in '{}'",
                        table_name, column, token
                    ))
                })
            })
            .collect()
    };

    let builder = table.column(column);
    match (base, args) {
        ("string" | "varchar", None) => {
            builder.string(None);
        }
        ("string" | "varchar", Some(args)) => {
            let length = numbers(args)?;
            builder.string(length.first().copied());
        }
        ("text", None) => {
            builder.text();
        }
        ("int" | "integer", None) => {
            builder.int();
        }
        ("bigint", None) => {
            builder.bigint();
        }
        ("smallint", None) => {
            builder.smallint();
        }
        ("decimal", None) => {
            builder.decimal();
        }
        ("decimal", Some(args)) => match numbers(args)?.as_slice() {
            [precision, scale] => {
                builder.decimal_with(*precision, *scale);
            }
            [precision] => {
                builder.decimal_with(*precision, 0);
            }
            _ => {
                return Err(DbError::SchemaDefinition(format!(
                    "{}.{}: decimal takes (precision, scale)",
                    table_name, column
                )))
            }
        },
        ("float", None) => {
            builder.float();
        }
        ("bool" | "boolean", None) => {
            builder.bool();
        }
        ("date", None) => {
            builder.date();
        }
        ("timestamp" | "datetime", None) => {
            builder.timestamp();
        }
        ("uuid", None) => {
            builder.uuid();
        }
        ("point", None) => {
            builder.point();
        }
        ("serial", None) => {
            builder.serial();
        }
        ("bigserial", None) => {
            builder.bigserial();
        }
        ("identity", None) => {
            builder.identity();
        }
        ("autoincrement", None) => {
            builder.auto_increment();
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Apply `null`, `pk`, `unique` or `index`; returns `false` otherwise.
pub(crate) fn apply_constraint_token(table: &mut Table, column: &str, token: &str) -> Result<bool> {
    let builder = table.column(column);
    match token.to_lowercase().as_str() {
        "null" => {
            builder.null();
        }
        "pk" => {
            builder.primary_key();
        }
        "unique" => {
            builder.unique();
        }
        "index" => {
            builder.index();
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Split a CSV-style seed row.
///
/// Single-quoted values are text (`''` escapes a quote) and get HTML-escaped;
/// unquoted values are `NULL`, booleans, integers, decimals or bare text.
pub(crate) fn parse_seed_values(line: &str) -> Result<Vec<SqlValue>> {
    let mut values = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let value = if chars.peek() == Some(&'\'') {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        text.push('\'');
                    }
                    Some('\'') => break,
                    Some(c) => text.push(c),
                    None => {
                        return Err(DbError::SchemaDefinition(format!(
                            "unterminated quote in seed row: {}",
                            line
                        )))
                    }
                }
            }
            while chars.peek().is_some_and(|c| *c != ',') {
                chars.next();
            }
            SqlValue::Text(escape_html(&text))
        } else {
            let mut raw = String::new();
            while let Some(c) = chars.peek().copied() {
                if c == ',' {
                    break;
                }
                raw.push(c);
                chars.next();
            }
            unquoted_value(raw.trim())
        };
        values.push(value);

        match chars.next() {
            Some(',') => continue,
            _ => break,
        }
    }

    Ok(values)
}

fn unquoted_value(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        return SqlValue::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return SqlValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return SqlValue::Bool(false);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return SqlValue::I64(n);
    }
    if let Ok(d) = raw.parse::<rust_decimal::Decimal>() {
        return SqlValue::Decimal(d);
    }
    SqlValue::Text(escape_html(raw))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Map seed values onto all columns, or onto the non-auto-increment ones.
pub(crate) fn map_seed_row(table: &Table, values: Vec<SqlValue>) -> Result<Params> {
    let all: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    let assignable: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| !c.is_auto_increment)
        .map(|c| c.name.as_str())
        .collect();

    let columns = if values.len() == all.len() {
        all
    } else if values.len() == assignable.len() {
        assignable
    } else {
        return Err(DbError::SeedRow {
            table: table.name.clone(),
            got: values.len(),
            expected: all.len(),
        });
    };

    Ok(columns.into_iter().zip(values).collect())
}

/// Outcome of applying a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
    pub seeded_rows: u64,
}

/// Applies schema definitions through a [`Db`].
pub struct Migrator<'a> {
    db: &'a mut Db,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a mut Db) -> Self {
        Self { db }
    }

    /// Create every declared table that does not exist yet, with its indexes
    /// and seed rows.
    pub async fn apply(&mut self, schema: &SchemaDefinition) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for table in schema.tables() {
            if self.db.table_exists(&table.name).await? {
                warn!("Table {} already exists, skipping", table.name);
                report.skipped.push(table.name.clone());
                continue;
            }

            let create = table.create_sql(self.db.dialect())?;
            self.db.batch(&create).await?;
            for index in table.index_sql(self.db.dialect())? {
                self.db.batch(&index).await?;
            }
            info!("Created table {}", table.name);
            report.created.push(table.name.clone());

            for seed in schema.seeds_for(&table.name) {
                report.seeded_rows += self.db.insert(&table.name, &seed.values).await?;
            }
        }

        info!(
            "Migration finished: {} created, {} skipped, {} seed row(s)",
            report.created.len(),
            report.skipped.len(),
            report.seeded_rows
        );
        Ok(report)
    }

    /// Apply a line-oriented schema: create blocks render with
    /// [`Table::go`], insert blocks insert positional rows.
    pub async fn apply_legacy(&mut self, schema: &LegacySchema) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for statement in schema.statements() {
            match statement {
                LegacyStatement::Create(table) => {
                    if self.db.table_exists(&table.name).await? {
                        warn!("Table {} already exists, skipping", table.name);
                        report.skipped.push(table.name.clone());
                        continue;
                    }
                    self.db.batch(&table.go()?).await?;
                    info!("Created table {}", table.name);
                    report.created.push(table.name.clone());
                }
                LegacyStatement::Insert { table, rows } => {
                    if report.skipped.iter().any(|t| t == table) {
                        debug!("Skipping inserts into existing table {}", table);
                        continue;
                    }
                    for values in rows {
                        let (sql, params) = positional_insert(self.db.dialect(), table, values)?;
                        report.seeded_rows += self.db.non_query(&sql, &params).await?;
                    }
                }
            }
        }

        info!(
            "Legacy migration finished: {} created, {} skipped, {} row(s)",
            report.created.len(),
            report.skipped.len(),
            report.seeded_rows
        );
        Ok(report)
    }
}

/// `INSERT INTO t VALUES (:v1, :v2, ...)`.
pub(crate) fn positional_insert(
    dialect: &dyn Dialect,
    table: &str,
    values: &[SqlValue],
) -> Result<(String, Params)> {
    let mut params = Params::new();
    let mut placeholders = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let name = format!("v{}", i + 1);
        placeholders.push(format!(":{}", name));
        params.set(name, value.clone());
    }
    let sql = format!(
        "INSERT INTO {} VALUES ({})",
        dialect.quote_ident(table)?,
        placeholders.join(", ")
    );
    Ok((sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Driver;
    use crate::schema::{ConstraintKind, DataType};

    const BLOG: &str = r#"
users:
  - id serial pk
  - name string(100)
  - email string(255) unique
  - "~index name email"
posts:
  - id serial pk
  - users_id int fk
  - parent_id int null fk|_self cascade
  - price decimal(10,2) null
  - "~unique users_id parent_id"
~data:
  users:
    - "'Ana', 'ana@example.com'"
    - "7, 'Bo', 'bo@example.com'"
"#;

    #[test]
    fn test_parse_preserves_table_order() {
        let schema = SchemaDefinition::parse(BLOG).unwrap();
        let names: Vec<&str> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "posts"]);
    }

    #[test]
    fn test_parse_columns_and_constraints() {
        let schema = SchemaDefinition::parse(BLOG).unwrap();
        let users = schema.table("users").unwrap();
        assert_eq!(users.primary_key_columns(), vec!["id"]);
        assert!(users.get_column("id").unwrap().is_auto_increment);
        assert_eq!(users.get_column("name").unwrap().character_length, Some(100));
        assert!(!users.get_column("name").unwrap().is_nullable);
        assert!(users.get_column("email").unwrap().is_unique);
        assert_eq!(users.indexes[0].name, "idx_users_name_email");

        let posts = schema.table("posts").unwrap();
        assert_eq!(
            posts.get_column("price").unwrap().data_type,
            Some(DataType::Decimal {
                precision: 10,
                scale: 2
            })
        );
        assert!(posts
            .constraints
            .iter()
            .any(|c| c.name == "unq_posts_users_id_parent_id"));
    }

    #[test]
    fn test_foreign_key_resolution() {
        let schema = SchemaDefinition::parse(BLOG).unwrap();
        let posts = schema.table("posts").unwrap();
        let fks: Vec<_> = posts
            .foreign_keys()
            .filter_map(|c| c.foreign_key_def().map(|d| (c.name.as_str(), d)))
            .collect();
        assert_eq!(fks.len(), 2);

        let (name, users_fk) = fks[0];
        assert_eq!(name, "fk_posts_users");
        assert_eq!(
            users_fk.column_map,
            vec![(String::from("users_id"), String::from("id"))]
        );

        let (name, self_fk) = fks[1];
        assert_eq!(name, "fk_posts_posts");
        assert_eq!(self_fk.on_delete, ReferentialAction::Cascade);
    }

    #[test]
    fn test_seed_rows_map_onto_columns() {
        let schema = SchemaDefinition::parse(BLOG).unwrap();
        let seeds: Vec<&Seed> = schema.seeds_for("users").collect();
        assert_eq!(seeds.len(), 2);

        let names: Vec<&str> = seeds[0].values.names().collect();
        assert_eq!(names, vec!["name", "email"]);
        let names: Vec<&str> = seeds[1].values.names().collect();
        assert_eq!(names, vec!["id", "name", "email"]);
        assert_eq!(seeds[1].values.get("id"), Some(&SqlValue::I64(7)));
    }

    #[test]
    fn test_seed_row_count_mismatch() {
        let err = SchemaDefinition::parse(
            r#"
users:
  - id serial pk
  - name string(100)
~data:
  users:
    - "1, 'Ana', 'extra'"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::SeedRow {
                got: 3,
                expected: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_implicit_fk_without_match() {
        let err = SchemaDefinition::parse(
            r#"
posts:
  - id serial pk
  - author_id int fk
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DbError::NoSuchReferencedTable { .. }));
    }

    #[test]
    fn test_implicit_fk_ambiguous() {
        let err = SchemaDefinition::parse(
            r#"
users:
  - code string(10) pk
groups:
  - code string(10) pk
members:
  - code string(10) fk
"#,
        )
        .unwrap_err();
        match err {
            DbError::AmbiguousForeignKey { candidates, .. } => {
                assert_eq!(candidates, vec!["users", "groups"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_explicit_fk_to_composite_key() {
        let err = SchemaDefinition::parse(
            r#"
memberships:
  - user_id int pk
  - group_id int pk
audit:
  - id serial pk
  - membership int fk|memberships
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DbError::CompositeKeyUnsupported(ref t) if t == "memberships"));
    }

    #[test]
    fn test_explicit_fk_to_unknown_table() {
        let err = SchemaDefinition::parse(
            r#"
posts:
  - id serial pk
  - blog_id int fk|blogs
"#,
        )
        .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_unknown_token_and_missing_type() {
        let err = SchemaDefinition::parse("users:\n  - id int primary\n").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(ref m) if m.contains("primary")));

        let err = SchemaDefinition::parse("users:\n  - id pk\n").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(ref m) if m.contains("no type")));

        let err = SchemaDefinition::parse("users:\n  - id int bigint\n").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(ref m) if m.contains("more than one type")));
    }

    #[test]
    fn test_cascade_without_fk() {
        let err = SchemaDefinition::parse("users:\n  - id int cascade\n").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(_)));
    }

    #[test]
    fn test_unknown_directive() {
        let err = SchemaDefinition::parse("~views:\n  - x\n").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(_)));
    }

    #[test]
    fn test_parse_seed_values() {
        let values = parse_seed_values("'O''Brien', NULL, 42, 3.50, true, '<b>', plain").unwrap();
        assert_eq!(
            values,
            vec![
                SqlValue::Text("O&#039;Brien".into()),
                SqlValue::Null,
                SqlValue::I64(42),
                SqlValue::Decimal("3.50".parse().unwrap()),
                SqlValue::Bool(true),
                SqlValue::Text("&lt;b&gt;".into()),
                SqlValue::Text("plain".into()),
            ]
        );
        assert!(parse_seed_values("'open").is_err());
    }

    #[test]
    fn test_quoted_comma_stays_in_value() {
        let values = parse_seed_values("'a, b', 'c'").unwrap();
        assert_eq!(
            values,
            vec![SqlValue::Text("a, b".into()), SqlValue::Text("c".into())]
        );
    }

    #[test]
    fn test_create_sql_for_parsed_table() {
        let schema = SchemaDefinition::parse(BLOG).unwrap();
        let posts = schema.table("posts").unwrap();
        let sql = posts.create_sql(&Driver::Postgres.dialect()).unwrap();
        assert!(sql.starts_with("CREATE TABLE \"posts\" ("));
        assert!(sql.contains("FOREIGN KEY (\"parent_id\") REFERENCES \"posts\" (\"id\")"));
        assert!(posts
            .constraints
            .iter()
            .any(|c| matches!(c.kind, ConstraintKind::PrimaryKey)));
    }

    #[test]
    fn test_positional_insert() {
        let (sql, params) = positional_insert(
            &Driver::Mysql.dialect(),
            "users",
            &[SqlValue::I64(1), SqlValue::Text("Ana".into())],
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO `users` VALUES (:v1, :v2)");
        assert_eq!(params.len(), 2);
    }
}

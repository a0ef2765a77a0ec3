//! Named table constraints: primary key, unique, foreign key and index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::traits::Dialect;
use crate::error::Result;

/// Foreign key ON UPDATE / ON DELETE action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ReferentialAction {
    /// Parse an `UPDATE_RULE`/`DELETE_RULE` value; unknown rules map to NO ACTION.
    pub fn parse(rule: &str) -> Self {
        match rule.trim().to_uppercase().replace('_', " ").as_str() {
            "CASCADE" => ReferentialAction::Cascade,
            "SET NULL" => ReferentialAction::SetNull,
            "SET DEFAULT" => ReferentialAction::SetDefault,
            "RESTRICT" => ReferentialAction::Restrict,
            _ => ReferentialAction::NoAction,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Foreign key details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Referenced table name.
    pub referenced_table: String,
    /// `(local column, referenced column)` pairs in key order.
    pub column_map: Vec<(String, String)>,
    pub on_update: ReferentialAction,
    pub on_delete: ReferentialAction,
}

/// Constraint variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey(ForeignKeyDef),
    Index,
}

/// A named constraint over an ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub columns: Vec<String>,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn primary_key(table: &str, columns: Vec<String>) -> Self {
        Self {
            name: primary_key_name(table),
            columns,
            kind: ConstraintKind::PrimaryKey,
        }
    }

    pub fn unique(table: &str, columns: Vec<String>) -> Self {
        Self {
            name: column_constraint_name("unq", table, &columns),
            columns,
            kind: ConstraintKind::Unique,
        }
    }

    pub fn index(table: &str, columns: Vec<String>) -> Self {
        Self {
            name: column_constraint_name("idx", table, &columns),
            columns,
            kind: ConstraintKind::Index,
        }
    }

    pub fn foreign_key(table: &str, referenced_table: &str) -> Self {
        Self::named_foreign_key(foreign_key_name(table, referenced_table), referenced_table)
    }

    pub fn named_foreign_key(name: String, referenced_table: &str) -> Self {
        Self {
            name,
            columns: Vec::new(),
            kind: ConstraintKind::ForeignKey(ForeignKeyDef {
                referenced_table: referenced_table.to_string(),
                column_map: Vec::new(),
                on_update: ReferentialAction::NoAction,
                on_delete: ReferentialAction::NoAction,
            }),
        }
    }

    /// `INFORMATION_SCHEMA` style constraint type.
    pub fn constraint_type(&self) -> &'static str {
        match self.kind {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::ForeignKey(_) => "FOREIGN KEY",
            ConstraintKind::Index => "INDEX",
        }
    }

    pub fn foreign_key_def(&self) -> Option<&ForeignKeyDef> {
        match self.kind {
            ConstraintKind::ForeignKey(ref fk) => Some(fk),
            _ => None,
        }
    }

    pub fn foreign_key_def_mut(&mut self) -> Option<&mut ForeignKeyDef> {
        match self.kind {
            ConstraintKind::ForeignKey(ref mut fk) => Some(fk),
            _ => None,
        }
    }

    /// Append a column unless it is already part of the constraint.
    pub fn extend(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    /// Render the constraint.
    ///
    /// Primary key, unique and foreign key constraints render as a
    /// `CONSTRAINT ...` clause for CREATE TABLE; indexes render as a
    /// standalone `CREATE INDEX` statement on `table`.
    pub fn sql(&self, dialect: &dyn Dialect, table: &str) -> Result<String> {
        let name = dialect.quote_ident(&self.name)?;
        let columns = quote_list(dialect, self.columns.iter().map(String::as_str))?;

        Ok(match self.kind {
            ConstraintKind::PrimaryKey => format!("CONSTRAINT {} PRIMARY KEY ({})", name, columns),
            ConstraintKind::Unique => format!("CONSTRAINT {} UNIQUE ({})", name, columns),
            ConstraintKind::Index => format!(
                "CREATE INDEX {} ON {} ({})",
                name,
                dialect.quote_ident(table)?,
                columns
            ),
            ConstraintKind::ForeignKey(ref fk) => {
                let local = quote_list(dialect, fk.column_map.iter().map(|(l, _)| l.as_str()))?;
                let foreign = quote_list(dialect, fk.column_map.iter().map(|(_, f)| f.as_str()))?;
                format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
                    name,
                    local,
                    dialect.quote_ident(&fk.referenced_table)?,
                    foreign,
                    fk.on_update,
                    fk.on_delete
                )
            }
        })
    }
}

fn quote_list<'a>(dialect: &dyn Dialect, names: impl Iterator<Item = &'a str>) -> Result<String> {
    Ok(names
        .map(|n| dialect.quote_ident(n))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

/// `pk_<table>`
pub fn primary_key_name(table: &str) -> String {
    format!("pk_{}", name_part(table))
}

/// `fk_<table>_<referenced>`
pub fn foreign_key_name(table: &str, referenced_table: &str) -> String {
    format!("fk_{}_{}", name_part(table), name_part(referenced_table))
}

/// `fk_<table>_<referenced>_<col>`, for a second key onto the same table.
pub fn column_foreign_key_name(table: &str, referenced_table: &str, column: &str) -> String {
    format!("{}_{}", foreign_key_name(table, referenced_table), name_part(column))
}

/// `<prefix>_<table>_<col>[_<col>...]`
pub fn column_constraint_name(prefix: &str, table: &str, columns: &[String]) -> String {
    let mut name = format!("{}_{}", prefix, name_part(table));
    for column in columns {
        name.push('_');
        name.push_str(&name_part(column));
    }
    name
}

/// Drop any schema qualifier so `dbo.users` names as `users`.
fn name_part(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::DialectImpl;

    #[test]
    fn test_constraint_names() {
        assert_eq!(primary_key_name("users"), "pk_users");
        assert_eq!(foreign_key_name("posts", "users"), "fk_posts_users");
        assert_eq!(
            column_foreign_key_name("posts", "dbo.users", "editor_id"),
            "fk_posts_users_editor_id"
        );
        assert_eq!(
            column_constraint_name("unq", "users", &["email".to_string()]),
            "unq_users_email"
        );
        assert_eq!(
            Constraint::index("dbo.users", vec!["name".into(), "email".into()]).name,
            "idx_users_name_email"
        );
    }

    #[test]
    fn test_referential_action_parse() {
        assert_eq!(ReferentialAction::parse("CASCADE"), ReferentialAction::Cascade);
        assert_eq!(ReferentialAction::parse("set null"), ReferentialAction::SetNull);
        assert_eq!(ReferentialAction::parse("SET_DEFAULT"), ReferentialAction::SetDefault);
        assert_eq!(ReferentialAction::parse("whatever"), ReferentialAction::NoAction);
    }

    #[test]
    fn test_extend_does_not_duplicate() {
        let mut pk = Constraint::primary_key("t", vec!["a".into()]);
        pk.extend("a");
        pk.extend("b");
        assert_eq!(pk.columns, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_constraint_sql() {
        let dialect = DialectImpl::from_driver_name("postgres").unwrap();

        let pk = Constraint::primary_key("users", vec!["id".into()]);
        assert_eq!(
            pk.sql(&dialect, "users").unwrap(),
            "CONSTRAINT \"pk_users\" PRIMARY KEY (\"id\")"
        );

        let idx = Constraint::index("users", vec!["name".into()]);
        assert_eq!(
            idx.sql(&dialect, "users").unwrap(),
            "CREATE INDEX \"idx_users_name\" ON \"users\" (\"name\")"
        );

        let mut fk = Constraint::foreign_key("posts", "users");
        if let Some(def) = fk.foreign_key_def_mut() {
            def.column_map.push(("users_id".into(), "id".into()));
            def.on_delete = ReferentialAction::Cascade;
        }
        assert_eq!(
            fk.sql(&dialect, "posts").unwrap(),
            "CONSTRAINT \"fk_posts_users\" FOREIGN KEY (\"users_id\") REFERENCES \"users\" (\"id\") \
             ON UPDATE NO ACTION ON DELETE CASCADE"
        );
    }
}

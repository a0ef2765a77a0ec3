//! Line-oriented schema files.
//!
//! ```text
//! # accounts
//! table users
//! id serial pk
//! name string(100)
//! email string(255) unique
//!
//! insert users
//! 1, 'Ana', 'ana@example.com'
//! ```
//!
//! `table <name>` and `insert <name>` open a block that runs until the next
//! blank line. Insert rows are positional and must list every column.

use std::path::Path;

use crate::core::value::SqlValue;
use crate::error::{DbError, Result};

use super::definition::{apply_constraint_token, apply_type_token, parse_seed_values};
use super::table::Table;

/// One block of a legacy schema file.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyStatement {
    Create(Table),
    Insert {
        table: String,
        rows: Vec<Vec<SqlValue>>,
    },
}

#[derive(Debug)]
enum Block {
    Idle,
    Create(Table),
    Insert(String, Vec<Vec<SqlValue>>),
}

/// Parsed legacy schema, blocks in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacySchema {
    statements: Vec<LegacyStatement>,
}

impl LegacySchema {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut schema = LegacySchema::default();
        let mut block = Block::Idle;

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.is_empty() {
                schema.close(std::mem::replace(&mut block, Block::Idle))?;
                continue;
            }

            block = match block {
                Block::Idle => open_block(line, number + 1)?,
                Block::Create(mut table) => {
                    parse_column(&mut table, line, number + 1)?;
                    Block::Create(table)
                }
                Block::Insert(table, mut rows) => {
                    rows.push(parse_seed_values(line)?);
                    Block::Insert(table, rows)
                }
            };
        }
        schema.close(block)?;

        Ok(schema)
    }

    pub fn statements(&self) -> &[LegacyStatement] {
        &self.statements
    }

    /// Declared tables, in file order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.statements.iter().filter_map(|s| match s {
            LegacyStatement::Create(table) => Some(table),
            LegacyStatement::Insert { .. } => None,
        })
    }

    fn close(&mut self, block: Block) -> Result<()> {
        match block {
            Block::Idle => {}
            Block::Create(table) => {
                if table.columns.is_empty() {
                    return Err(DbError::SchemaDefinition(format!(
                        "table {} declares no columns",
                        table.name
                    )));
                }
                self.statements.push(LegacyStatement::Create(table));
            }
            Block::Insert(table, rows) => {
                self.statements.push(LegacyStatement::Insert { table, rows });
            }
        }
        Ok(())
    }
}

fn open_block(line: &str, number: usize) -> Result<Block> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().unwrap_or_default().to_lowercase();
    let (Some(name), None) = (tokens.next(), tokens.next()) else {
        return Err(DbError::SchemaDefinition(format!(
            "line {}: expected 'table <name>' or 'insert <name>'",
            number
        )));
    };
    match keyword.as_str() {
        "table" => Ok(Block::Create(Table::new(name))),
        "insert" => Ok(Block::Insert(name.to_string(), Vec::new())),
        other => Err(DbError::SchemaDefinition(format!(
            "line {}: unknown block '{}'",
            number, other
        ))),
    }
}

/// `<column> <type> [pk|null|unique|index]...`
fn parse_column(table: &mut Table, line: &str, number: usize) -> Result<()> {
    let mut tokens = line.split_whitespace();
    let (Some(name), Some(kind)) = (tokens.next(), tokens.next()) else {
        return Err(DbError::SchemaDefinition(format!(
            "line {}: expected '<column> <type>'",
            number
        )));
    };
    table.column(name);
    if !apply_type_token(table, name, kind)? {
        return Err(DbError::SchemaDefinition(format!(
            "line {}: unknown type '{}'",
            number, kind
        )));
    }
    for token in tokens {
        if !apply_constraint_token(table, name, token)? {
            return Err(DbError::SchemaDefinition(format!(
                "line {}: unknown constraint '{}'",
                number, token
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS: &str = "\
# accounts
table users
id serial pk
name string(100)
email string(255) unique null

insert users
1, 'Ana', 'ana@example.com'
2, 'Bo', NULL

table audit
id bigint pk
note text
";

    #[test]
    fn test_parse_blocks_in_order() {
        let schema = LegacySchema::parse(ACCOUNTS).unwrap();
        assert_eq!(schema.statements().len(), 3);
        let names: Vec<&str> = schema.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "audit"]);

        match &schema.statements()[1] {
            LegacyStatement::Insert { table, rows } => {
                assert_eq!(table, "users");
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1][2], SqlValue::Null);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_block_renders_through_go() {
        let schema = LegacySchema::parse(ACCOUNTS).unwrap();
        let users = schema.tables().next().unwrap();
        let sql = users.go().unwrap();
        assert!(sql.starts_with("CREATE TABLE users ("));
        assert!(sql.contains("id INT NOT NULL AUTO_INCREMENT"));
        assert!(sql.contains("email VARCHAR(255) NULL"));
        assert!(sql.contains("PRIMARY KEY (id)"));
        assert!(sql.contains("UNIQUE (email)"));
    }

    #[test]
    fn test_final_block_without_blank_line() {
        let schema = LegacySchema::parse("table t\nid int pk").unwrap();
        assert_eq!(schema.tables().count(), 1);
    }

    #[test]
    fn test_unknown_type_reports_line() {
        let err = LegacySchema::parse("table t\nid money").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(ref m) if m.contains("line 2")));
    }

    #[test]
    fn test_foreign_keys_are_not_legacy_tokens() {
        let err = LegacySchema::parse("table t\nuser_id int fk").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(ref m) if m.contains("fk")));
    }

    #[test]
    fn test_bad_block_header() {
        assert!(LegacySchema::parse("create users").is_err());
        assert!(LegacySchema::parse("table").is_err());
        assert!(LegacySchema::parse("table\n\n").is_err());
    }

    #[test]
    fn test_empty_table_block() {
        let err = LegacySchema::parse("table t\n\n").unwrap_err();
        assert!(matches!(err, DbError::SchemaDefinition(ref m) if m.contains("no columns")));
    }
}

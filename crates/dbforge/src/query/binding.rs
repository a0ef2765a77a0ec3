//! Rewriting of `:name` placeholders into a dialect's positional form.

use crate::core::identifier::QuoteStyle;
use crate::core::traits::Dialect;
use crate::core::value::{Params, SqlValue};
use crate::error::{DbError, Result};

/// SQL text with positional placeholders and the values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Replace every `:name` placeholder in `sql` with the dialect's positional
/// placeholder and collect the bound values.
///
/// Quoted literals and identifiers are copied verbatim, as are PostgreSQL
/// `::type` casts. `[...]` counts as quoting for bracket-quoting dialects. A name may be bound either as `name` or `:name`. Each
/// occurrence gets its own position, so a name used twice is bound twice.
pub fn bind_named(sql: &str, params: &Params, dialect: &dyn Dialect) -> Result<BoundStatement> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let brackets = dialect.quote_style() == QuoteStyle::Bracket;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
            }
            '[' if brackets => {
                let end = skip_quoted(&chars, i, ']');
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = params
                    .get(&name)
                    .or_else(|| params.get(&format!(":{}", name)))
                    .ok_or_else(|| DbError::UnboundParameter(name.clone()))?;
                values.push(value.clone());
                out.push_str(&dialect.param_placeholder(values.len()));
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(BoundStatement { sql: out, values })
}

/// Index just past the quoted run starting at `start` and closed by `quote`;
/// a doubled closing character is an escape. An unterminated run extends to
/// the end.
fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Driver;

    #[test]
    fn test_mysql_question_marks() {
        let params = Params::new().with("age1", 30).with("name2", "Ana");
        let bound = bind_named(
            "SELECT * FROM users WHERE age = :age1 AND name = :name2",
            &params,
            &Driver::Mysql.dialect(),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM users WHERE age = ? AND name = ?");
        assert_eq!(
            bound.values,
            vec![SqlValue::I32(30), SqlValue::Text("Ana".into())]
        );
    }

    #[test]
    fn test_postgres_numbering_and_casts() {
        let params = Params::new().with("id1", 5i64);
        let bound = bind_named(
            "SELECT name::text FROM users WHERE id = :id1 OR parent = :id1",
            &params,
            &Driver::Postgres.dialect(),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT name::text FROM users WHERE id = $1 OR parent = $2"
        );
        assert_eq!(bound.values.len(), 2);
    }

    #[test]
    fn test_quoted_literals_untouched() {
        let params = Params::new().with("t", "x");
        let bound = bind_named(
            "SELECT ':skip', 'it''s :also' FROM [a:b] WHERE c = :t",
            &params,
            &Driver::SqlServer.dialect(),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT ':skip', 'it''s :also' FROM [a:b] WHERE c = @P1"
        );
    }

    #[test]
    fn test_bracket_identifiers_with_colons() {
        let params = Params::new().with("id1", 7);
        let bound = bind_named(
            "SELECT [a:b], [x]]:y] FROM [t] WHERE [id] = :id1",
            &params,
            &Driver::SqlServer.dialect(),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT [a:b], [x]]:y] FROM [t] WHERE [id] = @P1");
        assert_eq!(bound.values, vec![SqlValue::I32(7)]);
    }

    #[test]
    fn test_brackets_are_not_quotes_for_postgres() {
        let params = Params::new().with("n", 2);
        let bound = bind_named(
            "SELECT tags[:n] FROM posts",
            &params,
            &Driver::Postgres.dialect(),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT tags[$1] FROM posts");
    }

    #[test]
    fn test_colon_prefixed_param_names() {
        let params = Params::new().with(":id", 1);
        let bound = bind_named("DELETE FROM t WHERE id = :id", &params, &Driver::Mysql.dialect())
            .unwrap();
        assert_eq!(bound.values, vec![SqlValue::I32(1)]);
    }

    #[test]
    fn test_unbound_parameter() {
        let err = bind_named("SELECT :missing", &Params::new(), &Driver::Mysql.dialect())
            .unwrap_err();
        assert!(matches!(err, DbError::UnboundParameter(ref n) if n == "missing"));
    }

    #[test]
    fn test_time_literal_and_bare_colon() {
        let bound = bind_named(
            "SELECT '10:30', a : b, x := 1",
            &Params::new(),
            &Driver::Mysql.dialect(),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT '10:30', a : b, x := 1");
        assert!(bound.values.is_empty());
    }
}

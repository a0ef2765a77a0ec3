//! Named data sources: a JSON file of rows or a SQL text file.
//!
//! JSON sources are filtered in memory with [`ResultSet::filter`]; SQL sources
//! run through a [`Db`] on their connection with `:name` placeholders bound
//! from the caller's parameters.

use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::{DataSourceConfig, DataSourceKind};
use crate::core::row::{ResultSet, Row};
use crate::core::value::Params;
use crate::error::{DbError, Result};
use crate::query::{page_count, page_limit, Db, Page};
use crate::registry::{Registry, DEFAULT_CONNECTION};

/// Page request for [`DataSource::get_result_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page_items: u64,
    /// 1-based page number.
    pub current_page: u64,
}

impl Paging {
    pub fn new(page_items: u64, current_page: u64) -> Self {
        Self {
            page_items,
            current_page,
        }
    }
}

/// Rows produced by a data source.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSet {
    Rows(ResultSet),
    Page(Page),
}

impl DataSet {
    /// Rows of the set or of the page.
    pub fn rows(&self) -> &[Row] {
        match self {
            DataSet::Rows(rows) => rows.rows(),
            DataSet::Page(page) => &page.results,
        }
    }
}

/// A named, reusable query or file definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    name: String,
    kind: DataSourceKind,
    path: PathBuf,
    connection: String,
}

impl DataSource {
    /// JSON array of objects read from `path`.
    pub fn json(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: DataSourceKind::Json,
            path: path.into(),
            connection: DEFAULT_CONNECTION.to_string(),
        }
    }

    /// SQL text read from `path`, run on the named connection.
    pub fn sql(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        connection: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DataSourceKind::Sql,
            path: path.into(),
            connection: connection.into(),
        }
    }

    pub fn from_config(name: &str, config: &DataSourceConfig) -> Self {
        Self {
            name: name.to_string(),
            kind: config.kind,
            path: config.path.clone(),
            connection: config
                .connection
                .clone()
                .unwrap_or_else(|| DEFAULT_CONNECTION.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DataSourceKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Produce the source's rows, filtered or bound with `params`.
    ///
    /// With `paging`, SQL sources go through [`Db::paginate_query`] and JSON
    /// sources are sliced in memory.
    pub async fn get_result_set(
        &self,
        registry: &Registry,
        params: &Params,
        paging: Option<Paging>,
    ) -> Result<DataSet> {
        debug!("Evaluating data source '{}' ({:?})", self.name, self.kind);
        match self.kind {
            DataSourceKind::Json => {
                let rows = self.load_json().await?;
                let rows = if params.is_empty() {
                    rows
                } else {
                    rows.filter(params)
                };
                match paging {
                    Some(paging) => page_in_memory(rows, paging).map(DataSet::Page),
                    None => Ok(DataSet::Rows(rows)),
                }
            }
            DataSourceKind::Sql => {
                let sql = self.read_file().await?;
                let mut db = Db::from_registry(registry, &self.connection)?;
                match paging {
                    Some(paging) => db
                        .paginate_query(&sql, params, paging.page_items, paging.current_page)
                        .await
                        .map(DataSet::Page),
                    None => db.query(&sql, params).await.map(DataSet::Rows),
                }
            }
        }
    }

    async fn read_file(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DbError::DataSource(format!(
                "{}: cannot read {}: {}",
                self.name,
                self.path.display(),
                e
            ))
        })
    }

    async fn load_json(&self) -> Result<ResultSet> {
        let text = self.read_file().await?;
        let value: JsonValue = serde_json::from_str(&text)?;
        let JsonValue::Array(items) = value else {
            return Err(DbError::DataSource(format!(
                "{}: {} must hold a JSON array of objects",
                self.name,
                self.path.display()
            )));
        };
        Ok(ResultSet::new(items.iter().map(Row::from_json).collect()))
    }
}

fn page_in_memory(rows: ResultSet, paging: Paging) -> Result<Page> {
    if paging.page_items == 0 {
        return Err(DbError::Config("page_items must be greater than zero".into()));
    }
    let total = rows.len() as u64;
    let limit = page_limit(paging.page_items, paging.current_page)?;
    let skip = usize::try_from(limit.offset.unwrap_or(0)).unwrap_or(usize::MAX);
    let take = usize::try_from(limit.count).unwrap_or(usize::MAX);
    Ok(Page {
        results: rows.into_iter().skip(skip).take(take).collect(),
        pages: (1..=page_count(total, paging.page_items)).collect(),
        current_page: paging.current_page,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConnectionDescriptor};
    use crate::drivers::Driver;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const COUNTRIES: &str = r#"[
        {"code": "PT", "name": "Portugal", "region": "EU"},
        {"code": "ES", "name": "Spain", "region": "EU"},
        {"code": "BR", "name": "Brazil", "region": "SA"},
        {"code": "FR", "name": "France", "region": "EU"}
    ]"#;

    #[tokio::test]
    async fn test_json_source_filters_rows() {
        let file = json_file(COUNTRIES);
        let source = DataSource::json("countries", file.path());
        let set = source
            .get_result_set(&Registry::default(), &Params::new().with("region", "EU"), None)
            .await
            .unwrap();
        let names: Vec<&str> = set.rows().iter().filter_map(|r| r.get_str("name")).collect();
        assert_eq!(names, vec!["Portugal", "Spain", "France"]);
    }

    #[tokio::test]
    async fn test_json_source_pages_in_memory() {
        let file = json_file(COUNTRIES);
        let source = DataSource::json("countries", file.path());
        let set = source
            .get_result_set(&Registry::default(), &Params::new(), Some(Paging::new(3, 2)))
            .await
            .unwrap();
        let DataSet::Page(page) = set else {
            panic!("expected a page");
        };
        assert_eq!(page.total, 4);
        assert_eq!(page.pages, vec![1, 2]);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].get_str("code"), Some("FR"));
    }

    #[tokio::test]
    async fn test_json_source_rejects_non_array() {
        let file = json_file(r#"{"code": "PT"}"#);
        let source = DataSource::json("countries", file.path());
        let err = source
            .get_result_set(&Registry::default(), &Params::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DataSource(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_data_source_error() {
        let source = DataSource::json("gone", "/nonexistent/dbforge/gone.json");
        let err = source
            .get_result_set(&Registry::default(), &Params::new(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gone.json"));
    }

    #[tokio::test]
    async fn test_sql_source_requires_registered_connection() {
        let file = json_file("SELECT * FROM users WHERE role = :role");
        let source = DataSource::sql("users_by_role", file.path(), "reporting");
        let registry = Registry::default();
        registry.register_connection(
            "default",
            ConnectionDescriptor::new(Driver::Mysql, "localhost", "app", "app", ""),
        );
        let err = source
            .get_result_set(&registry, &Params::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[tokio::test]
    async fn test_sql_source_unbound_placeholder() {
        let file = json_file("SELECT * FROM users WHERE role = :role");
        let source = DataSource::sql("users_by_role", file.path(), "default");
        let registry = Registry::default();
        registry.register_connection(
            "default",
            ConnectionDescriptor::new(Driver::Mysql, "localhost", "app", "app", ""),
        );
        let err = source
            .get_result_set(&registry, &Params::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnboundParameter(ref n) if n == "role"));
    }

    #[test]
    fn test_from_config_defaults_connection() {
        let config = Config::from_yaml(
            r#"
datasources:
  countries:
    kind: json
    path: data/countries.json
"#,
        )
        .unwrap();
        let source = DataSource::from_config("countries", &config.datasources["countries"]);
        assert_eq!(source.kind(), DataSourceKind::Json);
        assert_eq!(source.connection(), "default");
        assert_eq!(source.path(), Path::new("data/countries.json"));
    }
}

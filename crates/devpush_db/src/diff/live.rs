//! Live catalog introspection.

use std::collections::BTreeMap;

use crate::error::{PushError, Result};
use crate::model::quote_ident;
use crate::pool::DbPool;

/// A column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    /// Lowercased catalog type name
    pub data_type: String,
    /// `character_maximum_length` (Postgres only; SQLite keeps it in `data_type`)
    pub max_length: Option<i64>,
    /// Part of the primary key, a unique constraint or an index (SQLite only)
    pub keyed: bool,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, data_type: &str) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.trim().to_ascii_lowercase(),
            max_length: None,
            keyed: false,
        }
    }

    pub fn with_max_length(mut self, len: i64) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn keyed(mut self) -> Self {
        self.keyed = true;
        self
    }

    /// Type as shown in warnings, length included.
    pub fn display_type(&self) -> String {
        match self.max_length {
            Some(len) => format!("{}({})", self.data_type, len),
            None => self.data_type.clone(),
        }
    }
}

/// A table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveTable {
    pub name: String,
    pub columns: Vec<LiveColumn>,
    pub row_count: i64,
}

impl LiveTable {
    pub fn get_column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Snapshot of the working schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchema {
    pub tables: BTreeMap<String, LiveTable>,
    /// Enum type name -> labels in sort order (Postgres only)
    pub enums: BTreeMap<String, Vec<String>>,
}

impl LiveSchema {
    pub fn with_table(self, name: &str, columns: &[(&str, &str)], row_count: i64) -> Self {
        let columns = columns
            .iter()
            .map(|(name, data_type)| LiveColumn::new(*name, data_type))
            .collect();
        self.with_columns(name, columns, row_count)
    }

    pub fn with_columns(mut self, name: &str, columns: Vec<LiveColumn>, row_count: i64) -> Self {
        let table = LiveTable {
            name: name.to_string(),
            columns,
            row_count,
        };
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn with_enum(mut self, name: &str, values: &[&str]) -> Self {
        self.enums
            .insert(name.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Read the working schema behind `pool`.
    pub async fn introspect(pool: &DbPool) -> Result<Self> {
        let mut schema = LiveSchema::default();
        for name in table_names(pool).await? {
            let columns = table_columns(pool, &name).await?;
            let row_count = count_rows(pool, &name).await?;
            schema.tables.insert(
                name.clone(),
                LiveTable {
                    name,
                    columns,
                    row_count,
                },
            );
        }
        schema.enums = enum_types(pool).await?;
        Ok(schema)
    }
}

fn catalog_error(e: sqlx::Error) -> PushError {
    PushError::diff(format!("cannot read live schema: {}", e))
}

async fn count_rows(pool: &DbPool, table: &str) -> Result<i64> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
        .fetch_one(pool)
        .await
        .map_err(catalog_error)
}

#[cfg(feature = "sqlite")]
async fn table_names(pool: &DbPool) -> Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}

#[cfg(feature = "sqlite")]
async fn table_columns(pool: &DbPool, table: &str) -> Result<Vec<LiveColumn>> {
    let rows: Vec<(String, String, i64)> =
        sqlx::query_as("SELECT name, type, pk FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(pool)
            .await
            .map_err(catalog_error)?;

    // covers UNIQUE constraints and non-rowid primary keys through their autoindexes
    let indexed: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT ii.name
        FROM pragma_index_list(?) AS il, pragma_index_info(il.name) AS ii
        WHERE ii.name IS NOT NULL
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(catalog_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type, pk)| {
            let column = LiveColumn::new(name, &data_type);
            if pk > 0 || indexed.contains(&column.name) {
                column.keyed()
            } else {
                column
            }
        })
        .collect())
}

#[cfg(feature = "sqlite")]
async fn enum_types(_pool: &DbPool) -> Result<BTreeMap<String, Vec<String>>> {
    Ok(BTreeMap::new())
}

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
async fn table_names(pool: &DbPool) -> Result<Vec<String>> {
    sqlx::query_scalar(
        r#"
        SELECT table_name::text FROM information_schema.tables
        WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)
}

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
async fn table_columns(pool: &DbPool, table: &str) -> Result<Vec<LiveColumn>> {
    let rows: Vec<(String, String, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT column_name::text,
               CASE WHEN data_type = 'USER-DEFINED' THEN udt_name::text ELSE data_type::text END,
               character_maximum_length::bigint
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(catalog_error)?;
    Ok(rows
        .into_iter()
        .map(|(name, data_type, max_length)| LiveColumn {
            max_length,
            ..LiveColumn::new(name, &data_type)
        })
        .collect())
}

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
async fn enum_types(pool: &DbPool) -> Result<BTreeMap<String, Vec<String>>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT t.typname::text, e.enumlabel::text
        FROM pg_type t
        JOIN pg_enum e ON e.enumtypid = t.oid
        JOIN pg_namespace n ON n.oid = t.typnamespace
        WHERE n.nspname = current_schema()
        ORDER BY t.typname, e.enumsortorder
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(catalog_error)?;

    let mut enums: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, label) in rows {
        enums.entry(name).or_default().push(label);
    }
    Ok(enums)
}

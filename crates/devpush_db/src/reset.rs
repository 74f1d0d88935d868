//! Drop directive: irreversibly wipe and recreate the working schema.
//!
//! Runs right after connecting and before the mode gate. It is not confirmed
//! and not gated: setting the directive is the operator's consent, even in
//! production.

use tracing::{info, warn};

use crate::error::{PushError, Result};
use crate::pool::DbPool;

/// Drop every object in the working schema and leave an empty one behind.
///
/// Postgres drops and recreates the connection's current schema; SQLite drops
/// every user view and table (indexes and triggers go with their tables).
pub async fn reset_schema(pool: &DbPool) -> Result<()> {
    warn!("Drop directive set: every object in the working schema will be deleted");
    info!("---- DROPPING TABLES ----");

    let mut conn = pool.acquire().await.map_err(PushError::Reset)?;
    for statement in reset_statements(&mut conn).await? {
        sqlx::query(&statement)
            .execute(&mut *conn)
            .await
            .map_err(PushError::Reset)?;
    }

    info!("---- DROPPED TABLES ----");
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn reset_statements(
    conn: &mut sqlx::pool::PoolConnection<sqlx::Sqlite>,
) -> Result<Vec<String>> {
    let objects: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT type, name FROM sqlite_master
        WHERE type IN ('view', 'table') AND name NOT LIKE 'sqlite_%'
        ORDER BY CASE type WHEN 'view' THEN 0 ELSE 1 END, name
        "#,
    )
    .fetch_all(&mut **conn)
    .await
    .map_err(PushError::Reset)?;

    let mut statements = vec!["PRAGMA foreign_keys = OFF".to_string()];
    statements.extend(objects.iter().map(|(kind, name)| {
        let keyword = if kind == "view" { "VIEW" } else { "TABLE" };
        format!("DROP {} IF EXISTS {}", keyword, crate::model::quote_ident(name))
    }));
    statements.push("PRAGMA foreign_keys = ON".to_string());
    Ok(statements)
}

/// Drops and recreates `current_schema()`, which is `public` unless the
/// connection's `search_path` says otherwise.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
async fn reset_statements(
    conn: &mut sqlx::pool::PoolConnection<sqlx::Postgres>,
) -> Result<Vec<String>> {
    let schema: String = sqlx::query_scalar("SELECT COALESCE(current_schema()::text, 'public')")
        .fetch_one(&mut **conn)
        .await
        .map_err(PushError::Reset)?;
    info!(%schema, "Resetting working schema");

    let schema = crate::model::quote_ident(&schema);
    Ok(vec![
        format!("DROP SCHEMA {} CASCADE", schema),
        format!("CREATE SCHEMA {}", schema),
    ])
}

//! Table/column diff engine over the live catalog.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{DiffPlan, LiveColumn, LiveSchema, LiveTable, SchemaDiffEngine};
use crate::error::{PushError, Result};
use crate::model::{quote_ident, ColumnDef, SchemaModel, TableDef};
use crate::pool::{DbPool, Dialect};

/// Diff engine that introspects the catalog and plans table/column DDL.
///
/// Statement order: enum types, new tables, column changes per table (name
/// order), then dropped tables. Any drop touching a table that holds rows
/// raises a warning and flags data loss. Removed enum types and labels are
/// left in place. On SQLite, changes to key columns rebuild the whole table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogDiffEngine;

impl CatalogDiffEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SchemaDiffEngine for CatalogDiffEngine {
    async fn diff(&self, model: &SchemaModel, pool: &DbPool) -> Result<DiffPlan> {
        let live = LiveSchema::introspect(pool).await?;
        debug!(
            live_tables = live.tables.len(),
            model_tables = model.tables().count(),
            "Live schema introspected"
        );
        Ok(plan_diff(model, &live, Dialect::current()))
    }

    /// Runs every statement in one transaction.
    async fn apply(&self, plan: &DiffPlan, pool: &DbPool) -> Result<()> {
        let start = Instant::now();
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| PushError::apply(format!("cannot open transaction: {}", e)))?;

        for statement in &plan.statements {
            debug!(%statement, "Executing");
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| PushError::apply(format!("{}: {}", statement, e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| PushError::apply(format!("commit failed: {}", e)))?;

        info!(
            statements = plan.statements.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Schema statements applied"
        );
        Ok(())
    }
}

/// Plan the statements that turn `live` into `model`.
pub fn plan_diff(model: &SchemaModel, live: &LiveSchema, dialect: Dialect) -> DiffPlan {
    let mut plan = DiffPlan::empty();

    if dialect == Dialect::Postgres {
        plan_enums(model, live, &mut plan);
    }

    for table in model.tables() {
        if !live.tables.contains_key(&table.name) {
            plan.statements.push(table.create_statement(dialect));
        }
    }

    for table in model.tables() {
        if let Some(live_table) = live.tables.get(&table.name) {
            plan_columns(table, live_table, dialect, &mut plan);
        }
    }

    for live_table in live.tables.values() {
        if model.table(&live_table.name).is_some() {
            continue;
        }
        if live_table.row_count > 0 {
            plan.warn_data_loss(format!(
                "You're about to delete {} table with {} items",
                live_table.name, live_table.row_count
            ));
        }
        let cascade = if dialect == Dialect::Postgres { " CASCADE" } else { "" };
        plan.statements
            .push(format!("DROP TABLE {}{}", quote_ident(&live_table.name), cascade));
    }

    plan
}

fn plan_enums(model: &SchemaModel, live: &LiveSchema, plan: &mut DiffPlan) {
    for def in model.enums() {
        match live.enums.get(&def.name) {
            None => {
                let labels: Vec<String> = def.values.iter().map(|v| quote_literal(v)).collect();
                plan.statements.push(format!(
                    "CREATE TYPE {} AS ENUM ({})",
                    quote_ident(&def.name),
                    labels.join(", ")
                ));
            }
            Some(existing) => {
                for value in def.values.iter().filter(|v| !existing.contains(*v)) {
                    plan.statements.push(format!(
                        "ALTER TYPE {} ADD VALUE {}",
                        quote_ident(&def.name),
                        quote_literal(value)
                    ));
                }
            }
        }
    }
}

fn plan_columns(table: &TableDef, live: &LiveTable, dialect: Dialect, plan: &mut DiffPlan) {
    if dialect == Dialect::Sqlite && needs_rebuild(table, live, dialect) {
        plan_rebuild(table, live, plan);
        return;
    }

    let table_ident = quote_ident(&table.name);
    let mut truncated = false;

    for column in &table.columns {
        match live.get_column(&column.name) {
            None => add_column(&table_ident, column, live, dialect, &mut truncated, plan),
            Some(existing) if !type_matches(column, existing, dialect) => {
                if live.row_count > 0 {
                    plan.warn_data_loss(format!(
                        "You're about to change {} column type from {} to {} with {} items",
                        column.name,
                        existing.display_type(),
                        declared_type(column, dialect),
                        live.row_count
                    ));
                }
                plan.statements.push(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    table_ident,
                    quote_ident(&column.name)
                ));
                add_column(&table_ident, column, live, dialect, &mut truncated, plan);
            }
            Some(_) => {}
        }
    }

    for existing in &live.columns {
        if table.get_column(&existing.name).is_some() {
            continue;
        }
        warn_removed_column(table, live, existing, plan);
        plan.statements.push(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            table_ident,
            quote_ident(&existing.name)
        ));
    }
}

/// Postgres reports varchar lengths separately from the type name.
fn type_matches(column: &ColumnDef, existing: &LiveColumn, dialect: Dialect) -> bool {
    existing.data_type == column.column_type.catalog_name(dialect)
        && (dialect == Dialect::Sqlite || existing.max_length == column.column_type.max_length())
}

fn declared_type(column: &ColumnDef, dialect: Dialect) -> String {
    let name = column.column_type.catalog_name(dialect);
    match column.column_type.max_length() {
        Some(len) if dialect == Dialect::Postgres => format!("{}({})", name, len),
        _ => name,
    }
}

fn warn_removed_column(table: &TableDef, live: &LiveTable, existing: &LiveColumn, plan: &mut DiffPlan) {
    if live.row_count > 0 {
        plan.warn_data_loss(format!(
            "You're about to delete {} column in {} table with {} items",
            existing.name, table.name, live.row_count
        ));
    }
}

/// SQLite cannot drop, add or retype a primary key, unique or indexed column
/// with `ALTER TABLE`.
fn needs_rebuild(table: &TableDef, live: &LiveTable, dialect: Dialect) -> bool {
    let changed_key = table.columns.iter().any(|column| match live.get_column(&column.name) {
        None => column.primary_key,
        Some(existing) => {
            !type_matches(column, existing, dialect) && (existing.keyed || column.primary_key)
        }
    });
    let removed_key = live
        .columns
        .iter()
        .any(|existing| existing.keyed && table.get_column(&existing.name).is_none());
    changed_key || removed_key
}

/// Recreate the table under a temporary name, copy the columns it keeps,
/// then swap it in. Retyped columns are copied as-is and converted by
/// SQLite's type affinity; removed columns and, when a new column needs a
/// value, every row are lost.
fn plan_rebuild(table: &TableDef, live: &LiveTable, plan: &mut DiffPlan) {
    let mut kept = Vec::new();
    let mut required = None;
    for column in &table.columns {
        if live.get_column(&column.name).is_some() {
            kept.push(quote_ident(&column.name));
        } else if required.is_none() && requires_value(column) {
            required = Some(column);
        }
    }

    for existing in &live.columns {
        if table.get_column(&existing.name).is_none() {
            warn_removed_column(table, live, existing, plan);
        }
    }

    let truncate = match required {
        Some(column) if live.row_count > 0 => {
            plan.warn_data_loss(format!(
                "You're about to add not-null {} column without default value, which contains {} items",
                column.name, live.row_count
            ));
            true
        }
        _ => false,
    };

    let rebuilt = TableDef {
        name: format!("__new_{}", table.name),
        columns: table.columns.clone(),
    };
    let table_ident = quote_ident(&table.name);
    let rebuilt_ident = quote_ident(&rebuilt.name);

    debug!(table = %table.name, "Planning table rebuild");
    plan.statements.push(rebuilt.create_statement(Dialect::Sqlite));
    if !truncate && !kept.is_empty() {
        let columns = kept.join(", ");
        plan.statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            rebuilt_ident, columns, columns, table_ident
        ));
    }
    plan.statements.push(format!("DROP TABLE {}", table_ident));
    plan.statements.push(format!(
        "ALTER TABLE {} RENAME TO {}",
        rebuilt_ident, table_ident
    ));
}

/// `ADD COLUMN`, emptying the table first when the column needs a value the
/// existing rows cannot provide.
fn add_column(
    table_ident: &str,
    column: &ColumnDef,
    live: &LiveTable,
    dialect: Dialect,
    truncated: &mut bool,
    plan: &mut DiffPlan,
) {
    if requires_value(column) && live.row_count > 0 && !*truncated {
        plan.warn_data_loss(format!(
            "You're about to add not-null {} column without default value, which contains {} items",
            column.name, live.row_count
        ));
        plan.statements.push(format!("DELETE FROM {}", table_ident));
        *truncated = true;
    }
    plan.statements.push(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        table_ident,
        column.ddl(dialect)
    ));
}

/// Adding this column to a populated table needs a value for every row.
fn requires_value(column: &ColumnDef) -> bool {
    !column.nullable && column.default.is_none()
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl DiffPlan {
    fn warn_data_loss(&mut self, warning: String) {
        self.warnings.push(warning);
        self.has_data_loss = true;
    }
}

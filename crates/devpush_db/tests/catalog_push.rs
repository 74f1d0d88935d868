//! End-to-end pushes through the catalog engine on SQLite.

#![cfg(feature = "sqlite")]

use devpush_db::{
    AbortReason, AutoConfirm, BootstrapConfig, BootstrapOutcome, Bootstrapper, CatalogDiffEngine,
    ColumnDef, ColumnType, DbConfig, DbPool, PushRisk, SchemaModel, SentinelUpdate, TableDef,
};
use devpush_test_utils::ScriptedConfirmation;

fn users_table(with_email: bool) -> TableDef {
    let table = TableDef::new("users").column(ColumnDef::new("id", ColumnType::Integer).primary_key());
    if with_email {
        table.column(ColumnDef::new("email", ColumnType::Varchar(Some(255))))
    } else {
        table
    }
}

fn model(tables: Vec<TableDef>) -> SchemaModel {
    SchemaModel::assemble(tables, vec![], vec![]).unwrap()
}

async fn memory_pool() -> DbPool {
    devpush_db::create_pool(&DbConfig::sqlite_memory()).await.unwrap()
}

async fn column_names(pool: &DbPool, table: &str) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn push_accepting(pool: &DbPool, model: SchemaModel) -> BootstrapOutcome {
    Bootstrapper::new(
        model,
        DbConfig::sqlite_memory(),
        BootstrapConfig::development(),
        CatalogDiffEngine,
        AutoConfirm::accept(),
    )
    .run_with_pool(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_empty_database_gets_tables_and_sentinel() {
    let pool = memory_pool().await;
    let boot = Bootstrapper::new(
        model(vec![users_table(true)]),
        DbConfig::sqlite_memory(),
        BootstrapConfig::development(),
        CatalogDiffEngine,
        ScriptedConfirmation::declining(),
    );

    let outcome = boot.run_with_pool(&pool).await.unwrap();

    let report = match outcome {
        BootstrapOutcome::Synced(report) => report,
        other => panic!("expected Synced, got {:?}", other),
    };
    assert_eq!(report.risk, PushRisk::Safe);
    assert!(report.warnings.is_empty());
    assert!(report
        .statements
        .iter()
        .any(|s| s.starts_with("CREATE TABLE \"users\"")));
    assert_eq!(report.sentinel, SentinelUpdate::Created);
    assert_eq!(boot.confirmation().calls(), 0);

    let record = boot.ledger().dev_push_record(&pool).await.unwrap().unwrap();
    assert_eq!(record.name, "dev");
    assert_eq!(record.batch, -1);
    assert_eq!(column_names(&pool, "users").await, ["id", "email"]);
}

#[tokio::test]
async fn test_second_push_is_a_no_op_that_refreshes_sentinel() {
    let pool = memory_pool().await;
    push_accepting(&pool, model(vec![users_table(true)])).await;

    let outcome = push_accepting(&pool, model(vec![users_table(true)])).await;

    match outcome {
        BootstrapOutcome::Synced(report) => {
            assert_eq!(report.risk, PushRisk::NoChanges);
            assert!(report.statements.is_empty());
            assert_eq!(report.sentinel, SentinelUpdate::Refreshed);
        }
        other => panic!("expected Synced, got {:?}", other),
    }
}

#[tokio::test]
async fn test_declined_column_removal_keeps_table() {
    let pool = memory_pool().await;
    push_accepting(&pool, model(vec![users_table(true)])).await;
    sqlx::query("INSERT INTO users (email) VALUES ('a@example.com'), ('b@example.com')")
        .execute(&pool)
        .await
        .unwrap();

    let boot = Bootstrapper::new(
        model(vec![users_table(false)]),
        DbConfig::sqlite_memory(),
        BootstrapConfig::development(),
        CatalogDiffEngine,
        ScriptedConfirmation::declining(),
    );
    let before = boot.ledger().dev_push_record(&pool).await.unwrap().unwrap();

    let outcome = boot.run_with_pool(&pool).await.unwrap();

    assert_eq!(outcome, BootstrapOutcome::Aborted(AbortReason::Declined));
    let prompts = boot.confirmation().prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].has_data_loss);
    assert_eq!(
        prompts[0].warnings,
        vec!["You're about to delete email column in users table with 2 items".to_string()]
    );
    assert_eq!(column_names(&pool, "users").await, ["id", "email"]);
    let after = boot.ledger().dev_push_record(&pool).await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_accepted_column_removal_is_applied() {
    let pool = memory_pool().await;
    push_accepting(&pool, model(vec![users_table(true)])).await;
    sqlx::query("INSERT INTO users (email) VALUES ('a@example.com')")
        .execute(&pool)
        .await
        .unwrap();

    let outcome = push_accepting(&pool, model(vec![users_table(false)])).await;

    assert!(matches!(
        outcome,
        BootstrapOutcome::Synced(ref report) if report.risk == PushRisk::DataLoss
    ));
    assert_eq!(column_names(&pool, "users").await, ["id"]);
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_drop_directive_resets_before_diff() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE legacy (id INTEGER PRIMARY KEY, payload TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO legacy (payload) VALUES ('x'), ('y')")
        .execute(&pool)
        .await
        .unwrap();

    let boot = Bootstrapper::new(
        model(vec![users_table(true)]),
        DbConfig::sqlite_memory(),
        BootstrapConfig::development().with_drop_on_start(true),
        CatalogDiffEngine,
        ScriptedConfirmation::declining(),
    );

    let outcome = boot.run_with_pool(&pool).await.unwrap();

    // the legacy rows were gone before diffing, so nothing needed confirming
    assert!(outcome.is_synced());
    assert_eq!(boot.confirmation().calls(), 0);
    assert!(column_names(&pool, "legacy").await.is_empty());
    assert_eq!(column_names(&pool, "users").await, ["id", "email"]);
}

#[tokio::test]
async fn test_custom_ledger_table() {
    let pool = memory_pool().await;
    let boot = Bootstrapper::new(
        model(vec![users_table(true)]),
        DbConfig::sqlite_memory(),
        BootstrapConfig::development(),
        CatalogDiffEngine,
        AutoConfirm::accept(),
    )
    .with_ledger(devpush_db::MigrationLedger::new("payload_migrations"));

    boot.run_with_pool(&pool).await.unwrap();

    assert_eq!(
        column_names(&pool, "payload_migrations").await,
        ["name", "batch", "created_at", "updated_at"]
    );
    assert!(boot.ledger().has_dev_push(&pool).await.unwrap());
}

#[tokio::test]
async fn test_primary_key_type_change_rebuilds_table() {
    let pool = memory_pool().await;
    push_accepting(&pool, model(vec![users_table(true)])).await;
    sqlx::query("INSERT INTO users (email) VALUES ('a@example.com'), ('b@example.com')")
        .execute(&pool)
        .await
        .unwrap();

    let widened = TableDef::new("users")
        .column(ColumnDef::new("id", ColumnType::BigInt).primary_key())
        .column(ColumnDef::new("email", ColumnType::Varchar(Some(255))));
    let boot = Bootstrapper::new(
        model(vec![widened]),
        DbConfig::sqlite_memory(),
        BootstrapConfig::development(),
        CatalogDiffEngine,
        ScriptedConfirmation::declining(),
    );

    let outcome = boot.run_with_pool(&pool).await.unwrap();

    assert!(outcome.is_synced(), "unexpected outcome: {:?}", outcome);
    assert_eq!(boot.confirmation().calls(), 0);
    let id_type: String =
        sqlx::query_scalar("SELECT type FROM pragma_table_info('users') WHERE name = 'id'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(id_type, "BIGINT");
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, email FROM users ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, "a@example.com".to_string()),
            (2, "b@example.com".to_string())
        ]
    );

    // the rebuilt table matches the model
    let plan = boot.plan(&pool).await.unwrap();
    assert!(plan.is_empty(), "unexpected drift: {:?}", plan);
}
